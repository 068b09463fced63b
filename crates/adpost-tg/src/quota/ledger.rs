use super::clock::Timestamp;
use super::model::{BucketKey, PostId};
use super::rollover::{is_today, needs_reset};
use std::collections::HashMap;

/// A single post counted in a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct PostStamp {
    pub post_id: PostId,
    pub posted_at: Timestamp,
}

/// Today's posts of a single user in a single network/city.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    /// Posts that are still published
    pub active: Vec<PostStamp>,

    /// Posts that were removed, they still count toward the daily cap
    pub deleted: Vec<PostStamp>,

    pub last_post_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyCount {
    pub active: u32,
    pub deleted: u32,
}

impl DailyCount {
    pub fn total(self) -> u32 {
        self.active + self.deleted
    }
}

impl Bucket {
    fn roll_over(&mut self, now: &Timestamp) {
        if needs_reset(self.last_post_time.as_ref(), now) {
            self.active.clear();
            self.deleted.clear();
        }
    }

    fn count_today(&self, now: &Timestamp) -> DailyCount {
        if needs_reset(self.last_post_time.as_ref(), now) {
            return DailyCount::default();
        }

        let count = |stamps: &[PostStamp]| {
            let today = stamps
                .iter()
                .filter(|stamp| is_today(&stamp.posted_at, now))
                .count();
            u32::try_from(today).unwrap_or(u32::MAX)
        };

        DailyCount {
            active: count(&self.active),
            deleted: count(&self.deleted),
        }
    }
}

/// Per-bucket counters of the posts made today. Knows nothing about who is
/// allowed to post, only how much has been posted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaLedger {
    buckets: HashMap<BucketKey, Bucket>,
}

impl QuotaLedger {
    pub fn from_buckets(buckets: impl IntoIterator<Item = (BucketKey, Bucket)>) -> Self {
        Self {
            buckets: buckets.into_iter().collect(),
        }
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&BucketKey, &Bucket)> {
        self.buckets.iter()
    }

    pub fn bucket(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn count_today(&self, key: &BucketKey, now: &Timestamp) -> DailyCount {
        self.buckets
            .get(key)
            .map(|bucket| bucket.count_today(now))
            .unwrap_or_default()
    }

    /// Deleted posts are not a refund, they still consume the cap.
    pub fn remaining(&self, key: &BucketKey, cap: u32, now: &Timestamp) -> u32 {
        cap.saturating_sub(self.count_today(key, now).total())
    }

    pub fn record_publish(&mut self, key: &BucketKey, now: &Timestamp) -> PostId {
        let bucket = self.bucket_mut(key, now);
        let post_id = PostId::generate();

        bucket.active.push(PostStamp {
            post_id: post_id.clone(),
            posted_at: *now,
        });
        bucket.last_post_time = Some(*now);

        post_id
    }

    /// Moves the post with the given id from active to deleted. Returns `false`
    /// if there is no such post among today's active ones, which is the case
    /// for posts made on a previous day, since those don't count anymore.
    pub fn record_delete(&mut self, key: &BucketKey, post_id: &PostId, now: &Timestamp) -> bool {
        let bucket = self.bucket_mut(key, now);

        let Some(index) = bucket
            .active
            .iter()
            .position(|stamp| stamp.post_id == *post_id)
        else {
            return false;
        };

        let stamp = bucket.active.remove(index);
        bucket.deleted.push(stamp);
        true
    }

    /// Forgets the post entirely as if it was never published.
    pub fn revoke_publish(&mut self, key: &BucketKey, post_id: &PostId) -> bool {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let len_before = bucket.active.len();
        bucket.active.retain(|stamp| stamp.post_id != *post_id);
        bucket.active.len() != len_before
    }

    /// Remaining allowance for the sum of today's posts across `keys`.
    /// Every bucket contributes at most `cap_per_pair` to the sum.
    pub fn aggregate_remaining<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k BucketKey>,
        cap_per_pair: u32,
        cap_total: u32,
        now: &Timestamp,
    ) -> u32 {
        let used = keys
            .into_iter()
            .map(|key| self.count_today(key, now).total().min(cap_per_pair))
            .fold(0_u32, u32::saturating_add);

        cap_total.saturating_sub(used)
    }

    fn bucket_mut(&mut self, key: &BucketKey, now: &Timestamp) -> &mut Bucket {
        let bucket = self.buckets.entry(key.clone()).or_default();
        bucket.roll_over(now);
        bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::clock::tests::at;
    use teloxide::types::UserId;

    fn key(user: u64, network: &str, city: &str) -> BucketKey {
        BucketKey::new(UserId(user), network.into(), city.into())
    }

    #[test]
    fn fresh_bucket_has_full_allowance() {
        let ledger = QuotaLedger::default();
        let now = at(2024, 5, 1, 12, 0, 0);

        assert_eq!(ledger.count_today(&key(1, "NetA", "Metro"), &now), DailyCount::default());
        assert_eq!(ledger.remaining(&key(1, "NetA", "Metro"), 3, &now), 3);
    }

    #[test]
    fn publishes_consume_allowance() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");
        let now = at(2024, 5, 1, 12, 0, 0);

        ledger.record_publish(&key, &now);
        ledger.record_publish(&key, &now);

        assert_eq!(ledger.remaining(&key, 3, &now), 1);
        ledger.record_publish(&key, &now);
        assert_eq!(ledger.remaining(&key, 3, &now), 0);

        // Going over the cap is the business of the caller, the ledger saturates
        ledger.record_publish(&key, &now);
        assert_eq!(ledger.remaining(&key, 3, &now), 0);
    }

    #[test]
    fn deleting_never_refunds() {
        let mut ledger = QuotaLedger::default();
        let key = key(3, "NetA", "CityX");
        let now = at(2024, 5, 1, 12, 0, 0);

        let posts: Vec<_> = (0..3).map(|_| ledger.record_publish(&key, &now)).collect();

        for post in &posts {
            let before = ledger.remaining(&key, 3, &now);
            assert!(ledger.record_delete(&key, post, &now));
            assert!(ledger.remaining(&key, 3, &now) <= before);
        }

        assert_eq!(
            ledger.count_today(&key, &now),
            DailyCount {
                active: 0,
                deleted: 3
            }
        );
        assert_eq!(ledger.remaining(&key, 3, &now), 0);
    }

    #[test]
    fn delete_targets_the_identified_post() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");
        let first_at = at(2024, 5, 1, 9, 0, 0);
        let second_at = at(2024, 5, 1, 10, 0, 0);

        let first = ledger.record_publish(&key, &first_at);
        let second = ledger.record_publish(&key, &second_at);

        assert!(ledger.record_delete(&key, &first, &second_at));

        let bucket = &ledger.buckets[&key];
        assert_eq!(bucket.active.len(), 1);
        assert_eq!(bucket.active[0].post_id, second);
        assert_eq!(bucket.deleted[0].post_id, first);
        assert_eq!(bucket.deleted[0].posted_at, first_at);

        // The same post can't be deleted twice
        assert!(!ledger.record_delete(&key, &first, &second_at));
    }

    #[test]
    fn count_is_idempotent() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");
        let now = at(2024, 5, 1, 12, 0, 0);
        let post = ledger.record_publish(&key, &now);
        ledger.record_publish(&key, &now);
        ledger.record_delete(&key, &post, &now);

        let first = ledger.count_today(&key, &now);
        let second = ledger.count_today(&key, &now);

        assert_eq!(first, second);
        assert_eq!(
            first,
            DailyCount {
                active: 1,
                deleted: 1
            }
        );
    }

    #[test]
    fn rollover_restores_full_cap() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");
        let evening = at(2024, 5, 1, 23, 59, 0);

        let post = ledger.record_publish(&key, &evening);
        ledger.record_publish(&key, &evening);
        ledger.record_publish(&key, &evening);
        ledger.record_delete(&key, &post, &evening);
        assert_eq!(ledger.remaining(&key, 3, &evening), 0);

        let next_morning = at(2024, 5, 2, 0, 1, 0);
        assert_eq!(ledger.remaining(&key, 3, &next_morning), 3);

        // Deleting yesterday's post has no effect on today's counts
        let yesterdays = ledger.buckets[&key].active[0].post_id.clone();
        assert!(!ledger.record_delete(&key, &yesterdays, &next_morning));
        assert_eq!(ledger.count_today(&key, &next_morning), DailyCount::default());

        // The stale entries were physically cleared by the mutation
        let bucket = &ledger.buckets[&key];
        assert!(bucket.active.is_empty());
        assert!(bucket.deleted.is_empty());
    }

    #[test]
    fn publishing_after_rollover_starts_a_new_day() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");

        ledger.record_publish(&key, &at(2024, 5, 1, 22, 0, 0));
        ledger.record_publish(&key, &at(2024, 5, 2, 8, 0, 0));

        let now = at(2024, 5, 2, 8, 0, 0);
        assert_eq!(ledger.count_today(&key, &now).active, 1);
        assert_eq!(ledger.buckets[&key].active.len(), 1);
        assert_eq!(ledger.buckets[&key].last_post_time, Some(now));
    }

    #[test]
    fn revoke_forgets_the_post() {
        let mut ledger = QuotaLedger::default();
        let key = key(1, "NetA", "Metro");
        let now = at(2024, 5, 1, 12, 0, 0);

        let post = ledger.record_publish(&key, &now);
        assert!(ledger.revoke_publish(&key, &post));
        assert_eq!(ledger.remaining(&key, 3, &now), 3);
        assert!(!ledger.revoke_publish(&key, &post));
    }

    #[test]
    fn aggregate_sums_pairs_bounded_by_per_pair_cap() {
        let mut ledger = QuotaLedger::default();
        let now = at(2024, 5, 1, 12, 0, 0);
        let keys = [
            key(1, "NetA", "Metro"),
            key(1, "NetB", "Metro"),
            key(1, "NS", "Metropolis"),
        ];

        for _ in 0..3 {
            ledger.record_publish(&keys[0], &now);
        }
        ledger.record_publish(&keys[1], &now);

        assert_eq!(ledger.aggregate_remaining(&keys, 3, 9, &now), 5);

        // An over-filled bucket still contributes only `cap_per_pair`
        ledger.record_publish(&keys[0], &now);
        assert_eq!(ledger.aggregate_remaining(&keys, 3, 9, &now), 5);

        assert_eq!(ledger.aggregate_remaining(&keys, 3, 4, &now), 0);
        assert_eq!(ledger.aggregate_remaining(&keys, 3, 9, &at(2024, 5, 2, 0, 0, 0)), 9);
    }
}
