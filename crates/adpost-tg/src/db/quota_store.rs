use super::DbError;
use crate::prelude::*;
use crate::quota::clock::{format_timestamp, parse_timestamp, Timestamp};
use crate::quota::entitlement::{EntitlementStore, Expiry, Grant};
use crate::quota::history::{PostedMessage, Publication, PublicationLog};
use crate::quota::ledger::{Bucket, PostStamp, QuotaLedger};
use crate::quota::store::{QuotaState, QuotaStore};
use crate::quota::{BucketKey, PostId};
use crate::{err, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use parking_lot::Mutex;
use sea_query::{Expr, Iden, Order, Query, SimpleExpr};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx_bat::prelude::*;
use std::collections::{HashMap, HashSet};
use teloxide::types::{ChatId, MessageId};

/// Rows per `INSERT` statement, keeps us well below the SQLite limit on
/// the number of bound parameters.
const INSERT_CHUNK_SIZE: usize = 100;

#[derive(Clone, Copy, Iden)]
enum Grants {
    Table,
    Id,
    UserId,
    Network,
    City,
    ExpiresAt,
}

#[derive(Clone, Copy, Iden)]
enum Buckets {
    Table,
    UserId,
    Network,
    City,
    LastPostTime,
}

#[derive(Clone, Copy, Iden)]
enum PostStamps {
    Table,
    PostId,
    UserId,
    Network,
    City,
    PostedAt,
    State,
    Seq,
}

#[derive(Clone, Copy, Iden)]
enum Publications {
    Table,
    Id,
    PostId,
    UserId,
    Network,
    City,
    PublishedAt,
    DeletedAt,
    ChatId,
    MessageId,
}

const GRANT_COLUMNS: [Grants; 4] = [Grants::UserId, Grants::Network, Grants::City, Grants::ExpiresAt];

const BUCKET_COLUMNS: [Buckets; 4] = [
    Buckets::UserId,
    Buckets::Network,
    Buckets::City,
    Buckets::LastPostTime,
];

const STAMP_COLUMNS: [PostStamps; 7] = [
    PostStamps::PostId,
    PostStamps::UserId,
    PostStamps::Network,
    PostStamps::City,
    PostStamps::PostedAt,
    PostStamps::State,
    PostStamps::Seq,
];

const PUBLICATION_COLUMNS: [Publications; 8] = [
    Publications::PostId,
    Publications::UserId,
    Publications::Network,
    Publications::City,
    Publications::PublishedAt,
    Publications::DeletedAt,
    Publications::ChatId,
    Publications::MessageId,
];

const STAMP_ACTIVE: &str = "active";
const STAMP_DELETED: &str = "deleted";

/// [`QuotaStore`] on top of SQLite. A save writes only the rows that differ
/// between the two states, all inside of a single transaction.
pub(crate) struct SqliteQuotaStore {
    db: sqlx::SqlitePool,

    /// Timezone the stored timestamps are converted into when loaded
    tz: Tz,

    /// Row ids of the grants in the order they are held in memory. Corrupt
    /// rows are skipped on load, so the position of a grant is not its id.
    grant_ids: Mutex<Vec<i64>>,
}

impl SqliteQuotaStore {
    pub(crate) fn new(db: sqlx::SqlitePool, tz: Tz) -> Self {
        Self {
            db,
            tz,
            grant_ids: Default::default(),
        }
    }

    async fn fetch_all(&self, query: &sea_query::SelectStatement) -> Result<Vec<SqliteRow>> {
        Ok(query.into_sqlx().query().fetch_all(&self.db).await?)
    }

    /// Parses every row with `parse`, skipping the rows that fail to parse.
    fn parse_rows<T>(
        &self,
        table: &'static str,
        rows: Vec<SqliteRow>,
        parse: impl Fn(&SqliteRow) -> Result<T>,
    ) -> Vec<T> {
        rows.iter()
            .filter_map(|row| {
                parse(row)
                    .map_err(|err| {
                        warn!(table, err = tracing_err(&err), "Skipping a corrupt row");
                    })
                    .ok()
            })
            .collect()
    }

    fn timestamp(&self, row: &SqliteRow, column: &'static str) -> Result<Timestamp> {
        let value: String = row.try_get(column)?;
        parse_timestamp(&value, self.tz)
            .ok_or_else(|| err!(DbError::InvalidColumn { column, value }))
    }

    fn optional_timestamp(&self, row: &SqliteRow, column: &'static str) -> Result<Option<Timestamp>> {
        let value: Option<String> = row.try_get(column)?;
        value
            .map(|value| {
                parse_timestamp(&value, self.tz)
                    .ok_or_else(|| err!(DbError::InvalidColumn { column, value }))
            })
            .transpose()
    }

    fn parse_grant(&self, row: &SqliteRow) -> Result<Grant> {
        let user_id: i64 = row.try_get("user_id")?;
        let network: String = row.try_get("network")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expiry = match parse_timestamp(&expires_at, self.tz) {
            Some(at) => Expiry::At(at),
            None => {
                warn!(%user_id, %expires_at, "Grant has a malformed expiry, it won't be active");
                Expiry::Malformed(expires_at)
            }
        };

        Ok(Grant {
            user_id: user_id.try_into_app()?,
            scope: network.parse().unwrap_or_else(|never| match never {}),
            city: row.try_get::<String, _>("city")?.into(),
            expiry,
        })
    }

    fn parse_bucket_key(row: &SqliteRow) -> Result<BucketKey> {
        let user_id: i64 = row.try_get("user_id")?;
        Ok(BucketKey::new(
            user_id.try_into_app()?,
            row.try_get::<String, _>("network")?.into(),
            row.try_get::<String, _>("city")?.into(),
        ))
    }

    fn parse_stamp(&self, row: &SqliteRow) -> Result<(BucketKey, bool, PostStamp)> {
        let key = Self::parse_bucket_key(row)?;
        let state: String = row.try_get("state")?;
        let is_active = match state.as_str() {
            STAMP_ACTIVE => true,
            STAMP_DELETED => false,
            _ => {
                return Err(err!(DbError::InvalidColumn {
                    column: "state",
                    value: state,
                }))
            }
        };
        let stamp = PostStamp {
            post_id: PostId::new(row.try_get::<String, _>("post_id")?),
            posted_at: self.timestamp(row, "posted_at")?,
        };
        Ok((key, is_active, stamp))
    }

    fn parse_publication(&self, row: &SqliteRow) -> Result<Publication> {
        let key = Self::parse_bucket_key(row)?;
        let chat_id: Option<i64> = row.try_get("chat_id")?;
        let message_id: Option<i32> = row.try_get("message_id")?;

        let message = chat_id
            .zip(message_id)
            .map(|(chat_id, message_id)| -> Result<_> {
                Ok(PostedMessage {
                    chat_id: ChatId::try_from_db(chat_id)?,
                    message_id: MessageId::try_from_db(message_id)?,
                })
            })
            .transpose()?;

        Ok(Publication {
            post_id: PostId::new(row.try_get::<String, _>("post_id")?),
            user_id: key.user_id,
            network: key.network,
            city: key.city,
            published_at: self.timestamp(row, "published_at")?,
            deleted_at: self.optional_timestamp(row, "deleted_at")?,
            message,
        })
    }

    async fn load_grants(&self) -> Result<EntitlementStore> {
        let rows = self
            .fetch_all(
                Query::select()
                    .column(Grants::Id)
                    .columns(GRANT_COLUMNS)
                    .from(Grants::Table)
                    .order_by(Grants::Id, Order::Asc),
            )
            .await?;

        let (ids, grants): (Vec<i64>, Vec<_>) = self
            .parse_rows("grants", rows, |row| Ok((row.try_get::<i64, _>("id")?, self.parse_grant(row)?)))
            .into_iter()
            .unzip();

        *self.grant_ids.lock() = ids;

        Ok(EntitlementStore::from_grants(grants))
    }

    async fn load_ledger(&self) -> Result<QuotaLedger> {
        let rows = self
            .fetch_all(
                Query::select().columns(BUCKET_COLUMNS).from(Buckets::Table),
            )
            .await?;

        let mut buckets: HashMap<_, _> = self
            .parse_rows("buckets", rows, |row| {
                let bucket = Bucket {
                    last_post_time: self.optional_timestamp(row, "last_post_time")?,
                    ..Default::default()
                };
                Ok((Self::parse_bucket_key(row)?, bucket))
            })
            .into_iter()
            .collect();

        let rows = self
            .fetch_all(
                Query::select()
                    .columns(STAMP_COLUMNS)
                    .from(PostStamps::Table)
                    .order_by(PostStamps::Seq, Order::Asc),
            )
            .await?;

        for (key, is_active, stamp) in self.parse_rows("post_stamps", rows, |row| self.parse_stamp(row)) {
            let Some(bucket) = buckets.get_mut(&key) else {
                warn!(%key, post_id = %stamp.post_id, "Skipping a post stamp without a bucket");
                continue;
            };
            if is_active {
                bucket.active.push(stamp);
            } else {
                bucket.deleted.push(stamp);
            }
        }

        Ok(QuotaLedger::from_buckets(buckets))
    }

    async fn load_publications(&self) -> Result<PublicationLog> {
        let rows = self
            .fetch_all(
                Query::select()
                    .columns(PUBLICATION_COLUMNS)
                    .from(Publications::Table)
                    .order_by(Publications::Id, Order::Asc),
            )
            .await?;

        let records = self.parse_rows("publications", rows, |row| self.parse_publication(row));
        Ok(PublicationLog::from_records(records))
    }

    /// Updates the grants that changed in place and appends the new ones.
    /// Returns the row ids of `after` to remember once the transaction commits.
    async fn save_grants(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        before: &[Grant],
        after: &[Grant],
    ) -> Result<(Vec<i64>, usize)> {
        let mut ids = self.grant_ids.lock().clone();
        let mut written = 0;

        if after.len() < ids.len() {
            let removed = ids.split_off(after.len());
            written += removed.len();
            Query::delete()
                .from_table(Grants::Table)
                .and_where(Expr::col(Grants::Id).is_in(removed))
                .into_sqlx()
                .query()
                .execute(&mut **tx)
                .await?;
        }

        for (index, grant) in after.iter().enumerate() {
            match (ids.get(index), before.get(index)) {
                (Some(_), Some(old)) if old == grant => continue,
                (Some(&id), _) => {
                    Query::update()
                        .table(Grants::Table)
                        .values(GRANT_COLUMNS.into_iter().zip(grant_row(grant)?))
                        .and_where(Expr::col(Grants::Id).eq(id))
                        .into_sqlx()
                        .query()
                        .execute(&mut **tx)
                        .await?;
                }
                (None, _) => {
                    let id = Query::insert()
                        .into_table(Grants::Table)
                        .columns(GRANT_COLUMNS)
                        .values(grant_row(grant)?)?
                        .into_sqlx()
                        .query()
                        .execute(&mut **tx)
                        .await?
                        .last_insert_rowid();
                    ids.push(id);
                }
            }
            written += 1;
        }

        Ok((ids, written))
    }
}

/// Rewrites every bucket that differs together with its post stamps.
async fn save_ledger(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    before: &QuotaLedger,
    after: &QuotaLedger,
) -> Result<usize> {
    let removed: Vec<_> = before
        .buckets()
        .filter(|(key, _)| after.bucket(key).is_none())
        .map(|(key, _)| key)
        .collect();

    let changed: Vec<_> = after
        .buckets()
        .filter(|(key, bucket)| before.bucket(key) != Some(*bucket))
        .collect();

    for key in removed.iter().copied().chain(changed.iter().map(|(key, _)| *key)) {
        delete_bucket(tx, key).await?;
    }

    let buckets = changed
        .iter()
        .map(|(key, bucket)| bucket_row(key, bucket))
        .collect::<Result<Vec<_>>>()?;

    let stamps = changed
        .iter()
        .flat_map(|(key, bucket)| stamp_rows(key, bucket))
        .collect::<Result<Vec<_>>>()?;

    insert_rows(tx, Buckets::Table, BUCKET_COLUMNS, buckets).await?;
    insert_rows(tx, PostStamps::Table, STAMP_COLUMNS, stamps).await?;

    Ok(removed.len() + changed.len())
}

async fn delete_bucket(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, key: &BucketKey) -> Result {
    let user_id = key.user_id.try_into_db()?;

    Query::delete()
        .from_table(Buckets::Table)
        .and_where(Expr::col(Buckets::UserId).eq(user_id))
        .and_where(Expr::col(Buckets::Network).eq(key.network.as_str()))
        .and_where(Expr::col(Buckets::City).eq(key.city.as_str()))
        .into_sqlx()
        .query()
        .execute(&mut **tx)
        .await?;

    Query::delete()
        .from_table(PostStamps::Table)
        .and_where(Expr::col(PostStamps::UserId).eq(user_id))
        .and_where(Expr::col(PostStamps::Network).eq(key.network.as_str()))
        .and_where(Expr::col(PostStamps::City).eq(key.city.as_str()))
        .into_sqlx()
        .query()
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Publications are matched by post id. New ones are appended, so the row
/// id keeps them in the order they were made.
async fn save_publications(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    before: &PublicationLog,
    after: &PublicationLog,
) -> Result<usize> {
    let old: HashMap<_, _> = before
        .records()
        .iter()
        .map(|publication| (&publication.post_id, publication))
        .collect();

    let kept: HashSet<_> = after
        .records()
        .iter()
        .map(|publication| &publication.post_id)
        .collect();

    let removed: Vec<_> = before
        .records()
        .iter()
        .filter(|publication| !kept.contains(&publication.post_id))
        .map(|publication| publication.post_id.as_str())
        .collect();

    let mut written = removed.len();

    if !removed.is_empty() {
        Query::delete()
            .from_table(Publications::Table)
            .and_where(Expr::col(Publications::PostId).is_in(removed))
            .into_sqlx()
            .query()
            .execute(&mut **tx)
            .await?;
    }

    let mut inserted = vec![];

    for publication in after.records() {
        match old.get(&publication.post_id) {
            Some(old) if *old == publication => continue,
            Some(_) => {
                Query::update()
                    .table(Publications::Table)
                    .values(PUBLICATION_COLUMNS.into_iter().zip(publication_row(publication)?))
                    .and_where(Expr::col(Publications::PostId).eq(publication.post_id.as_str()))
                    .into_sqlx()
                    .query()
                    .execute(&mut **tx)
                    .await?;
            }
            None => inserted.push(publication_row(publication)?),
        }
        written += 1;
    }

    insert_rows(tx, Publications::Table, PUBLICATION_COLUMNS, inserted).await?;

    Ok(written)
}

fn grant_row(grant: &Grant) -> Result<Vec<SimpleExpr>> {
    let expires_at = match &grant.expiry {
        Expiry::At(at) => format_timestamp(at),
        Expiry::Malformed(raw) => raw.clone(),
    };
    Ok(sqlx_bat::simple_expr_vec![
        grant.user_id.try_into_db()?,
        grant.scope.to_string(),
        grant.city.as_str(),
        expires_at,
    ])
}

fn bucket_row(key: &BucketKey, bucket: &Bucket) -> Result<Vec<SimpleExpr>> {
    Ok(sqlx_bat::simple_expr_vec![
        key.user_id.try_into_db()?,
        key.network.as_str(),
        key.city.as_str(),
        bucket.last_post_time.as_ref().map(format_timestamp),
    ])
}

/// Rows of the stamps of the bucket. `seq` is the position inside of the bucket.
fn stamp_rows<'a>(
    key: &'a BucketKey,
    bucket: &'a Bucket,
) -> impl Iterator<Item = Result<Vec<SimpleExpr>>> + 'a {
    let active = bucket.active.iter().map(|stamp| (STAMP_ACTIVE, stamp));
    let deleted = bucket.deleted.iter().map(|stamp| (STAMP_DELETED, stamp));

    active
        .chain(deleted)
        .enumerate()
        .map(move |(seq, (state, stamp))| -> Result<Vec<SimpleExpr>> {
        Ok(sqlx_bat::simple_expr_vec![
            stamp.post_id.as_str(),
            key.user_id.try_into_db()?,
            key.network.as_str(),
            key.city.as_str(),
            format_timestamp(&stamp.posted_at),
            state,
                i64::try_from(seq).fatal_ctx(|| "Too many post stamps")?,
            ])
        })
}

fn publication_row(publication: &Publication) -> Result<Vec<SimpleExpr>> {
    let message = publication.message.as_ref();
    Ok(sqlx_bat::simple_expr_vec![
        publication.post_id.as_str(),
        publication.user_id.try_into_db()?,
        publication.network.as_str(),
        publication.city.as_str(),
        format_timestamp(&publication.published_at),
        publication.deleted_at.as_ref().map(format_timestamp),
        message.map(|message| message.chat_id.into_db()),
        message.map(|message| message.message_id.into_db()),
    ])
}

/// Inserts `rows` into the table in chunks.
async fn insert_rows<C: Iden + 'static>(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    table: impl Iden + Clone + 'static,
    columns: impl IntoIterator<Item = C> + Clone,
    rows: Vec<Vec<SimpleExpr>>,
) -> Result {
    for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
        let mut insert = Query::insert();
        insert.into_table(table.clone()).columns(columns.clone());

        for row in chunk {
            insert.values(row.clone())?;
        }

        insert.into_sqlx().query().execute(&mut **tx).await?;
    }
    Ok(())
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<QuotaState> {
        Ok(QuotaState {
            entitlements: self.load_grants().await?,
            ledger: self.load_ledger().await?,
            publications: self.load_publications().await?,
        })
    }

    #[instrument(skip_all)]
    async fn save(&self, before: &QuotaState, after: &QuotaState) -> Result {
        let mut tx = self.db.begin().await?;

        let (grant_ids, grants) = self
            .save_grants(
                &mut tx,
                before.entitlements.grants(),
                after.entitlements.grants(),
            )
            .await?;

        let buckets = save_ledger(&mut tx, &before.ledger, &after.ledger).await?;
        let publications = save_publications(&mut tx, &before.publications, &after.publications).await?;

        tx.commit().await?;

        *self.grant_ids.lock() = grant_ids;

        debug!(grants, buckets, publications, "Saved the quota state");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::clock::tests::{at, TZ};
    use crate::quota::{CityName, NetworkScope};
    use sqlx::sqlite::SqlitePoolOptions;
    use teloxide::types::UserId;

    async fn store() -> SqliteQuotaStore {
        // Every connection to `:memory:` is a separate database
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        SqliteQuotaStore::new(db, TZ)
    }

    fn sample_state() -> QuotaState {
        let now = at(2024, 5, 1, 12, 0, 0);
        let mut state = QuotaState::default();

        state
            .entitlements
            .grant(UserId(1), NetworkScope::All, "Metro".into(), chrono::Duration::days(7), &now)
            .unwrap();
        state
            .entitlements
            .grant(UserId(2), NetworkScope::network("NetA"), "Town".into(), chrono::Duration::days(1), &now)
            .unwrap();

        let key = BucketKey::new(UserId(1), "NetA".into(), "Metro".into());
        let first = state.ledger.record_publish(&key, &now);
        let second = state.ledger.record_publish(&key, &now);
        state.ledger.record_delete(&key, &first, &now);

        for (post_id, message) in [
            (&first, None),
            (
                &second,
                Some(PostedMessage {
                    chat_id: ChatId(-1001),
                    message_id: MessageId(7),
                }),
            ),
        ] {
            state.publications.push(Publication {
                post_id: post_id.clone(),
                user_id: UserId(1),
                network: "NetA".into(),
                city: "Metro".into(),
                published_at: now,
                deleted_at: (post_id == &first).then_some(now),
                message,
            });
        }

        state
    }

    #[test_log::test(tokio::test)]
    async fn round_trips_the_state() {
        let store = store().await;

        assert_eq!(store.load().await.unwrap(), QuotaState::default());

        let state = sample_state();
        store.save(&QuotaState::default(), &state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);

        store.save(&state, &QuotaState::default()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), QuotaState::default());
    }

    #[test_log::test(tokio::test)]
    async fn writes_only_changed_rows() {
        let store = store().await;
        let before = sample_state();
        store.save(&QuotaState::default(), &before).await.unwrap();

        // Rows a save must not touch since their in-memory values didn't change
        sqlx::query("update grants set city = 'Untouched' where user_id = 2")
            .execute(&store.db)
            .await
            .unwrap();
        sqlx::query("update publications set message_id = 99 where message_id = 7")
            .execute(&store.db)
            .await
            .unwrap();

        let now = at(2024, 5, 1, 13, 0, 0);
        let mut after = before.clone();
        after.entitlements.extend(UserId(1), chrono::Duration::days(1)).unwrap();

        let key = BucketKey::new(UserId(3), "NetB".into(), "Town".into());
        let post_id = after.ledger.record_publish(&key, &now);
        after.publications.push(Publication {
            post_id: post_id.clone(),
            user_id: UserId(3),
            network: "NetB".into(),
            city: "Town".into(),
            published_at: now,
            deleted_at: None,
            message: None,
        });

        let removed = after.publications.records()[0].post_id.clone();
        after.publications.remove(&removed).unwrap();

        store.save(&before, &after).await.unwrap();

        let loaded = store.load().await.unwrap();

        let grants = loaded.entitlements.grants();
        assert_eq!(grants[0], after.entitlements.grants()[0]);
        assert_eq!(grants[1].city, CityName::from("Untouched"));

        assert_eq!(loaded.ledger, after.ledger);

        let publications: Vec<_> = loaded
            .publications
            .records()
            .iter()
            .map(|publication| {
                (
                    publication.user_id,
                    publication.message.map(|message| message.message_id),
                )
            })
            .collect();

        assert_eq!(
            publications,
            [(UserId(1), Some(MessageId(99))), (UserId(3), None)]
        );
        assert!(loaded.publications.find(&removed).is_none());
    }

    #[test_log::test(tokio::test)]
    async fn survives_corrupt_rows() {
        let store = store().await;
        let sample = sample_state();
        store.save(&QuotaState::default(), &sample).await.unwrap();

        sqlx::query("update grants set expires_at = 'next tuesday' where user_id = 2")
            .execute(&store.db)
            .await
            .unwrap();

        sqlx::query(
            "insert into publications (post_id, user_id, network, city, published_at)
            values ('broken', 1, 'NetA', 'Metro', 'yesterday')",
        )
        .execute(&store.db)
        .await
        .unwrap();

        let state = store.load().await.unwrap();

        let expiries: Vec<_> = state
            .entitlements
            .grants()
            .iter()
            .map(|grant| (grant.user_id, grant.expiry.clone()))
            .collect();

        test_bat::debug::assert_eq(
            &expiries[1],
            &expect_test::expect![[r#"(UserId(2), Malformed("next tuesday"))"#]],
        );
        assert!(!state.entitlements.grants()[1].is_active(&at(2024, 5, 1, 12, 0, 0)));
        assert!(matches!(expiries[0].1, Expiry::At(_)));

        assert_eq!(state.publications.records().len(), 2);
        assert!(state.publications.find(&PostId::new("broken")).is_none());

        // The malformed value outlives the saves of other changes
        let mut next = state.clone();
        next.entitlements.extend(UserId(1), chrono::Duration::days(1)).unwrap();
        store.save(&state, &next).await.unwrap();
        assert_eq!(store.load().await.unwrap(), next);
    }

    #[test_log::test(tokio::test)]
    async fn skipped_grant_rows_keep_ids_aligned() {
        let store = store().await;
        store.save(&QuotaState::default(), &sample_state()).await.unwrap();

        // User ids can't be negative, so the first grant is skipped on load
        sqlx::query("update grants set user_id = -1 where user_id = 1")
            .execute(&store.db)
            .await
            .unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.entitlements.grants().len(), 1);

        let mut next = state.clone();
        next.entitlements.extend(UserId(2), chrono::Duration::days(1)).unwrap();
        store.save(&state, &next).await.unwrap();

        let user_ids: Vec<i64> = sqlx::query_scalar("select user_id from grants order by id")
            .fetch_all(&store.db)
            .await
            .unwrap();
        assert_eq!(user_ids, [-1, 2]);
        assert_eq!(store.load().await.unwrap(), next);
    }
}
