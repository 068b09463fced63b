use super::clock::Timestamp;
use super::model::{BucketKey, CityName, NetworkName, PostId};
use teloxide::types::{ChatId, MessageId, UserId};

/// The Telegram message an ad was delivered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// One ad published into one network's city chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub post_id: PostId,
    pub user_id: UserId,
    pub network: NetworkName,
    pub city: CityName,
    pub published_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub message: Option<PostedMessage>,
}

impl Publication {
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.user_id, self.network.clone(), self.city.clone())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Append-only log of publications in the order they were made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationLog {
    records: Vec<Publication>,
}

impl PublicationLog {
    pub fn from_records(records: Vec<Publication>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Publication] {
        &self.records
    }

    pub fn push(&mut self, publication: Publication) {
        self.records.push(publication);
    }

    pub fn find(&self, post_id: &PostId) -> Option<&Publication> {
        self.records.iter().find(|record| record.post_id == *post_id)
    }

    pub fn find_mut(&mut self, post_id: &PostId) -> Option<&mut Publication> {
        self.records
            .iter_mut()
            .find(|record| record.post_id == *post_id)
    }

    /// Forgets a publication that never reached Telegram.
    pub fn remove(&mut self, post_id: &PostId) -> Option<Publication> {
        let index = self
            .records
            .iter()
            .position(|record| record.post_id == *post_id)?;
        Some(self.records.remove(index))
    }

    /// Publications of the user, newest first.
    pub fn of_user(&self, user_id: UserId) -> impl Iterator<Item = &Publication> {
        self.records
            .iter()
            .rev()
            .filter(move |record| record.user_id == user_id)
    }
}
