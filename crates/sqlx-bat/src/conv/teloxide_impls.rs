use crate::{DbRepresentable, IntoDb, Result, TryFromDb, TryIntoDb};
use teloxide::types::{ChatId, MessageId, UserId};

impl DbRepresentable for UserId {
    type DbRepr = i64;
}

impl TryIntoDb for UserId {
    fn try_into_db(self) -> Result<Self::DbRepr> {
        self.0.try_into_db()
    }
}

impl TryFromDb for UserId {
    fn try_from_db(val: Self::DbRepr) -> Result<Self> {
        u64::try_from_db(val).map(UserId)
    }
}

impl DbRepresentable for ChatId {
    type DbRepr = i64;
}

impl IntoDb for ChatId {
    fn into_db(self) -> Self::DbRepr {
        self.0
    }
}

impl TryFromDb for ChatId {
    fn try_from_db(val: Self::DbRepr) -> Result<Self> {
        Ok(ChatId(val))
    }
}

impl DbRepresentable for MessageId {
    type DbRepr = i32;
}

impl IntoDb for MessageId {
    fn into_db(self) -> Self::DbRepr {
        self.0
    }
}

impl TryFromDb for MessageId {
    fn try_from_db(val: Self::DbRepr) -> Result<Self> {
        Ok(MessageId(val))
    }
}
