use super::gate::{Denial, PublishReport, Verdict};
use super::model::{CityName, NetworkScope, PostId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("You don't have an active subscription for {scope} / {city}")]
    NoEntitlement { scope: NetworkScope, city: CityName },

    #[error("The daily limit of posts for {scope} / {city} is exhausted, try again tomorrow")]
    QuotaExceeded { scope: NetworkScope, city: CityName },

    #[error("There is no city {city} in {scope}")]
    UnknownCity { scope: NetworkScope, city: CityName },

    #[error("Invalid grant: {reason}")]
    InvalidGrant { reason: String },

    #[error("Post {post_id} was not found")]
    PostNotFound { post_id: PostId },

    #[error("The storage is unavailable, the operation was not applied")]
    PersistenceUnavailable { source: crate::Error },
}

impl QuotaError {
    /// Errors caused by the input or the state of the user, rather than by
    /// a failure of the bot itself.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::PersistenceUnavailable { .. })
    }
}

impl PublishReport {
    /// Turns a denied report into the corresponding error.
    pub fn ensure_allowed(&self) -> Result<(), QuotaError> {
        let Verdict::Denied(denial) = self.verdict() else {
            return Ok(());
        };

        let scope = self.scope.clone();
        let city = self.city.clone();

        Err(match denial {
            Denial::NoEntitlement => QuotaError::NoEntitlement { scope, city },
            Denial::QuotaExceeded => QuotaError::QuotaExceeded { scope, city },
            Denial::UnknownCity => QuotaError::UnknownCity { scope, city },
        })
    }
}
