use serde::Deserialize;
use teloxide::types::UserId;

#[derive(Deserialize, Clone)]
pub(crate) struct Config {
    pub(crate) token: String,

    /// IDs of the users who may grant and extend subscriptions,
    /// comma-separated in the environment
    #[serde(default)]
    pub(crate) admins: Vec<UserId>,
}
