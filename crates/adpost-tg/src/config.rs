use crate::quota::QuotaPolicy;
use crate::{db, quota, tg};
use serde::de::DeserializeOwned;

pub struct Config {
    pub(crate) tg: tg::Config,
    pub(crate) db: db::Config,
    pub(crate) quota: quota::Config,
    pub(crate) policy: QuotaPolicy,
}

impl Config {
    pub fn load_or_panic() -> Config {
        Self {
            tg: from_env_or_panic("TG_"),
            db: from_env_or_panic("DATABASE_"),
            // Both live under the same prefix, but they are loaded separately
            // because `envy` can't parse numbers inside `#[serde(flatten)]`
            quota: from_env_or_panic("QUOTA_"),
            policy: from_env_or_panic("QUOTA_"),
        }
    }
}

pub(crate) fn from_env_or_panic<T: DeserializeOwned>(prefix: &str) -> T {
    envy::prefixed(prefix).from_env().unwrap_or_else(|err| {
        panic!(
            "BUG: Couldn't load config from environment for {}: {:#?}",
            std::any::type_name::<T>(),
            err
        );
    })
}
