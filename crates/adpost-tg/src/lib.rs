mod config;
mod db;
mod error;
mod observability;
mod tg;

pub mod quota;
pub mod util;

pub use crate::error::*;
pub use config::*;
pub use observability::*;

#[allow(unused_imports)]
mod prelude {
    pub(crate) use crate::error::prelude::*;
    pub(crate) use crate::observability::logging::prelude::*;
    pub(crate) use crate::util::prelude::*;
}

use std::sync::Arc;

/// Run the telegram bot processing loop
pub async fn run(config: Config) -> Result<()> {
    let catalog = quota::Catalog::load(&config.quota.catalog_path)?;

    let store = db::init(config.db, config.quota.timezone).await?;

    let opts = tg::RunBotOptions {
        tg_cfg: config.tg,
        quota_cfg: config.quota,
        policy: config.policy,
        catalog,
        store: Arc::new(store),
    };

    tg::run_bot(opts).await
}
