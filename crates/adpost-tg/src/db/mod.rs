mod cfg;
mod error;
mod quota_store;

use crate::{err_ctx, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub(crate) use cfg::*;
pub use error::*;
pub(crate) use quota_store::SqliteQuotaStore;

pub(crate) async fn init(cfg: Config, tz: chrono_tz::Tz) -> Result<SqliteQuotaStore> {
    let opts = SqliteConnectOptions::from_str(&cfg.url)
        .map_err(err_ctx!(DbError::Connect))?
        .create_if_missing(true);

    // Verify that the connection is working early.
    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.pool_size)
        .connect_with(opts)
        .await
        .map_err(err_ctx!(DbError::Connect))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(err_ctx!(DbError::Migrate))?;

    Ok(SqliteQuotaStore::new(pool, tz))
}
