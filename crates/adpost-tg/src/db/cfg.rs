use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct Config {
    /// SQLite connection string, e.g. `sqlite://adpost.db`
    pub(crate) url: String,

    #[serde(default = "default_database_pool_size")]
    pub(crate) pool_size: u32,
}

fn default_database_pool_size() -> u32 {
    // SQLite serializes writes anyway, a couple of connections is enough
    // to let the reads through while a write is in progress.
    4
}
