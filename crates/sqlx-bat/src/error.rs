use crate::ErrorExt;

type DynError = dyn std::error::Error + Send + Sync + 'static;
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors of the conversions between app and SQLite values, and of the
/// queries issued through this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQLite query failed")]
    Query {
        #[from]
        source: sqlx::Error,
    },

    #[error("Can't store {app_ty} value {app_val} as {db_ty}")]
    Serialize {
        source: Box<DynError>,
        app_ty: &'static str,
        db_ty: &'static str,
        app_val: String,
    },

    #[error("Can't read {db_ty} value {db_val} as {app_ty}")]
    Deserialize {
        source: Box<DynError>,
        app_ty: &'static str,
        db_ty: &'static str,
        db_val: String,
    },
}

impl Error {
    /// Conversion errors never go away on retry, only the query ones may.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Query { source } => source.is_transient(),
            Self::Serialize { .. } | Self::Deserialize { .. } => false,
        }
    }
}
