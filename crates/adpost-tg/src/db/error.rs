use crate::ErrorKind;
use sqlx_bat::prelude::*;

/// Most likely unrecoverable errors from database communication layer
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to the database")]
    Connect { source: sqlx::Error },

    #[error("Failed to migrate the database")]
    Migrate { source: sqlx::migrate::MigrateError },

    #[error("Database query failed")]
    Query {
        #[from]
        source: sqlx::Error,
    },

    #[error("Failed to build the query")]
    BuildQuery {
        #[from]
        source: sea_query::error::Error,
    },

    #[error("Invalid value in column `{column}`: {value:?}")]
    InvalidColumn { column: &'static str, value: String },

    #[error(transparent)]
    SqlxBat {
        #[from]
        source: sqlx_bat::Error,
    },
}

impl DbError {
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Query { source } | Self::Connect { source } => source.is_transient(),
            Self::SqlxBat { source } => source.is_transient(),
            Self::Migrate { .. } | Self::BuildQuery { .. } | Self::InvalidColumn { .. } => false,
        }
    }
}

impl From<sqlx::Error> for ErrorKind {
    fn from(source: sqlx::Error) -> Self {
        DbError::from(source).into()
    }
}

impl From<sqlx_bat::Error> for ErrorKind {
    fn from(source: sqlx_bat::Error) -> Self {
        DbError::from(source).into()
    }
}

impl From<sea_query::error::Error> for ErrorKind {
    fn from(source: sea_query::error::Error) -> Self {
        DbError::from(source).into()
    }
}
