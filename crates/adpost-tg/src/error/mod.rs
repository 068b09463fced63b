mod ext;
mod macros;

use crate::prelude::*;
use crate::util::DynError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing_error::SpanTrace;

pub(crate) use macros::*;

pub(crate) mod prelude {
    pub(crate) use super::ext::ResultExt as _;
    pub(crate) use super::{err, err_ctx, fatal};
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Describes any possible error that may happen in the application lifetime.
#[derive(Clone)]
pub struct Error {
    imp: Arc<ErrorImp>,
}

struct ErrorImp {
    /// Small identifier used for debugging purposes.
    /// It is mentioned in the chat when the error happens.
    /// This way we as developers can copy it and lookup the logs using this id.
    id: String,
    kind: ErrorKind,

    // Participates only in debug impl
    spantrace: SpanTrace,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Quota {
        #[from]
        source: crate::quota::QuotaError,
    },

    #[error(transparent)]
    Catalog {
        #[from]
        source: crate::quota::CatalogError,
    },

    #[error(transparent)]
    Command {
        #[from]
        source: crate::tg::CommandError,
    },

    #[error(transparent)]
    Tg {
        #[from]
        source: teloxide::RequestError,
    },

    #[error(transparent)]
    Dialogue {
        #[from]
        source: teloxide::dispatching::dialogue::InMemStorageError,
    },

    #[error(transparent)]
    Db {
        #[from]
        source: crate::db::DbError,
    },

    /// Unrecoverable kind of error, that is not supposed to happen, but when
    /// it happens we can't do anything reasonable about it, so no structural
    /// error handling is possible, this error is just propagated to the top.
    #[error("FATAL: {message}")]
    Fatal {
        message: String,
        source: Option<Box<DynError>>,
    },
}

impl Error {
    pub(crate) fn id(&self) -> &str {
        &self.imp.id
    }

    /// Errors caused by interaction with the user.
    /// These are most likely caused by humanz sending wrong input.
    pub(crate) fn is_user_error(&self) -> bool {
        match &self.imp.kind {
            ErrorKind::Quota { source } => source.is_user_error(),
            ErrorKind::Command { .. } => true,
            ErrorKind::Catalog { .. }
            | ErrorKind::Tg { .. }
            | ErrorKind::Dialogue { .. }
            | ErrorKind::Db { .. }
            | ErrorKind::Fatal { .. } => false,
        }
    }

    /// Errors that may go away if the operation is retried.
    pub(crate) fn is_transient(&self) -> bool {
        match &self.imp.kind {
            ErrorKind::Db { source } => source.is_transient(),
            ErrorKind::Tg { source } => matches!(
                source,
                teloxide::RequestError::Network(_) | teloxide::RequestError::RetryAfter(_)
            ),
            ErrorKind::Quota { .. }
            | ErrorKind::Catalog { .. }
            | ErrorKind::Command { .. }
            | ErrorKind::Dialogue { .. }
            | ErrorKind::Fatal { .. } => false,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.imp.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error (id: {}): {}", self.imp.id, self.imp.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.imp.kind.source()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)?;
        fmt::Display::fmt(&self.imp.spantrace, f)
    }
}

impl<T: Into<ErrorKind>> From<T> for Error {
    #[track_caller]
    fn from(kind: T) -> Self {
        let imp = ErrorImp {
            kind: kind.into(),
            id: nanoid::nanoid!(6),
            spantrace: SpanTrace::capture(),
        };

        let err = Self { imp: Arc::new(imp) };

        trace!(err = tracing_err(&err), "Created an error");

        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::{NetworkScope, QuotaError};

    #[test]
    fn user_errors() {
        let err = Error::from(QuotaError::QuotaExceeded {
            scope: NetworkScope::All,
            city: "Metro".into(),
        });
        assert!(err.is_user_error());
        assert!(!err.is_transient());
        assert_eq!(err.id().len(), 6);

        let err = fatal!("Something went wrong: {}", 42);
        assert!(!err.is_user_error());
        expect_test::expect!["FATAL: Something went wrong: 42"].assert_eq(&err.kind().to_string());
    }

    #[test]
    fn fatal_context_keeps_the_source() {
        let number: Result<u8, std::num::ParseIntError> = "many".parse();
        let err = number.fatal_ctx(|| "Invalid number of days").unwrap_err();

        expect_test::expect!["FATAL: Invalid number of days"].assert_eq(&err.kind().to_string());

        let source = std::error::Error::source(err.kind()).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("invalid digit found in string"));
    }
}
