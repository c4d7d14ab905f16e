use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

pub type PersistResult<T> = Result<T, PersistError>;

/// Failures reported by the persistence subsystem.
///
/// None of these are fatal to the host. Per-record failures during a load are
/// reported through the event channel and the load keeps going.
#[derive(Clone, Debug, Error, Diagnostic, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum PersistError {
    #[error("{kind} not found: {name}")]
    #[diagnostic(code("persist.not_found"))]
    NotFound { kind: &'static str, name: String },

    #[error("failed to parse {path}: {message}")]
    #[diagnostic(
        code("persist.parse"),
        help("the document is left untouched; inspect it or restore the .bak copy")
    )]
    Parse { path: String, message: String },

    #[error("cannot resolve payload '{type_key}': {reason}")]
    #[diagnostic(code("persist.type_resolution"))]
    TypeResolution { type_key: String, reason: String },

    #[error("io failure on {path}")]
    #[diagnostic(code("persist.io"), help("details were logged when the failure happened"))]
    Io { path: String },

    #[error("a load is already in progress")]
    #[diagnostic(code("persist.concurrency_rejected"))]
    ConcurrencyRejected,

    #[error("selection contains no entities")]
    #[diagnostic(code("persist.empty_selection"))]
    EmptySelection,
}

impl PersistError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn type_resolution(type_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeResolution {
            type_key: type_key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<String>) -> Self {
        Self::Io { path: path.into() }
    }
}
