use std::sync::Arc;

use thiserror::Error;

use crate::identity::Identity;

/// Boxed error accepted from caller supplied loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by loads.
///
/// Errors are [`Clone`] since one failed batch, page or state load is handed to every caller
/// that joined it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The batch result did not contain the requested identity.
    #[error("item with id {0} was not found")]
    NotFound(Identity),

    /// A caller supplied fetch failed.
    #[error("load failed: {0}")]
    LoadFailure(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The task driving a load panicked or was cancelled before finishing.
    #[error("load task did not complete: {0}")]
    Interrupted(String),

    /// No loader is declared for the requested lazy field state.
    #[error("no loader declared for state `{0}`")]
    UnknownState(String),
}

impl Error {
    /// Wrap any error (or message) raised by a loader.
    pub fn load(err: impl Into<BoxError>) -> Self {
        Error::LoadFailure(Arc::from(err.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Interrupted(err.to_string())
    }
}
