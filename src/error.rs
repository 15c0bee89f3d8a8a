//! Error types for DAG queries and the active dataset registry

use thiserror::Error;

use crate::dag::BoxError;
use crate::epoch::Epoch;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range epoch/height argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Size or height arithmetic left the representable range
    #[error("overflow computing {what} for epoch {epoch}")]
    Overflow {
        /// What was being computed
        what: &'static str,
        epoch: Epoch,
    },

    /// The chain height source could not answer
    #[error("chain height source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A dataset is being generated and nothing can be served yet
    #[error("dataset for epoch {epoch} is still being generated")]
    NotReady { epoch: Epoch },

    /// No dataset has ever been materialized
    #[error("there is no active dag")]
    NoneLoaded,

    /// The dataset for `epoch` was released early and its replacement
    /// failed, so nothing is resident until the next replacement
    #[error("dag for epoch {epoch} was evicted and not replaced")]
    Evicted { epoch: Epoch },

    /// Replacement requested for an epoch that is not ahead of the registry
    #[error("epoch {requested} is not ahead of epoch {current}")]
    Stale { requested: Epoch, current: Epoch },

    /// The generation engine failed or returned a malformed buffer
    #[error("dataset generation for epoch {epoch} failed: {source}")]
    Generation {
        epoch: Epoch,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The registry was torn down
    #[error("dag registry is shut down")]
    ShutDown,
}

/// Flat discriminant of [`Error`], for callers mapping errors onto their
/// own transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Overflow,
    UpstreamUnavailable,
    NotReady,
    NoneLoaded,
    Evicted,
    Stale,
    Generation,
    InvalidConfig,
    ShutDown,
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Overflow { .. } => ErrorKind::Overflow,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::NoneLoaded => ErrorKind::NoneLoaded,
            Self::Evicted { .. } => ErrorKind::Evicted,
            Self::Stale { .. } => ErrorKind::Stale,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::ShutDown => ErrorKind::ShutDown,
        }
    }

    /// Check if the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_)
                | Self::NotReady { .. }
                | Self::Evicted { .. }
                | Self::Generation { .. }
        )
    }
}
