//! Error types for archive explosion.
//!
//! This module provides the [`Error`] enum which represents every failure
//! mode of an explosion job, along with a convenient [`Result<T>`] alias.
//!
//! # Fatal and recoverable errors
//!
//! Almost every error is recoverable: a decoder that cannot open its input,
//! or an archive that turns out to be corrupt halfway through, is logged and
//! the affected bytes are written verbatim instead. Only two conditions stop
//! a job:
//!
//! - [`Error::Sink`]: the destination could not be created or written.
//! - [`Error::ResourceLimitExceeded`]: a configured hardening ceiling was hit.
//!
//! ```rust
//! use exploder::Error;
//!
//! fn should_abort(error: &Error) -> bool {
//!     error.is_fatal()
//! }
//! ```

use std::io;
use std::path::PathBuf;

/// The error type for explosion operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error that is not attributed to a particular destination.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream matched a format signature but its structure is invalid.
    #[error("Invalid {format} data: {reason}")]
    InvalidFormat {
        /// Catalog name of the format.
        format: &'static str,
        /// What the decoder found wrong.
        reason: String,
    },

    /// The stream uses a feature of its format that no decoder handles.
    #[error("Unsupported {format} feature: {feature}")]
    Unsupported {
        /// Catalog name of the format.
        format: &'static str,
        /// Description of the feature.
        feature: String,
    },

    /// Reading the source failed while its bytes were being written.
    ///
    /// Whatever was copied before the failure stays on disk.
    #[error("Failed to read content for '{}': {source}", path.display())]
    Read {
        /// Destination that was being written.
        path: PathBuf,
        /// The underlying read error.
        #[source]
        source: io::Error,
    },

    /// The destination could not be created or written.
    #[error("Failed to write '{}': {source}", path.display())]
    Sink {
        /// Destination that failed.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: io::Error,
    },

    /// A configured resource ceiling was exceeded.
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

impl Error {
    /// Returns `true` if this error must abort the whole job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Sink { .. } | Error::ResourceLimitExceeded(_))
    }

    /// Returns the destination path this error is attributed to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Read { path, .. } | Error::Sink { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn invalid(format: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidFormat {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(format: &'static str, feature: impl Into<String>) -> Self {
        Error::Unsupported {
            format,
            feature: feature.into(),
        }
    }

    /// Classifies a failed read of entry content.
    ///
    /// Limit violations raised by [`crate::safety::BudgetReader`] are carried
    /// inside `io::Error::other` and are unwrapped back into their typed
    /// variant here so they stay fatal.
    pub(crate) fn from_read(path: PathBuf, source: io::Error) -> Self {
        let is_limit = source
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<Error>())
            .is_some_and(|inner| matches!(inner, Error::ResourceLimitExceeded(_)));
        if is_limit {
            if let Some(Ok(inner)) = source.into_inner().map(|b| b.downcast::<Error>()) {
                return *inner;
            }
            return Error::ResourceLimitExceeded("limit exceeded while reading".into());
        }
        Error::Read { path, source }
    }
}

/// A specialized Result type for explosion operations.
pub type Result<T> = std::result::Result<T, Error>;
