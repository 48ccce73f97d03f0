//! Runtime Variable Error Hierarchy
//!
//! Every failure a watcher or the variable client can report, classified by
//! how the poll loop must react to it:
//!
//! | Error                | Class       | Poll loop behaviour                          |
//! |----------------------|-------------|----------------------------------------------|
//! | `NotFound`           | Permanent   | surfaced once, polling continues             |
//! | `Decode`             | Permanent   | surfaced once, polling continues             |
//! | `Backend`            | Permanent   | surfaced once, polling continues             |
//! | `BackendUnavailable` | Transient   | retried with backoff, surfaced on exhaustion |
//! | `Canceled`           | Canceled    | returned immediately, loop ends              |
//! | `Closed`             | Closed      | always returned, never retried               |
//!
//! Backend-native errors travel in the `source()` chain so callers can pull
//! them back out with [`error_as`] or [`Error::as_native`] without the client
//! knowing the concrete types.

use std::error::Error as StdError;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed backend error carried in the source chain.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Variable does not exist (yet). It may be created later.
    #[error("Variable {name} not found")]
    NotFound {
        name: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Payload present but rejected by the decoder
    #[error("Variable {name} could not be decoded: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    /// Caller cancelled the watch
    #[error("Watch canceled")]
    Canceled,

    /// Transient network or service failure
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Variable used after `close()`
    #[error("Variable has been closed")]
    Closed,

    /// Any other backend failure; retried but surfaced
    #[error("Backend error: {0}")]
    Backend(#[source] BoxError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Decoder failure, kept apart from backend errors.
#[derive(Debug, thiserror::Error)]
#[error("{description}: {source}")]
pub struct DecodeError {
    /// Human readable description of the rejected bytes
    pub description: String,
    #[source]
    pub source: BoxError,
}

impl DecodeError {
    pub fn new(
        raw: &[u8],
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            description: describe_bytes(raw),
            source: source.into(),
        }
    }
}

/// How the poll loop treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network blip: retry silently with backoff
    Transient,
    /// Surfaced to the caller, polling keeps going afterwards
    Permanent,
    /// Caller initiated; terminates the loop
    Canceled,
    /// Variable closed; never retried
    Closed,
}

/// Stable error code, mirrors the taxonomy callers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    DecodeError,
    Canceled,
    BackendUnavailable,
    Closed,
    InvalidConfig,
    Internal,
}

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Error::NotFound {
            name: name.into(),
            source: None,
        }
    }

    pub fn not_found_with(
        name: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::NotFound {
            name: name.into(),
            source: Some(source.into()),
        }
    }

    pub fn unavailable(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::BackendUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn decode(
        name: impl Into<String>,
        source: DecodeError,
    ) -> Self {
        Error::Decode {
            name: name.into(),
            source,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::BackendUnavailable { .. } => ErrorClass::Transient,
            Error::Canceled => ErrorClass::Canceled,
            Error::Closed => ErrorClass::Closed,
            Error::NotFound { .. } | Error::Decode { .. } | Error::Backend(_) | Error::Config(_) => {
                ErrorClass::Permanent
            }
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::Decode { .. } => ErrorCode::DecodeError,
            Error::Canceled => ErrorCode::Canceled,
            Error::BackendUnavailable { .. } => ErrorCode::BackendUnavailable,
            Error::Closed => ErrorCode::Closed,
            Error::Config(_) => ErrorCode::InvalidConfig,
            Error::Backend(_) => ErrorCode::Internal,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }

    /// Copies the first `E` found in the source chain into `target`.
    ///
    /// Returns false and leaves `target` untouched when no such error is wrapped.
    pub fn as_native<E>(
        &self,
        target: &mut E,
    ) -> bool
    where
        E: StdError + Clone + 'static,
    {
        match error_as::<E>(self) {
            Some(found) => {
                *target = found.clone();
                true
            }
            None => false,
        }
    }

    /// Key used to recognise a repeat of an already surfaced error.
    pub(crate) fn signature(&self) -> (ErrorCode, String) {
        (self.code(), self.to_string())
    }
}

/// Walks `err` and its source chain looking for an `E`.
pub fn error_as<E>(err: &Error) -> Option<&E>
where
    E: StdError + 'static,
{
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<E>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

const DESCRIBE_PREFIX_LEN: usize = 32;

/// Short, log-safe description of raw payload bytes.
pub(crate) fn describe_bytes(raw: &[u8]) -> String {
    let shown = &raw[..raw.len().min(DESCRIBE_PREFIX_LEN)];
    let preview = String::from_utf8_lossy(shown);
    if raw.len() > DESCRIBE_PREFIX_LEN {
        format!("{} bytes starting with {:?}", raw.len(), preview)
    } else {
        format!("{} bytes {:?}", raw.len(), preview)
    }
}
