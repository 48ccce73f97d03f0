//! Decoder: turns the raw bytes a backend stores into the typed value the
//! application watches.
//!
//! Decoders are pure: identical input bytes always decode to equal values.
//! They never see backend errors; a failure here becomes
//! [`Error::Decode`](crate::Error::Decode) in the watcher.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::DecodeError;

type DecodeFn<T> = dyn Fn(&[u8]) -> std::result::Result<T, DecodeError> + Send + Sync;

/// Caller supplied conversion from raw bytes to `T`.
pub struct Decoder<T> {
    name: &'static str,
    decode: Arc<DecodeFn<T>>,
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            decode: self.decode.clone(),
        }
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Decoder").field("name", &self.name).finish()
    }
}

impl<T> Decoder<T> {
    pub fn new<F>(
        name: &'static str,
        decode: F,
    ) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<T, DecodeError> + Send + Sync + 'static,
    {
        Self {
            name,
            decode: Arc::new(decode),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decode(
        &self,
        raw: &[u8],
    ) -> std::result::Result<T, DecodeError> {
        (self.decode)(raw)
    }
}

impl Decoder<Vec<u8>> {
    /// Identity decoder
    pub fn bytes() -> Self {
        Decoder::new("bytes", |raw| Ok(raw.to_vec()))
    }
}

impl Decoder<String> {
    /// UTF-8 text decoder
    pub fn string() -> Self {
        Decoder::new("string", |raw| {
            String::from_utf8(raw.to_vec()).map_err(|e| DecodeError::new(raw, e))
        })
    }
}

impl<T> Decoder<T>
where
    T: DeserializeOwned + 'static,
{
    pub fn json() -> Self {
        Decoder::new("json", |raw| {
            serde_json::from_slice::<T>(raw).map_err(|e| DecodeError::new(raw, e))
        })
    }
}
