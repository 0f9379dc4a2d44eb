//! Typed errors raised by the mapping layer.
//!
//! Only `DocumentNotFound` and `ShapeMismatch` originate in the core; transport
//! and JSON errors come from the Source boundary and propagate unwrapped.
//! A missing converter is deliberately not an error (logged identity fallback),
//! and a validation failure makes `save` return `Ok(false)` instead of failing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Response envelope absent or lacking a `result` key. The single
    /// normalized not-found signal all higher layers rely on.
    #[error("document not found")]
    DocumentNotFound,
    /// A nested-array field received a non-array wire value.
    #[error("expected an array for '{field}' but got {got}")]
    ShapeMismatch { field: String, got: &'static str },
    /// A belongs-to accessor was invoked on an instance with no parent context.
    #[error("no parent context for '{0}'")]
    NoParent(String),
    /// Persistence attempted on an instance without a backend context
    /// (e.g. a nested value, which has no network identity of its own).
    #[error("no source context attached to '{0}'")]
    MissingContext(String),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
