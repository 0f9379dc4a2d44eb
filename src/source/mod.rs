//! Pluggable backend executing CRUD on behalf of the mapping layer.
//!
//! One backend is active per configuration object: a blank target selects the
//! in-memory simulation, anything else the HTTP transport. The core threads an
//! opaque request context through every call and never inspects it.

pub mod http;
pub mod mem;

use crate::error::{Error, Result};
use crate::resource::ResourceInstance;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use http::HttpSource;
pub use mem::MemSource;

/// Opaque carrier of ambient request metadata (e.g. auth headers). Supplied
/// by the caller; only the transport reads it.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Read by transport implementations when issuing requests.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Explicit backend configuration threaded through the resource layer: the
/// active Source plus the caller's request context.
#[derive(Clone)]
pub struct Context {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) request: RequestContext,
}

impl Context {
    pub fn new(source: Arc<dyn Source>, request: RequestContext) -> Self {
        Context { source, request }
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .finish()
    }
}

/// Backend operations. Implementations own connection handling, retries, and
/// any concurrency control; the core calls these synchronously and surfaces
/// failures as-is.
pub trait Source: Send + Sync {
    /// Fetch the document or collection at `path`. Query pairs carry filters
    /// and server scopes.
    fn get(&self, ctx: &RequestContext, path: &str, query: &[(String, String)]) -> Result<Value>;

    /// Create the instance at its collection location. Returns the created
    /// wire document (the server-assigned id is read from it).
    fn post(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<Value>;

    /// Update the instance at its location.
    fn put(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool>;

    /// Delete the instance. Raises on failure rather than returning false.
    fn delete(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool>;

    /// Replace a many-to-many join: the ids of `relation` under the owner.
    /// Issued only after the owner's own save succeeded.
    fn put_sub_resource(
        &self,
        ctx: &RequestContext,
        owner: &ResourceInstance,
        relation: &str,
        ids: &[String],
    ) -> Result<bool>;
}

/// Select the active backend: `None`/blank target -> in-memory simulation,
/// anything else -> HTTP transport bound to that base URL.
pub fn configure(target: Option<&str>) -> Arc<dyn Source> {
    match target {
        None => Arc::new(MemSource::new()),
        Some(t) if t.trim().is_empty() => Arc::new(MemSource::new()),
        Some(t) => Arc::new(HttpSource::new(t)),
    }
}

/// Unwrap the expected `{"result": <payload>}` envelope. An absent response
/// or an envelope lacking a `result` key is the single normalized not-found
/// signal all higher layers rely on.
pub fn body_root(response: Option<&str>) -> Result<Value> {
    let text = response.ok_or(Error::DocumentNotFound)?;
    let mut all: Value = serde_json::from_str(text)?;
    match all.get_mut("result") {
        Some(body) if !body.is_null() => Ok(body.take()),
        _ => Err(Error::DocumentNotFound),
    }
}
