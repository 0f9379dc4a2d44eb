//! Scoped, lazily-realized collections of resource instances.
//!
//! A collection is a deferred query value: applying a filter or scope returns
//! a new collection, and every enumeration re-issues the underlying fetch, so
//! an in-memory Source reflects store state at enumeration time.

use crate::convert::FieldValue;
use crate::descriptor::{DescriptorRef, ResourceDescriptor, Scope};
use crate::error::{Error, Result};
use crate::resource::ResourceInstance;
use crate::source::Context;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct ScopedCollection {
    context: Context,
    descriptor: &'static ResourceDescriptor,
    location: String,
    filters: Vec<(String, String)>,
    scopes: Vec<String>,
    /// Set for has-many collections; materialized members get this instance
    /// as their parent.
    owner: Option<Box<ResourceInstance>>,
}

impl ScopedCollection {
    pub(crate) fn new(
        context: Context,
        descriptor: &'static ResourceDescriptor,
        location: String,
    ) -> Self {
        ScopedCollection {
            context,
            descriptor,
            location,
            filters: Vec::new(),
            scopes: Vec::new(),
            owner: None,
        }
    }

    pub(crate) fn with_owner(
        context: Context,
        related: DescriptorRef,
        location: String,
        owner: ResourceInstance,
    ) -> Self {
        ScopedCollection {
            context,
            descriptor: related(),
            location,
            filters: Vec::new(),
            scopes: Vec::new(),
            owner: Some(Box::new(owner)),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// New collection with an exact-match filter added; passed to the Source
    /// as a query parameter.
    pub fn filter(&self, key: &str, value: &str) -> Self {
        let mut next = self.clone();
        next.filters.push((key.to_string(), value.to_string()));
        next
    }

    /// New collection with a named scope applied. Local scopes (declared with
    /// a predicate) filter after materialization; server scopes travel to the
    /// Source as query parameters.
    pub fn scoped(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.scopes.push(name.to_string());
        next
    }

    /// Materialize the collection. Each call re-issues the fetch.
    pub fn all(&self) -> Result<Vec<ResourceInstance>> {
        let mut query: Vec<(String, String)> = self.filters.clone();
        let mut local: Vec<&Scope> = Vec::new();
        for name in &self.scopes {
            match self.descriptor.scope(name) {
                Some(scope) if scope.predicate.is_some() => local.push(scope),
                _ => query.push(("scope".to_string(), name.clone())),
            }
        }
        let wire = self
            .context
            .source
            .get(&self.context.request, &self.location, &query)?;
        let Value::Array(items) = wire else {
            return Err(Error::ShapeMismatch {
                field: self.location.clone(),
                got: crate::convert::json_type_name(&wire),
            });
        };
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            let mut instance = ResourceInstance::from_wire(
                self.descriptor,
                Some(self.context.clone()),
                self.location.clone(),
                item,
            )?;
            if let Some(owner) = &self.owner {
                instance.set_parent((**owner).clone());
            }
            if local
                .iter()
                .all(|s| s.predicate.map(|p| p(&instance)).unwrap_or(true))
            {
                out.push(instance);
            }
        }
        Ok(out)
    }

    pub fn first(&self) -> Result<Option<ResourceInstance>> {
        Ok(self.all()?.into_iter().next())
    }

    /// Unsaved member bound to this collection's location (and owner, for a
    /// has-many collection).
    pub fn build(&self, fields: Vec<(String, FieldValue)>) -> ResourceInstance {
        let mut instance = ResourceInstance::from_native(
            self.descriptor,
            Some(self.context.clone()),
            self.location.clone(),
            fields,
        );
        if let Some(owner) = &self.owner {
            instance.set_parent((**owner).clone());
        }
        instance
    }
}
