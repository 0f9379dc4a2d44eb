//! Descriptor construction. A resource type provides a static registration
//! function returning an immutable descriptor; nothing mutates a descriptor
//! after `build()`. Builders run during single-threaded setup only.

use crate::case::{pluralize, DefaultKeyConverter, KeyConverter};
use crate::convert::{builtin_registry, ConverterRegistry, TypeTag};
use crate::validation::Validator;
use std::sync::Arc;

use super::types::{
    Attribute, AttributeKind, BelongsTo, DescriptorRef, HasMany, HasManyOptions, Scope,
    ScopePredicate,
};

/// Per-type registry of attributes, associations, scopes, and naming. Built
/// once when the resource type is declared, shared read-only for the process
/// lifetime (typically behind a `OnceLock` static).
pub struct ResourceDescriptor {
    pub type_name: &'static str,
    /// Plural collection path segment; overridable at declaration time.
    pub resource_name: String,
    /// Declaration-ordered. Names map bijectively to wire names.
    pub attributes: Vec<Attribute>,
    pub has_many: Vec<HasMany>,
    pub belongs_to: Vec<BelongsTo>,
    pub scopes: Vec<Scope>,
    pub(crate) registry: Arc<ConverterRegistry>,
    pub(crate) validator: Option<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("type_name", &self.type_name)
            .field("resource_name", &self.resource_name)
            .field("attributes", &self.attributes)
            .field("has_many", &self.has_many)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ResourceDescriptor {
    pub fn builder(type_name: &'static str) -> DescriptorBuilder {
        DescriptorBuilder::new(type_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_by_json_name(&self, json_name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.json_name == json_name)
    }

    pub fn association(&self, name: &str) -> Option<&HasMany> {
        self.has_many.iter().find(|h| h.name == name)
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name == name)
    }

    pub fn has_belongs_to(&self, name: &str) -> bool {
        self.belongs_to.iter().any(|b| b.name == name)
    }

    pub(crate) fn converters(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub(crate) fn validator(&self) -> Option<&Arc<dyn Validator>> {
        self.validator.as_ref()
    }
}

/// Builds a [`ResourceDescriptor`]. Re-declaring an attribute name overwrites
/// the prior entry in place (last write wins).
pub struct DescriptorBuilder {
    type_name: &'static str,
    resource_name: Option<String>,
    attributes: Vec<Attribute>,
    has_many: Vec<HasMany>,
    belongs_to: Vec<BelongsTo>,
    scopes: Vec<Scope>,
    key_converter: Arc<dyn KeyConverter>,
    registry: Arc<ConverterRegistry>,
    validator: Option<Arc<dyn Validator>>,
}

impl DescriptorBuilder {
    fn new(type_name: &'static str) -> Self {
        DescriptorBuilder {
            type_name,
            resource_name: None,
            attributes: Vec::new(),
            has_many: Vec::new(),
            belongs_to: Vec::new(),
            scopes: Vec::new(),
            key_converter: Arc::new(DefaultKeyConverter),
            registry: Arc::clone(builtin_registry()),
            validator: None,
        }
    }

    /// Override the resource name (default: pluralized lower-cased type name).
    pub fn resource_name(mut self, name: &str) -> Self {
        self.resource_name = Some(name.to_string());
        self
    }

    /// Swap the key-casing capability. Applies to attributes declared after
    /// this call.
    pub fn key_converter(mut self, converter: Arc<dyn KeyConverter>) -> Self {
        self.key_converter = converter;
        self
    }

    /// Swap the converter registry used when marshalling wire values.
    pub fn converters(mut self, registry: Arc<ConverterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn attribute(self, name: &str, tag: TypeTag) -> Self {
        self.push_attribute(name, false, AttributeKind::Scalar(tag))
    }

    /// Server-computed field: marshalled in, never echoed back on the wire.
    pub fn read_only_attribute(self, name: &str, tag: TypeTag) -> Self {
        self.push_attribute(name, true, AttributeKind::Scalar(tag))
    }

    /// Single embedded resource of the given type.
    pub fn nested(self, name: &str, related: DescriptorRef) -> Self {
        self.push_attribute(name, false, AttributeKind::Nested(related))
    }

    /// Ordered sequence of embedded resources of the given type.
    pub fn nested_array(self, name: &str, related: DescriptorRef) -> Self {
        self.push_attribute(name, false, AttributeKind::NestedArray(related))
    }

    pub fn has_many(self, name: &str, related: DescriptorRef) -> Self {
        self.has_many_with(name, related, HasManyOptions::default())
    }

    pub fn has_many_with(
        mut self,
        name: &str,
        related: DescriptorRef,
        options: HasManyOptions,
    ) -> Self {
        let keys = Arc::clone(&self.key_converter);
        let hm = HasMany::new(name, related, options, move |n| keys.key_to_json(n));
        self.push_has_many(hm);
        self
    }

    /// Named back-reference resolved through the instance's parent context.
    pub fn belongs_to(mut self, name: &str) -> Self {
        if !self.belongs_to.iter().any(|b| b.name == name) {
            self.belongs_to.push(BelongsTo {
                name: name.to_string(),
            });
        }
        self
    }

    /// Server scope: translated to a query parameter at enumeration time.
    pub fn scope(mut self, name: &str) -> Self {
        self.push_scope(Scope {
            name: name.to_string(),
            predicate: None,
        });
        self
    }

    /// Local scope: filters enumeration with the predicate.
    pub fn local_scope(mut self, name: &str, predicate: ScopePredicate) -> Self {
        self.push_scope(Scope {
            name: name.to_string(),
            predicate: Some(predicate),
        });
        self
    }

    /// Attach a validation capability consulted by `save` before any Source
    /// call.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn build(self) -> ResourceDescriptor {
        let resource_name = self
            .resource_name
            .unwrap_or_else(|| pluralize(&self.type_name.to_lowercase()));
        ResourceDescriptor {
            type_name: self.type_name,
            resource_name,
            attributes: self.attributes,
            has_many: self.has_many,
            belongs_to: self.belongs_to,
            scopes: self.scopes,
            registry: self.registry,
            validator: self.validator,
        }
    }

    fn push_attribute(mut self, name: &str, read_only: bool, kind: AttributeKind) -> Self {
        let attribute = Attribute {
            name: name.to_string(),
            json_name: self.key_converter.key_to_json(name),
            read_only,
            kind,
        };
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    fn push_has_many(&mut self, hm: HasMany) {
        match self.has_many.iter_mut().find(|h| h.name == hm.name) {
            Some(existing) => *existing = hm,
            None => self.has_many.push(hm),
        }
    }

    fn push_scope(&mut self, scope: Scope) {
        match self.scopes.iter_mut().find(|s| s.name == scope.name) {
            Some(existing) => *existing = scope,
            None => self.scopes.push(scope),
        }
    }
}
