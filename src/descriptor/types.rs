//! Attribute and association descriptor types.

use crate::case::{singularize, to_snake_case};
use crate::convert::{json_type_name, ConverterRegistry, FieldValue, TypeTag};
use crate::error::{Error, Result};
use crate::resource::ResourceInstance;
use serde_json::Value;

use super::builder::ResourceDescriptor;

/// Late-bound reference to another type's descriptor. A plain fn pointer so
/// mutually-referencing types can point at each other's `OnceLock` statics.
pub type DescriptorRef = fn() -> &'static ResourceDescriptor;

/// What a declared attribute holds.
#[derive(Clone, Copy, Debug)]
pub enum AttributeKind {
    Scalar(TypeTag),
    /// Single embedded resource, no network identity of its own.
    Nested(DescriptorRef),
    /// Ordered sequence of embedded resources. The wire value must be an
    /// array; anything else is a hard error, never a silent coercion.
    NestedArray(DescriptorRef),
}

/// One declared attribute. `json_name` is computed once at declaration time
/// through the injected key converter; `name <-> json_name` is bijective
/// within one descriptor.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub json_name: String,
    pub read_only: bool,
    pub kind: AttributeKind,
}

impl Attribute {
    /// Convert this attribute's wire value to native form. Absent/null maps
    /// to absent, never to a default object.
    pub fn from_wire(&self, registry: &ConverterRegistry, wire: &Value) -> Result<FieldValue> {
        match self.kind {
            AttributeKind::Scalar(tag) => registry.convert(tag, wire),
            AttributeKind::Nested(related) => match wire {
                Value::Null => Ok(FieldValue::Null),
                Value::Object(_) => Ok(FieldValue::Nested(Box::new(
                    ResourceInstance::nested_from_wire(related(), wire)?,
                ))),
                other => {
                    tracing::warn!(
                        field = %self.name,
                        got = json_type_name(other),
                        "expected an object for nested attribute, passing through"
                    );
                    Ok(FieldValue::Raw(other.clone()))
                }
            },
            AttributeKind::NestedArray(related) => match wire {
                Value::Null => Ok(FieldValue::Null),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(ResourceInstance::nested_from_wire(related(), item)?);
                    }
                    Ok(FieldValue::NestedMany(out))
                }
                other => Err(Error::ShapeMismatch {
                    field: self.name.clone(),
                    got: json_type_name(other),
                }),
            },
        }
    }
}

/// Options for a has-many declaration. Defaults: foreign key is the
/// singularized association name plus `_id`, url part is the association
/// name, direct field serialization allowed.
#[derive(Clone, Debug, Default)]
pub struct HasManyOptions {
    pub foreign_key: Option<String>,
    pub url_part: Option<String>,
    /// Many-to-many join persisted via a dedicated join-update call after
    /// the owner's save. Forces the ids field read-only so ids are never
    /// POSTed as a plain array.
    pub sub_resource: bool,
    pub read_only: bool,
}

/// A has-many association: an ordered sequence of foreign ids stored on the
/// owner, plus a lazily-built child collection under the owner's location.
#[derive(Clone, Debug)]
pub struct HasMany {
    pub name: String,
    /// Field storage name of the raw ids, `<singular>_ids`.
    pub ids_field: String,
    pub ids_json_name: String,
    pub related: DescriptorRef,
    pub url_part: String,
    pub foreign_key: String,
    pub sub_resource: bool,
    pub read_only: bool,
}

impl HasMany {
    pub(crate) fn new(
        name: &str,
        related: DescriptorRef,
        options: HasManyOptions,
        key_to_json: impl Fn(&str) -> String,
    ) -> Self {
        let ids_field = format!("{}_ids", singularize(name));
        let ids_json_name = key_to_json(&ids_field);
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", to_snake_case(&singularize(name))));
        let url_part = options.url_part.unwrap_or_else(|| name.to_string());
        HasMany {
            name: name.to_string(),
            ids_field,
            ids_json_name,
            related,
            url_part,
            foreign_key,
            sub_resource: options.sub_resource,
            // Sub-resource ids travel through the join-update call only.
            read_only: options.read_only || options.sub_resource,
        }
    }
}

/// Back-reference to the instance that created this instance's collection
/// context. A lookup relation, never independently persisted.
#[derive(Clone, Debug)]
pub struct BelongsTo {
    pub name: String,
}

pub type ScopePredicate = fn(&ResourceInstance) -> bool;

/// Named, reusable filter attached to a resource type. With a predicate it
/// filters enumeration locally; without one it is a server scope the Source
/// translates into a query parameter.
#[derive(Clone)]
pub struct Scope {
    pub name: String,
    pub predicate: Option<ScopePredicate>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("local", &self.predicate.is_some())
            .finish()
    }
}
