//! Attribute value conversion: wire JSON -> native field values.
//!
//! Converters are registered per type tag in a [`ConverterRegistry`] during
//! single-threaded setup. An unregistered tag is not an error: the value is
//! logged and passed through unchanged, and call sites depend on that leniency.

use crate::error::Result;
use crate::resource::ResourceInstance;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Declared type of a scalar attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Str,
    Bool,
    Int,
    Time,
    /// Application-defined tag; falls back to identity unless a converter
    /// is registered for it.
    Custom(&'static str),
}

/// Native value held in a resource instance's field storage.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Null,
    Str(String),
    Bool(bool),
    Int(i64),
    Time(DateTime<FixedOffset>),
    /// Ordered foreign ids of a has-many association.
    Ids(Vec<String>),
    /// Embedded resource with no network identity of its own.
    Nested(Box<ResourceInstance>),
    NestedMany(Vec<ResourceInstance>),
    /// Identity fallback for values no converter claims.
    Raw(Value),
}

impl FieldValue {
    /// Serialize back to wire form. Nested values recurse through their own
    /// `to_hash`.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(n) => Value::Number((*n).into()),
            FieldValue::Time(t) => Value::String(t.to_rfc3339()),
            FieldValue::Ids(ids) => {
                Value::Array(ids.iter().map(|i| Value::String(i.clone())).collect())
            }
            FieldValue::Nested(inst) => inst.to_hash(),
            FieldValue::NestedMany(insts) => {
                Value::Array(insts.iter().map(|i| i.to_hash()).collect())
            }
            FieldValue::Raw(v) => v.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::Raw(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Raw(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Raw(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            FieldValue::Time(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&ResourceInstance> {
        match self {
            FieldValue::Nested(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_nested_many(&self) -> Option<&[ResourceInstance]> {
        match self {
            FieldValue::NestedMany(insts) => Some(insts),
            _ => None,
        }
    }

    pub fn as_ids(&self) -> Option<&[String]> {
        match self {
            FieldValue::Ids(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Raw(Value::Null))
    }
}

/// Converts one wire value into native form. Conversion is idempotent: a wire
/// value already in the converter's native shape comes back unchanged.
pub trait Converter: Send + Sync {
    fn convert(&self, wire: &Value) -> FieldValue;
}

struct StrConv;

impl Converter for StrConv {
    fn convert(&self, wire: &Value) -> FieldValue {
        match wire {
            Value::String(s) => FieldValue::Str(s.clone()),
            other => FieldValue::Raw(other.clone()),
        }
    }
}

struct BoolConv;

impl Converter for BoolConv {
    fn convert(&self, wire: &Value) -> FieldValue {
        match wire {
            Value::Bool(b) => FieldValue::Bool(*b),
            other => FieldValue::Raw(other.clone()),
        }
    }
}

struct IntConv;

impl Converter for IntConv {
    fn convert(&self, wire: &Value) -> FieldValue {
        match wire {
            Value::Number(n) if n.as_i64().is_some() => {
                FieldValue::Int(n.as_i64().unwrap_or_default())
            }
            other => FieldValue::Raw(other.clone()),
        }
    }
}

struct TimeConv;

impl Converter for TimeConv {
    fn convert(&self, wire: &Value) -> FieldValue {
        match wire {
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(t) => FieldValue::Time(t),
                Err(e) => {
                    tracing::warn!(value = %s, error = %e, "unparseable time, passing through");
                    FieldValue::Raw(wire.clone())
                }
            },
            other => FieldValue::Raw(other.clone()),
        }
    }
}

/// Tag-to-converter table. Built-ins cover Str/Bool/Int (identity) and Time
/// (RFC 3339 parse). Register custom tags during setup only; reads after
/// setup are lock-free.
pub struct ConverterRegistry {
    table: HashMap<TypeTag, Arc<dyn Converter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut table: HashMap<TypeTag, Arc<dyn Converter>> = HashMap::new();
        table.insert(TypeTag::Str, Arc::new(StrConv));
        table.insert(TypeTag::Bool, Arc::new(BoolConv));
        table.insert(TypeTag::Int, Arc::new(IntConv));
        table.insert(TypeTag::Time, Arc::new(TimeConv));
        ConverterRegistry { table }
    }
}

impl ConverterRegistry {
    pub fn register(&mut self, tag: TypeTag, converter: Arc<dyn Converter>) {
        self.table.insert(tag, converter);
    }

    /// Convert a wire value for the given tag. Wire null stays null. A tag
    /// without a converter logs and passes the value through unchanged.
    pub fn convert(&self, tag: TypeTag, wire: &Value) -> Result<FieldValue> {
        if wire.is_null() {
            return Ok(FieldValue::Null);
        }
        match self.table.get(&tag) {
            Some(conv) => Ok(conv.convert(wire)),
            None => {
                tracing::warn!(?tag, "no converter registered, passing value through");
                Ok(FieldValue::Raw(wire.clone()))
            }
        }
    }
}

/// Shared registry with the built-in converters. Descriptors built without an
/// explicit registry use this one.
pub fn builtin_registry() -> &'static Arc<ConverterRegistry> {
    static BUILTIN: OnceLock<Arc<ConverterRegistry>> = OnceLock::new();
    BUILTIN.get_or_init(|| Arc::new(ConverterRegistry::default()))
}

/// JSON type name for error messages.
pub fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
