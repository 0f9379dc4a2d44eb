//! resmap: declarative mapping layer binding typed resources to a JSON REST API.
//!
//! Resource types declare attributes, typed conversions, and associations
//! through descriptor builders; the layer handles marshalling, persistence,
//! association traversal, and scoped queries against a pluggable backend.

pub mod case;
pub mod collection;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod resource;
pub mod source;
pub mod validation;

pub use case::{DefaultKeyConverter, KeyConverter};
pub use collection::ScopedCollection;
pub use convert::{builtin_registry, Converter, ConverterRegistry, FieldValue, TypeTag};
pub use descriptor::{DescriptorBuilder, HasManyOptions, ResourceDescriptor};
pub use error::{Error, Result};
pub use resource::{Repo, ResourceInstance};
pub use source::{body_root, configure, Context, HttpSource, MemSource, RequestContext, Source};
pub use validation::{RuleValidator, ValidationRule, Validator};
