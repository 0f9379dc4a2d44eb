//! Per-type resource descriptors: attributes, associations, scopes, naming.

pub mod builder;
pub mod types;

pub use builder::{DescriptorBuilder, ResourceDescriptor};
pub use types::{
    Attribute, AttributeKind, BelongsTo, DescriptorRef, HasMany, HasManyOptions, Scope,
    ScopePredicate,
};
