//! Resource instances: field storage, marshalling, and persistence.

use crate::collection::ScopedCollection;
use crate::convert::FieldValue;
use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};
use crate::source::Context;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One typed entity mapped to a remote collection. Holds native field values,
/// identity, and the backend context it was created under. Nested (embedded)
/// instances carry no context and cannot be persisted on their own.
#[derive(Clone)]
pub struct ResourceInstance {
    descriptor: &'static ResourceDescriptor,
    context: Option<Context>,
    /// Collection path this instance belongs to ("zoos", "zoos/1/animals").
    collection_location: String,
    id: Option<String>,
    values: BTreeMap<String, FieldValue>,
    /// Only `id` is trustworthy; any other field read forces a load.
    stub: bool,
    /// The instance that created this instance's collection context.
    parent: Option<Box<ResourceInstance>>,
}

impl ResourceInstance {
    /// Construct from a wire document (camel-cased keys). Every declared
    /// attribute is marshalled through the converter registry; absent wire
    /// values stay absent.
    pub fn from_wire(
        descriptor: &'static ResourceDescriptor,
        context: Option<Context>,
        collection_location: String,
        wire: &Value,
    ) -> Result<Self> {
        let Value::Object(map) = wire else {
            return Err(Error::ShapeMismatch {
                field: descriptor.type_name.to_string(),
                got: crate::convert::json_type_name(wire),
            });
        };
        let mut values = BTreeMap::new();
        for attr in &descriptor.attributes {
            if let Some(v) = map.get(&attr.json_name) {
                let converted = attr.from_wire(descriptor.converters(), v)?;
                if !converted.is_null() {
                    values.insert(attr.name.clone(), converted);
                }
            }
        }
        for hm in &descriptor.has_many {
            if let Some(v) = map.get(&hm.ids_json_name) {
                match v {
                    Value::Array(items) => {
                        let ids = items.iter().map(id_string).collect();
                        values.insert(hm.ids_field.clone(), FieldValue::Ids(ids));
                    }
                    Value::Null => {}
                    other => {
                        tracing::warn!(
                            field = %hm.ids_field,
                            got = crate::convert::json_type_name(other),
                            "expected an array of ids, passing through"
                        );
                        values.insert(hm.ids_field.clone(), FieldValue::Raw(other.clone()));
                    }
                }
            }
        }
        let id = map.get("id").map(id_string).filter(|s| !s.is_empty());
        Ok(ResourceInstance {
            descriptor,
            context,
            collection_location,
            id,
            values,
            stub: false,
            parent: None,
        })
    }

    /// Construct from native values (in-process construction and tests).
    /// Values are stored directly, no conversion applied.
    pub fn from_native(
        descriptor: &'static ResourceDescriptor,
        context: Option<Context>,
        collection_location: String,
        fields: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Self {
        let mut values = BTreeMap::new();
        let mut id = None;
        for (name, value) in fields {
            if name == "id" {
                id = value.as_str().map(str::to_string).filter(|s| !s.is_empty());
            } else {
                values.insert(name, value);
            }
        }
        ResourceInstance {
            descriptor,
            context,
            collection_location,
            id,
            values,
            stub: false,
            parent: None,
        }
    }

    /// Embedded instance: no context, no network identity.
    pub fn nested_from_wire(descriptor: &'static ResourceDescriptor, wire: &Value) -> Result<Self> {
        Self::from_wire(descriptor, None, descriptor.resource_name.clone(), wire)
    }

    /// Lazy reference carrying only an id. The first read of any other field
    /// fetches the full document.
    pub fn stub(
        descriptor: &'static ResourceDescriptor,
        context: Context,
        collection_location: String,
        id: &str,
    ) -> Self {
        ResourceInstance {
            descriptor,
            context: Some(context),
            collection_location,
            id: Some(id.to_string()),
            values: BTreeMap::new(),
            stub: true,
            parent: None,
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    pub fn is_stub(&self) -> bool {
        self.stub
    }

    /// Collection path this instance belongs to.
    pub fn collection_location(&self) -> String {
        self.collection_location.clone()
    }

    /// Addressable path: collection location plus id once persisted.
    pub fn location(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{}", self.collection_location, id),
            None => self.collection_location.clone(),
        }
    }

    /// Field read without load-on-access. Used internally by marshalling and
    /// validation; callers generally want [`get`](Self::get).
    pub fn raw_field(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Read a field, forcing a fetch first when this instance is a stub.
    pub fn get(&mut self, name: &str) -> Result<FieldValue> {
        self.ensure_loaded()?;
        Ok(self.values.get(name).cloned().unwrap_or(FieldValue::Null))
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if !self.stub {
            return Ok(());
        }
        let ctx = self
            .context
            .clone()
            .ok_or_else(|| Error::MissingContext(self.descriptor.type_name.to_string()))?;
        let location = self.location();
        tracing::debug!(location = %location, "stub access forces load");
        let wire = ctx.source.get(&ctx.request, &location, &[])?;
        if !wire.is_object() {
            return Err(Error::DocumentNotFound);
        }
        let loaded = Self::from_wire(
            self.descriptor,
            Some(ctx),
            self.collection_location.clone(),
            &wire,
        )?;
        self.values = loaded.values;
        if loaded.id.is_some() {
            self.id = loaded.id;
        }
        self.stub = false;
        Ok(())
    }

    /// Wire-form map of every non-read-only attribute at its wire name, nested
    /// values serialized recursively, plus the id when present. Read-only
    /// attributes are never echoed back to the wire.
    pub fn to_hash(&self) -> Value {
        let mut out = Map::new();
        for attr in &self.descriptor.attributes {
            if attr.read_only {
                continue;
            }
            let v = self
                .values
                .get(&attr.name)
                .map(FieldValue::to_json)
                .unwrap_or(Value::Null);
            out.insert(attr.json_name.clone(), v);
        }
        for hm in &self.descriptor.has_many {
            if hm.read_only {
                continue;
            }
            if let Some(ids) = self.values.get(&hm.ids_field) {
                out.insert(hm.ids_json_name.clone(), ids.to_json());
            }
        }
        if let Some(id) = &self.id {
            out.insert("id".to_string(), Value::String(id.clone()));
        }
        Value::Object(out)
    }

    /// True iff the id is absent or empty — the sole create-vs-update
    /// discriminant. `"0"` is an id like any other.
    pub fn new_record(&self) -> bool {
        match &self.id {
            None => true,
            Some(id) => id.is_empty(),
        }
    }

    /// Persist through the configured Source. Returns `Ok(false)` when the
    /// attached validator rejects the instance (no Source call is made) or
    /// when a sub-resource join update fails after the owner write — the
    /// owner write is not rolled back; callers retry the relation update.
    pub fn save(&mut self) -> Result<bool> {
        let ctx = self
            .context
            .clone()
            .ok_or_else(|| Error::MissingContext(self.descriptor.type_name.to_string()))?;
        if let Some(validator) = self.descriptor.validator() {
            if !validator.validate(self) {
                tracing::debug!(type_name = %self.descriptor.type_name, "save rejected by validator");
                return Ok(false);
            }
        }
        if self.new_record() {
            let created = ctx.source.post(&ctx.request, self)?;
            if let Some(id) = created.get("id") {
                let id = id_string(id);
                if !id.is_empty() {
                    self.id = Some(id);
                }
            }
        } else if !ctx.source.put(&ctx.request, self)? {
            return Ok(false);
        }
        for hm in &self.descriptor.has_many {
            if !hm.sub_resource {
                continue;
            }
            let ids: Vec<String> = self
                .values
                .get(&hm.ids_field)
                .and_then(|v| v.as_ids())
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            if !ctx
                .source
                .put_sub_resource(&ctx.request, self, &hm.name, &ids)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete through the configured Source. The Source raises on failure
    /// rather than returning false, so a normal return is always `true`.
    /// Further `save`/`delete` on this instance is a caller error.
    pub fn delete(&self) -> Result<bool> {
        let ctx = self
            .context
            .as_ref()
            .ok_or_else(|| Error::MissingContext(self.descriptor.type_name.to_string()))?;
        ctx.source.delete(&ctx.request, self)?;
        Ok(true)
    }

    /// Back-reference accessor. Errors when the association is not declared
    /// or the instance was not created through a parent's collection.
    pub fn parent(&self, name: &str) -> Result<&ResourceInstance> {
        if !self.descriptor.has_belongs_to(name) {
            return Err(Error::NoParent(name.to_string()));
        }
        self.parent
            .as_deref()
            .ok_or_else(|| Error::NoParent(name.to_string()))
    }

    pub(crate) fn set_parent(&mut self, parent: ResourceInstance) {
        self.parent = Some(Box::new(parent));
    }

    /// Lazily-built child collection for a has-many association, bound under
    /// this instance's location.
    pub fn related(&self, name: &str) -> Result<ScopedCollection> {
        let hm = self
            .descriptor
            .association(name)
            .ok_or_else(|| Error::NoParent(name.to_string()))?;
        let ctx = self
            .context
            .clone()
            .ok_or_else(|| Error::MissingContext(self.descriptor.type_name.to_string()))?;
        let location = format!("{}/{}", self.location(), hm.url_part);
        Ok(ScopedCollection::with_owner(
            ctx,
            hm.related,
            location,
            self.clone(),
        ))
    }

    /// Ordered raw ids of a has-many association, backed by field storage.
    pub fn related_ids(&mut self, name: &str) -> Result<Vec<String>> {
        let ids_field = self
            .descriptor
            .association(name)
            .map(|hm| hm.ids_field.clone())
            .ok_or_else(|| Error::NoParent(name.to_string()))?;
        Ok(self
            .get(&ids_field)?
            .as_ids()
            .map(<[String]>::to_vec)
            .unwrap_or_default())
    }
}

/// Value-based identity on id only: equal iff same concrete type and same
/// non-empty id. Two transient instances (absent ids) are never equal, even
/// to themselves by value.
impl PartialEq for ResourceInstance {
    fn eq(&self, other: &Self) -> bool {
        if self.descriptor.type_name != other.descriptor.type_name {
            return false;
        }
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for ResourceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.descriptor.type_name)
            .field("id", &self.id)
            .field("stub", &self.stub)
            .field("values", &self.values)
            .finish()
    }
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Context-bound facade over one resource type: the same named operations as
/// the type, with the backend context already attached.
#[derive(Clone, Debug)]
pub struct Repo {
    descriptor: &'static ResourceDescriptor,
    context: Context,
}

impl Repo {
    pub fn new(descriptor: &'static ResourceDescriptor, context: Context) -> Self {
        Repo {
            descriptor,
            context,
        }
    }

    /// Fetch one instance by id; a missing or non-document response is the
    /// normalized not-found condition.
    pub fn find(&self, id: &str) -> Result<ResourceInstance> {
        let location = format!("{}/{}", self.descriptor.resource_name, id);
        let wire = self
            .context
            .source
            .get(&self.context.request, &location, &[])?;
        if !wire.is_object() {
            return Err(Error::DocumentNotFound);
        }
        ResourceInstance::from_wire(
            self.descriptor,
            Some(self.context.clone()),
            self.descriptor.resource_name.clone(),
            &wire,
        )
    }

    /// Deferred query over the whole collection.
    pub fn all(&self) -> ScopedCollection {
        ScopedCollection::new(
            self.context.clone(),
            self.descriptor,
            self.descriptor.resource_name.clone(),
        )
    }

    /// Deferred query with a named scope applied.
    pub fn scoped(&self, name: &str) -> ScopedCollection {
        self.all().scoped(name)
    }

    /// In-process construction from native values; nothing is persisted
    /// until `save`.
    pub fn build(&self, fields: Vec<(String, FieldValue)>) -> ResourceInstance {
        ResourceInstance::from_native(
            self.descriptor,
            Some(self.context.clone()),
            self.descriptor.resource_name.clone(),
            fields,
        )
    }

    /// Construction from a wire document (camel keys), attributes marshalled
    /// through the converter registry.
    pub fn from_wire(&self, wire: &Value) -> Result<ResourceInstance> {
        ResourceInstance::from_wire(
            self.descriptor,
            Some(self.context.clone()),
            self.descriptor.resource_name.clone(),
            wire,
        )
    }

    /// Lazy reference by id; field access forces a fetch.
    pub fn stub(&self, id: &str) -> ResourceInstance {
        ResourceInstance::stub(
            self.descriptor,
            self.context.clone(),
            self.descriptor.resource_name.clone(),
            id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::TypeTag;
    use crate::source::{MemSource, RequestContext, Source};
    use crate::validation::{RuleValidator, ValidationRule};
    use serde_json::json;
    use std::sync::{Arc, OnceLock};

    fn animal() -> &'static ResourceDescriptor {
        static D: OnceLock<ResourceDescriptor> = OnceLock::new();
        D.get_or_init(|| {
            ResourceDescriptor::builder("Animal")
                .attribute("kind", TypeTag::Str)
                .attribute("age", TypeTag::Int)
                .attribute("male", TypeTag::Bool)
                .belongs_to("zoo")
                .build()
        })
    }

    fn zoo() -> &'static ResourceDescriptor {
        static D: OnceLock<ResourceDescriptor> = OnceLock::new();
        D.get_or_init(|| {
            ResourceDescriptor::builder("Zoo")
                .attribute("name", TypeTag::Str)
                .attribute("open", TypeTag::Bool)
                .read_only_attribute("ro1", TypeTag::Str)
                .has_many("animals", animal)
                .build()
        })
    }

    fn strict_zoo() -> &'static ResourceDescriptor {
        static D: OnceLock<ResourceDescriptor> = OnceLock::new();
        D.get_or_init(|| {
            ResourceDescriptor::builder("StrictZoo")
                .attribute("name", TypeTag::Str)
                .validator(Arc::new(RuleValidator::default().rule(
                    "name",
                    ValidationRule {
                        required: Some(true),
                        ..Default::default()
                    },
                )))
                .build()
        })
    }

    fn mem_repo(descriptor: &'static ResourceDescriptor) -> (Arc<MemSource>, Repo) {
        let mem = Arc::new(MemSource::new());
        let source: Arc<dyn Source> = mem.clone();
        let context = Context::new(source, RequestContext::new());
        (mem, Repo::new(descriptor, context))
    }

    #[test]
    fn new_record_iff_id_absent_or_empty() {
        let (_, repo) = mem_repo(zoo());
        let mut z = repo.build(vec![]);
        assert!(z.new_record());
        z.set_id("");
        assert!(z.new_record());
        z.set_id("0");
        assert!(!z.new_record());
        z.set_id("abc");
        assert!(!z.new_record());
    }

    #[test]
    fn equality_is_id_based() {
        let (_, repo) = mem_repo(zoo());
        let mut a = repo.build(vec![("name".to_string(), FieldValue::Str("a".into()))]);
        let mut b = repo.build(vec![("name".to_string(), FieldValue::Str("b".into()))]);
        // Transient instances are never equal, whatever their fields.
        assert_ne!(a, b);
        a.set_id("7");
        b.set_id("7");
        assert_eq!(a, b);
        b.set_id("8");
        assert_ne!(a, b);

        let (_, animals) = mem_repo(animal());
        let mut c = animals.build(vec![]);
        c.set_id("7");
        assert_ne!(a, c);
    }

    #[test]
    fn to_hash_never_includes_read_only_attributes() {
        let (_, repo) = mem_repo(zoo());
        let z = repo
            .from_wire(&json!({"name": "berlin", "open": true, "ro1": "server-side"}))
            .unwrap();
        assert_eq!(z.raw_field("ro1").and_then(|v| v.as_str()), Some("server-side"));
        let hash = z.to_hash();
        assert!(hash.get("ro1").is_none());
        assert_eq!(hash["name"], "berlin");
    }

    #[test]
    fn save_create_then_update() {
        let (mem, repo) = mem_repo(zoo());
        let mut z = repo.build(vec![("name".to_string(), FieldValue::Str("berlin".into()))]);
        assert!(z.save().unwrap());
        let id = z.id().expect("assigned id").to_string();
        assert!(!z.new_record());
        assert_eq!(mem.document(&format!("zoos/{}", id)).unwrap()["name"], "berlin");

        z.set("name", FieldValue::Str("tierpark".into()));
        assert!(z.save().unwrap());
        assert_eq!(
            mem.document(&format!("zoos/{}", id)).unwrap()["name"],
            "tierpark"
        );
    }

    #[test]
    fn delete_then_redelete_raises() {
        let (_, repo) = mem_repo(zoo());
        let mut z = repo.build(vec![]);
        z.save().unwrap();
        assert!(z.delete().unwrap());
        assert!(matches!(z.delete(), Err(Error::DocumentNotFound)));
    }

    #[test]
    fn stub_access_forces_load() {
        let (mem, repo) = mem_repo(zoo());
        mem.seed("zoos/5", json!({"id": "5", "name": "seeded", "open": false}));
        let mut z = repo.stub("5");
        assert!(z.is_stub());
        assert_eq!(z.get("name").unwrap().as_str(), Some("seeded"));
        assert!(!z.is_stub());
    }

    #[test]
    fn stub_of_missing_document_raises_on_access() {
        let (_, repo) = mem_repo(zoo());
        let mut z = repo.stub("nope");
        assert!(matches!(z.get("name"), Err(Error::DocumentNotFound)));
    }

    #[test]
    fn validator_short_circuits_save() {
        let (mem, repo) = mem_repo(strict_zoo());
        let mut z = repo.build(vec![]);
        assert!(!z.save().unwrap());
        // Fail fast: no partial write reached the store.
        assert!(z.new_record());
        assert_eq!(
            mem.get(&RequestContext::new(), "strictzoos", &[]).unwrap(),
            json!([])
        );

        z.set("name", FieldValue::Str("ok".into()));
        assert!(z.save().unwrap());
    }

    #[test]
    fn find_missing_is_not_found() {
        let (_, repo) = mem_repo(zoo());
        assert!(matches!(repo.find("missing"), Err(Error::DocumentNotFound)));
    }

    #[test]
    fn belongs_to_requires_parent_context() {
        let (_, repo) = mem_repo(animal());
        let a = repo.build(vec![]);
        assert!(matches!(a.parent("zoo"), Err(Error::NoParent(_))));
        // Undeclared association names are an error too.
        assert!(matches!(a.parent("aquarium"), Err(Error::NoParent(_))));
    }
}
