//! In-memory simulation Source, selected when no transport target is
//! configured. Backs tests and local development; enumeration reflects the
//! store state at enumeration time.

use crate::error::{Error, Result};
use crate::resource::ResourceInstance;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{RequestContext, Source};

#[derive(Default)]
struct MemStore {
    /// Wire documents keyed by full location, e.g. "zoos/42".
    documents: HashMap<String, Value>,
    /// Sub-resource id lists keyed by "owner-location/relation".
    joins: HashMap<String, Vec<String>>,
}

/// Mutex-guarded document store. Ids are assigned on create.
#[derive(Default)]
pub struct MemSource {
    store: Mutex<MemStore>,
}

impl MemSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a wire document directly, for fixtures.
    pub fn seed(&self, location: &str, document: Value) {
        let mut store = self.store.lock().expect("mem store poisoned");
        store.documents.insert(location.to_string(), document);
    }

    /// Ids recorded by the last join update for `relation` under the owner
    /// location, if any.
    pub fn join_ids(&self, owner_location: &str, relation: &str) -> Option<Vec<String>> {
        let store = self.store.lock().expect("mem store poisoned");
        store
            .joins
            .get(&format!("{}/{}", owner_location, relation))
            .cloned()
    }

    pub fn document(&self, location: &str) -> Option<Value> {
        let store = self.store.lock().expect("mem store poisoned");
        store.documents.get(location).cloned()
    }
}

impl Source for MemSource {
    /// Exact location match returns the document; otherwise the current
    /// direct members under `path`, narrowed by exact-match filter pairs,
    /// as an array. `scope` parameters are ignored (no server-side scope
    /// evaluation in the simulation).
    fn get(&self, _ctx: &RequestContext, path: &str, query: &[(String, String)]) -> Result<Value> {
        let store = self.store.lock().expect("mem store poisoned");
        if let Some(doc) = store.documents.get(path) {
            return Ok(doc.clone());
        }
        let prefix = format!("{}/", path);
        let mut members: Vec<(&String, &Value)> = store
            .documents
            .iter()
            .filter(|(loc, _)| {
                loc.strip_prefix(&prefix)
                    .map(|rest| !rest.contains('/'))
                    .unwrap_or(false)
            })
            .filter(|(_, doc)| matches_filters(doc, query))
            .collect();
        members.sort_by(|a, b| a.0.cmp(b.0));
        Ok(Value::Array(members.into_iter().map(|(_, d)| d.clone()).collect()))
    }

    fn post(&self, _ctx: &RequestContext, instance: &ResourceInstance) -> Result<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut doc = instance.to_hash();
        if let Value::Object(map) = &mut doc {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        let location = format!("{}/{}", instance.collection_location(), id);
        tracing::debug!(location = %location, "mem post");
        let mut store = self.store.lock().expect("mem store poisoned");
        store.documents.insert(location, doc.clone());
        Ok(doc)
    }

    fn put(&self, _ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool> {
        let location = instance.location();
        tracing::debug!(location = %location, "mem put");
        let mut store = self.store.lock().expect("mem store poisoned");
        if !store.documents.contains_key(&location) {
            return Err(Error::DocumentNotFound);
        }
        store.documents.insert(location, instance.to_hash());
        Ok(true)
    }

    fn delete(&self, _ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool> {
        let location = instance.location();
        tracing::debug!(location = %location, "mem delete");
        let mut store = self.store.lock().expect("mem store poisoned");
        store
            .documents
            .remove(&location)
            .map(|_| true)
            .ok_or(Error::DocumentNotFound)
    }

    fn put_sub_resource(
        &self,
        _ctx: &RequestContext,
        owner: &ResourceInstance,
        relation: &str,
        ids: &[String],
    ) -> Result<bool> {
        let key = format!("{}/{}", owner.location(), relation);
        tracing::debug!(key = %key, count = ids.len(), "mem put_sub_resource");
        let mut store = self.store.lock().expect("mem store poisoned");
        store.joins.insert(key, ids.to_vec());
        Ok(true)
    }
}

/// Every non-scope query pair must match the stored document's value for
/// that key, compared in string form.
fn matches_filters(doc: &Value, query: &[(String, String)]) -> bool {
    query
        .iter()
        .filter(|(key, _)| key.as_str() != "scope")
        .all(|(key, expected)| match doc.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == *expected,
            Some(Value::Bool(b)) => b.to_string() == *expected,
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_returns_document_or_members() {
        let mem = MemSource::new();
        mem.seed("zoos/1", json!({"id": "1", "name": "a"}));
        mem.seed("zoos/2", json!({"id": "2", "name": "b"}));
        mem.seed("zoos/1/animals/7", json!({"id": "7", "kind": "ape"}));
        let ctx = RequestContext::new();

        let doc = mem.get(&ctx, "zoos/1", &[]).unwrap();
        assert_eq!(doc["name"], "a");

        let list = mem.get(&ctx, "zoos", &[]).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 2);

        let children = mem.get(&ctx, "zoos/1/animals", &[]).unwrap();
        assert_eq!(children.as_array().unwrap().len(), 1);
    }

    #[test]
    fn filters_narrow_collection_get() {
        let mem = MemSource::new();
        mem.seed("zoos/1", json!({"id": "1", "name": "berlin", "open": true}));
        mem.seed("zoos/2", json!({"id": "2", "name": "hamburg", "open": false}));
        let ctx = RequestContext::new();

        let by_name = vec![("name".to_string(), "berlin".to_string())];
        let list = mem.get(&ctx, "zoos", &by_name).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], "1");

        // Non-string values match in string form.
        let by_open = vec![("open".to_string(), "false".to_string())];
        let list = mem.get(&ctx, "zoos", &by_open).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], "2");

        let no_match = vec![("name".to_string(), "paris".to_string())];
        let list = mem.get(&ctx, "zoos", &no_match).unwrap();
        assert_eq!(list, json!([]));

        // Scope parameters stay unevaluated.
        let scoped = vec![("scope".to_string(), "whatever".to_string())];
        let list = mem.get(&ctx, "zoos", &scoped).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 2);
    }

    #[test]
    fn get_on_empty_collection_is_empty_array() {
        let mem = MemSource::new();
        let list = mem.get(&RequestContext::new(), "zoos", &[]).unwrap();
        assert_eq!(list, json!([]));
    }
}
