//! In-memory gateway used by the rule-engine tests. Mirrors the SQLite
//! implementation's semantics (merge-patch, revisions, change feed) without
//! touching disk.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    apply_filters, DocEvent, DocEventKind, Document, Filter, Gateway, GatewayError,
};

#[derive(Debug)]
pub(crate) struct MemoryGateway {
    collections: Mutex<HashMap<String, BTreeMap<String, (Value, i64)>>>,
    events: broadcast::Sender<DocEvent>,
}

impl MemoryGateway {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            collections: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Seed a document with a known id, bypassing `create`.
    pub(crate) fn seed(&self, collection: &str, id: &str, value: Value) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), (value, 0));
    }

    fn emit(&self, collection: &str, id: &str, kind: DocEventKind) {
        drop(self.events.send(DocEvent {
            collection: collection.to_owned(),
            id: id.to_owned(),
            kind,
        }));
    }
}

/// RFC 7386 merge patch: objects merge recursively, null removes a key.
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(entries) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            let obj = target.as_object_mut().unwrap();
            for (key, value) in entries {
                if value.is_null() {
                    obj.remove(key);
                } else {
                    merge_patch(obj.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        other => *target = other.clone(),
    }
}

impl Gateway for MemoryGateway {
    async fn fetch_all(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, GatewayError> {
        let collections = self.collections.lock().unwrap();
        let docs = collections
            .get(collection)
            .map(|coll| {
                coll.iter()
                    .map(|(id, (value, rev))| Document {
                        id: id.clone(),
                        rev: *rev,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(apply_filters(docs, filters))
    }

    async fn fetch_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, GatewayError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections.get(collection).and_then(|coll| {
            coll.get(id).map(|(value, rev)| Document {
                id: id.to_owned(),
                rev: *rev,
                value: value.clone(),
            })
        }))
    }

    async fn create(&self, collection: &str, mut data: Value) -> Result<String, GatewayError> {
        let id = match data.get("id").and_then(Value::as_str) {
            Some(id) => id.to_owned(),
            None => {
                let id = Uuid::new_v4().to_string();
                if let Some(obj) = data.as_object_mut() {
                    obj.insert("id".to_owned(), Value::String(id.clone()));
                }
                id
            }
        };

        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), (data, 0));

        self.emit(collection, &id, DocEventKind::Created);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_rev: Option<i64>,
    ) -> Result<(), GatewayError> {
        {
            let mut collections = self.collections.lock().unwrap();
            let entry = collections
                .get_mut(collection)
                .and_then(|coll| coll.get_mut(id))
                .ok_or_else(|| GatewayError::NotFound {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                })?;

            if let Some(rev) = expected_rev {
                if entry.1 != rev {
                    return Err(GatewayError::Conflict {
                        collection: collection.to_owned(),
                        id: id.to_owned(),
                    });
                }
            }

            merge_patch(&mut entry.0, &patch);
            entry.1 += 1;
        }

        self.emit(collection, id, DocEventKind::Updated);
        Ok(())
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), GatewayError> {
        {
            let mut collections = self.collections.lock().unwrap();
            let entry = collections
                .get_mut(collection)
                .and_then(|coll| coll.get_mut(id))
                .ok_or_else(|| GatewayError::NotFound {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                })?;

            let current = entry.0.get(field).and_then(Value::as_i64).unwrap_or(0);
            if let Some(obj) = entry.0.as_object_mut() {
                obj.insert(field.to_owned(), Value::from(current + delta));
            }
            entry.1 += 1;
        }

        self.emit(collection, id, DocEventKind::Updated);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DocEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_patch_replaces_and_removes() -> anyhow::Result<()> {
        let gw = MemoryGateway::new();
        gw.seed("things", "t1", json!({"id": "t1", "a": 1, "b": "x"}));

        gw.update("things", "t1", json!({"a": 2, "b": null}), None)
            .await?;

        let doc = gw.fetch_by_id("things", "t1").await?.unwrap();
        assert_eq!(doc.value, json!({"id": "t1", "a": 2}));
        assert_eq!(doc.rev, 1);
        Ok(())
    }

    #[tokio::test]
    async fn stale_revision_conflicts() -> anyhow::Result<()> {
        let gw = MemoryGateway::new();
        gw.seed("things", "t1", json!({"id": "t1", "n": 0}));

        gw.update("things", "t1", json!({"n": 1}), Some(0)).await?;
        let err = gw
            .update("things", "t1", json!({"n": 2}), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn increment_treats_missing_as_zero() -> anyhow::Result<()> {
        let gw = MemoryGateway::new();
        gw.seed("things", "t1", json!({"id": "t1"}));

        gw.increment_field("things", "t1", "count", 3).await?;
        gw.increment_field("things", "t1", "count", 1).await?;

        let doc = gw.fetch_by_id("things", "t1").await?.unwrap();
        assert_eq!(doc.value.get("count"), Some(&json!(4)));
        Ok(())
    }
}
