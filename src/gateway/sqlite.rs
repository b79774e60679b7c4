//! SQLite-backed document store.
//!
//! One `documents` table holds every collection: the body is a JSON text
//! column, partial updates go through SQLite's `json_patch`, and counter
//! increments are a single `json_set` UPDATE so they stay atomic under
//! concurrent admin sessions.

use serde_json::Value;
use sqlx::{Row as _, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    apply_filters, DocEvent, DocEventKind, Document, Filter, Gateway, GatewayError,
};

/// Capacity of the change-feed channel. Slow consumers observe `Lagged` and
/// re-read from the store, so losing intermediate events is tolerable.
const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
    events: broadcast::Sender<DocEvent>,
}

impl std::fmt::Debug for SqliteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGateway").finish()
    }
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { pool, events }
    }

    /// Create the backing table if this is a fresh database.
    pub async fn init_schema(&self) -> Result<(), GatewayError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                doc        TEXT NOT NULL,
                rev        INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn emit(&self, collection: &str, id: &str, kind: DocEventKind) {
        // No listeners is fine; the send result only signals that case.
        drop(self.events.send(DocEvent {
            collection: collection.to_owned(),
            id: id.to_owned(),
            kind,
        }));
    }
}

impl Gateway for SqliteGateway {
    async fn fetch_all(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, GatewayError> {
        let rows = sqlx::query("SELECT id, rev, doc FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let docs = rows
            .into_iter()
            .map(|row| {
                let value: Value = serde_json::from_str(&row.get::<String, _>("doc"))?;
                Ok(Document {
                    id: row.get("id"),
                    rev: row.get("rev"),
                    value,
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;

        Ok(apply_filters(docs, filters))
    }

    async fn fetch_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, GatewayError> {
        let row = sqlx::query("SELECT id, rev, doc FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: Value = serde_json::from_str(&row.get::<String, _>("doc"))?;
                Ok(Some(Document {
                    id: row.get("id"),
                    rev: row.get("rev"),
                    value,
                }))
            }
            None => Ok(None),
        }
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

        let body = serde_json::to_string(&data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, doc, rev, updated_at)
                VALUES (?, ?, ?, 0, datetime('now'))
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(body)
        .execute(&self.pool)
        .await?;

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
        let body = serde_json::to_string(&patch)?;

        let result = match expected_rev {
            Some(rev) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                        SET doc = json_patch(doc, ?), rev = rev + 1, updated_at = datetime('now')
                        WHERE collection = ? AND id = ? AND rev = ?
                    "#,
                )
                .bind(&body)
                .bind(collection)
                .bind(id)
                .bind(rev)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE documents
                        SET doc = json_patch(doc, ?), rev = rev + 1, updated_at = datetime('now')
                        WHERE collection = ? AND id = ?
                    "#,
                )
                .bind(&body)
                .bind(collection)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            // Zero rows means either the document is gone or the revision
            // check lost a race; look again to tell the two apart.
            return match self.fetch_by_id(collection, id).await? {
                Some(_) => Err(GatewayError::Conflict {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                }),
                None => Err(GatewayError::NotFound {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                }),
            };
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
        let result = sqlx::query(
            r#"
            UPDATE documents
                SET doc = json_set(doc, '$.' || ?, COALESCE(json_extract(doc, '$.' || ?), 0) + ?),
                    rev = rev + 1,
                    updated_at = datetime('now')
                WHERE collection = ? AND id = ?
            "#,
        )
        .bind(field)
        .bind(field)
        .bind(delta)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }

        self.emit(collection, id, DocEventKind::Updated);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DocEvent> {
        self.events.subscribe()
    }
}
