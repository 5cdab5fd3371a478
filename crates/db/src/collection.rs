use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{DocumentId, StoreError, StoreResult, SurrealClient};

/// Write-time rules for documents stored in a [`Collection`].
pub trait Schema: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Reject documents that must never be persisted.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A stored document together with the metadata the store maintains for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: DocumentId,
    #[serde(flatten)]
    pub doc: T,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Shape of a document as it sits in its table.
///
/// The document id is kept as a plain field next to the record key so rows
/// sort by it and decode without touching SurrealDB's record id type.
#[derive(Serialize, Deserialize)]
struct Row<T> {
    doc_id: String,
    doc: T,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl<T> Row<T> {
    fn into_record(self) -> StoreResult<Record<T>> {
        Ok(Record {
            id: self.doc_id.parse()?,
            doc: self.doc,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ALL: &str = "SELECT * FROM type::table($tb) ORDER BY doc_id ASC";
const SELECT_ONE: &str = "SELECT * FROM type::thing($tb, $id)";
const CREATE: &str = "CREATE type::thing($tb, $id) CONTENT $row";
const REPLACE_DOC: &str =
    "UPDATE type::thing($tb, $id) SET doc = $doc, updated_at = $now RETURN AFTER";
const DELETE: &str = "DELETE type::thing($tb, $id) RETURN BEFORE";

/// Typed view over one SurrealDB table.
///
/// Each method is a single statement, so each call is atomic with respect to
/// the others. Sequences of calls are not.
pub struct Collection<T> {
    client: SurrealClient,
    name: Arc<str>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            name: self.name.clone(),
            _doc: PhantomData,
        }
    }
}

impl<T: Schema> Collection<T> {
    pub(crate) fn new(client: SurrealClient, name: &str) -> Self {
        Self {
            client,
            name: Arc::from(name),
            _doc: PhantomData,
        }
    }

    /// Validate and store `doc` under a freshly generated id.
    pub async fn insert_one(&self, doc: T) -> StoreResult<Record<T>> {
        self.check(&doc)?;
        let id = DocumentId::generate();
        let now = OffsetDateTime::now_utc();
        let row = Row {
            doc_id: id.to_string(),
            doc,
            created_at: now,
            updated_at: now,
        };

        let mut response = self
            .client
            .query(CREATE)
            .bind(("tb", self.name.to_string()))
            .bind(("id", id.to_string()))
            .bind(("row", row))
            .await?;
        let created: Option<Row<T>> = response.take(0)?;

        tracing::debug!(target: "bookstore-db", collection = %self.name, %id, "document inserted");

        created
            .ok_or_else(|| StoreError::DocumentNotFound {
                id,
                collection: self.name.to_string(),
            })?
            .into_record()
    }

    /// All documents in insertion order.
    pub async fn find_all(&self) -> StoreResult<Vec<Record<T>>> {
        let mut response = self
            .client
            .query(SELECT_ALL)
            .bind(("tb", self.name.to_string()))
            .await?;
        let rows: Vec<Row<T>> = response.take(0)?;
        rows.into_iter().map(Row::into_record).collect()
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Record<T>>> {
        let id: DocumentId = id.parse()?;
        let mut response = self
            .client
            .query(SELECT_ONE)
            .bind(("tb", self.name.to_string()))
            .bind(("id", id.to_string()))
            .await?;
        let row: Option<Row<T>> = response.take(0)?;
        row.map(Row::into_record).transpose()
    }

    /// Replace the document body, returning the updated record.
    pub async fn find_by_id_and_update(&self, id: &str, doc: T) -> StoreResult<Option<Record<T>>> {
        let id: DocumentId = id.parse()?;
        self.check(&doc)?;
        self.replace(id, doc).await
    }

    /// Add `delta` to the integer at `field` inside the document and clamp
    /// the result to `min..=max`, all in one `UPDATE` statement.
    ///
    /// Concurrent calls never overwrite each other's change. `field` is a
    /// dotted path of plain identifiers, spliced into the statement.
    pub async fn find_by_id_and_clamp_add(
        &self,
        id: &str,
        field: &'static str,
        delta: i64,
        min: i64,
        max: i64,
    ) -> StoreResult<Option<Record<T>>> {
        let id: DocumentId = id.parse()?;
        if !is_field_path(field) {
            return Err(StoreError::InvalidField(field));
        }

        // The stored value already lies in min..=max, so this keeps the sum in range.
        let span = max.saturating_sub(min);
        let delta = delta.clamp(-span, span);
        let statement = format!(
            "UPDATE type::thing($tb, $id) \
             SET doc.{field} = math::max([$min, math::min([$max, doc.{field} + $delta])]), \
             updated_at = $now RETURN AFTER"
        );

        let mut response = self
            .client
            .query(statement)
            .bind(("tb", self.name.to_string()))
            .bind(("id", id.to_string()))
            .bind(("delta", delta))
            .bind(("min", min))
            .bind(("max", max))
            .bind(("now", timestamp()?))
            .await?;
        let row: Option<Row<T>> = response.take(0)?;
        row.map(Row::into_record).transpose()
    }

    /// Remove the document, returning what was stored.
    pub async fn find_by_id_and_delete(&self, id: &str) -> StoreResult<Option<Record<T>>> {
        let id: DocumentId = id.parse()?;
        let mut response = self
            .client
            .query(DELETE)
            .bind(("tb", self.name.to_string()))
            .bind(("id", id.to_string()))
            .await?;
        let row: Option<Row<T>> = response.take(0)?;
        row.map(Row::into_record).transpose()
    }

    /// Write a previously fetched record back, overwriting the stored body.
    ///
    /// Fails with [`StoreError::DocumentNotFound`] when the document has been
    /// deleted since it was fetched.
    pub async fn save(&self, record: &mut Record<T>) -> StoreResult<()> {
        self.check(&record.doc)?;
        let saved = self
            .replace(record.id, record.doc.clone())
            .await?
            .ok_or_else(|| StoreError::DocumentNotFound {
                id: record.id,
                collection: self.name.to_string(),
            })?;
        record.updated_at = saved.updated_at;
        Ok(())
    }

    async fn replace(&self, id: DocumentId, doc: T) -> StoreResult<Option<Record<T>>> {
        let mut response = self
            .client
            .query(REPLACE_DOC)
            .bind(("tb", self.name.to_string()))
            .bind(("id", id.to_string()))
            .bind(("doc", doc))
            .bind(("now", timestamp()?))
            .await?;
        let row: Option<Row<T>> = response.take(0)?;
        row.map(Row::into_record).transpose()
    }

    fn check(&self, doc: &T) -> StoreResult<()> {
        doc.validate().map_err(|reason| StoreError::Schema {
            collection: self.name.to_string(),
            reason,
        })
    }
}

fn timestamp() -> StoreResult<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn is_field_path(field: &str) -> bool {
    field.split('.').all(|part| {
        part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        label: String,
        value: u32,
    }

    impl Schema for Counter {
        fn validate(&self) -> Result<(), String> {
            if self.label.is_empty() {
                return Err("label: Path `label` is required.".to_string());
            }
            Ok(())
        }
    }

    fn counter(label: &str, value: u32) -> Counter {
        Counter {
            label: label.to_string(),
            value,
        }
    }

    async fn counters() -> Collection<Counter> {
        Database::in_memory("test")
            .await
            .unwrap()
            .collection("counters")
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let counters = counters().await;
        let record = counters.insert_one(counter("a", 1)).await.unwrap();

        assert_eq!(record.doc, counter("a", 1));
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(counters.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_all_keeps_insertion_order() {
        let counters = counters().await;
        for label in ["c", "a", "b"] {
            counters.insert_one(counter(label, 0)).await.unwrap();
        }

        let labels: Vec<String> = counters
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.doc.label)
            .collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn malformed_id_is_an_error_not_a_miss() {
        let counters = counters().await;
        let err = counters.find_by_id("12345").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(ref value) if value == "12345"));
    }

    #[tokio::test]
    async fn absent_id_yields_none() {
        let counters = counters().await;
        let id = DocumentId::generate().to_string();

        assert!(counters.find_by_id(&id).await.unwrap().is_none());
        assert!(counters
            .find_by_id_and_update(&id, counter("x", 1))
            .await
            .unwrap()
            .is_none());
        assert!(counters
            .find_by_id_and_clamp_add(&id, "value", 1, 0, 10)
            .await
            .unwrap()
            .is_none());
        assert!(counters.find_by_id_and_delete(&id).await.unwrap().is_none());
        assert!(counters.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_violation_is_not_persisted() {
        let counters = counters().await;
        let err = counters.insert_one(counter("", 1)).await.unwrap_err();

        assert!(matches!(err, StoreError::Schema { .. }));
        assert!(counters.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_body_and_keeps_created_at() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 1)).await.unwrap();

        let updated = counters
            .find_by_id_and_update(&created.id.to_string(), counter("b", 2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.doc, counter("b", 2));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn delete_returns_the_removed_document() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 3)).await.unwrap();
        let id = created.id.to_string();

        let removed = counters.find_by_id_and_delete(&id).await.unwrap().unwrap();
        assert_eq!(removed.doc, counter("a", 3));
        assert!(counters.find_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_after_delete_fails() {
        let counters = counters().await;
        let mut record = counters.insert_one(counter("a", 1)).await.unwrap();
        counters
            .find_by_id_and_delete(&record.id.to_string())
            .await
            .unwrap();

        record.doc.value = 9;
        let err = counters.save(&mut record).await.unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn interleaved_load_and_save_loses_an_update() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 10)).await.unwrap();
        let id = created.id.to_string();

        let mut first = counters.find_by_id(&id).await.unwrap().unwrap();
        let mut second = counters.find_by_id(&id).await.unwrap().unwrap();

        first.doc.value += 1;
        second.doc.value += 5;
        counters.save(&mut first).await.unwrap();
        counters.save(&mut second).await.unwrap();

        let stored = counters.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.doc.value, 15);
    }

    #[tokio::test]
    async fn clamp_add_respects_floor_and_ceiling() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 5)).await.unwrap();
        let id = created.id.to_string();

        let lowered = counters
            .find_by_id_and_clamp_add(&id, "value", -1000, 0, 100)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lowered.doc.value, 0);

        let raised = counters
            .find_by_id_and_clamp_add(&id, "value", i64::MAX, 0, 100)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raised.doc.value, 100);
        assert_eq!(raised.created_at, created.created_at);
    }

    #[tokio::test]
    async fn clamp_add_rejects_unsafe_field_paths() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 5)).await.unwrap();

        let err = counters
            .find_by_id_and_clamp_add(&created.id.to_string(), "value = 0; --", 1, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_clamp_add_applies_every_committed_change() {
        let counters = counters().await;
        let created = counters.insert_one(counter("a", 0)).await.unwrap();
        let id = created.id.to_string();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let counters = counters.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    counters
                        .find_by_id_and_clamp_add(&id, "value", 1, 0, i64::from(u32::MAX))
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                committed += 1;
            }
        }

        // A statement either commits its increment or fails outright.
        assert!(committed > 0);
        let stored = counters.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.doc.value, committed);
    }

    #[test]
    fn field_paths_must_be_identifiers() {
        assert!(is_field_path("copies"));
        assert!(is_field_path("stock.on_hand"));
        assert!(!is_field_path(""));
        assert!(!is_field_path("1st"));
        assert!(!is_field_path("a..b"));
        assert!(!is_field_path("copies + 1"));
    }
}
