//! In-memory session implementation.
//!
//! This module provides a session that keeps every database and collection in process
//! memory, guarded by an async-safe read-write lock. Documents keep their insertion order.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::trace;

use dockeep_core::{
    error::{RecordStoreError, RecordStoreResult},
    query::{FindSpec, SortDirection},
    record::ID_TAG,
    session::{DocumentCursor, Session, SessionBuilder},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

type CollectionMap = HashMap<String, Vec<Document>>;
type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory session.
///
/// `MemorySession` is cloneable and uses an `Arc`-wrapped internal state, allowing it to
/// be shared across async tasks. Clones of the same instance share the same data, which
/// is what a [`ConnectionContext`](dockeep_core::context::ConnectionContext) hands out on
/// unwrap.
///
/// Supported update operators are `$set` and `$unset`. Supported aggregation stages are
/// `$match`, `$sort`, `$skip` and `$limit`.
///
/// # Example
///
/// ```ignore
/// use dockeep_memory::MemorySession;
/// use dockeep::session::Session;
/// use bson::doc;
///
/// let session = MemorySession::new();
/// session.insert_one("app", "users", doc! { "name": "Alice", "age": 30 }).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemorySession {
    /// database name -> (collection name -> documents)
    store: Arc<RwLock<StoreMap>>,
}

impl MemorySession {
    /// Creates a new session holding no databases.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    pub fn builder() -> MemorySessionBuilder {
        MemorySessionBuilder::default()
    }

    /// Returns a copy of every document of `database.collection`, in insertion order.
    pub async fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(database)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    async fn snapshot(&self, database: &str, collection: &str, filter: &Document) -> RecordStoreResult<Vec<Document>> {
        let store = self.store.read().await;

        match store.get(database).and_then(|collections| collections.get(collection)) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, filter),
            None => Ok(Vec::new()),
        }
    }
}


#[async_trait]
impl Session for MemorySession {
    async fn ping(&self) -> RecordStoreResult<()> {
        Ok(())
    }

    async fn insert_one(&self, database: &str, collection: &str, document: Document) -> RecordStoreResult<()> {
        let document = match document.get(ID_TAG) {
            Some(_) => document,
            None => {
                let mut identified = Document::new();
                identified.insert(ID_TAG, ObjectId::new());

                for (key, value) in document {
                    identified.insert(key, value);
                }

                identified
            }
        };

        let mut store = self.store.write().await;
        let documents = store
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        let id = document.get(ID_TAG);

        if let Some(id) = id.filter(|id| documents.iter().any(|existing| existing.get(ID_TAG) == Some(*id))) {
            return Err(RecordStoreError::Backend(format!(
                "duplicate key error collection: {database}.{collection} dup key: {{ _id: {id} }}"
            )));
        }

        trace!(database, collection, "Inserted document");
        documents.push(document);

        Ok(())
    }

    async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> RecordStoreResult<()> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(database).and_then(|collections| collections.get_mut(collection)) {
            Some(documents) => documents,
            None => return Ok(()),
        };

        for document in documents.iter_mut() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                *document = apply_update(document, &update)?;
                trace!(database, collection, "Updated document");
                return Ok(());
            }
        }

        Ok(())
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> RecordStoreResult<DocumentCursor> {
        let mut documents = self.snapshot(database, collection, &filter).await?;

        if let Some(sort) = &spec.sort {
            let keys = vec![(sort.field.clone(), sort.direction)];
            documents.sort_by(|a, b| compare_documents(a, b, &keys));
        }

        let skip = spec.skip.unwrap_or(0) as usize;
        let take = match spec.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(into_cursor(documents.into_iter().skip(skip).take(take).collect()))
    }

    async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> RecordStoreResult<DocumentCursor> {
        let mut documents = self.snapshot(database, collection, &Document::new()).await?;

        for stage in &pipeline {
            documents = run_stage(documents, stage)?;
        }

        Ok(into_cursor(documents))
    }
}

fn into_cursor(documents: Vec<Document>) -> DocumentCursor {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

/// Applies an update command document to a copy of `document`.
///
/// The stored document is only replaced once the whole command applied cleanly.
fn apply_update(document: &Document, update: &Document) -> RecordStoreResult<Document> {
    let mut updated = document.clone();

    if update.is_empty() {
        return Err(RecordStoreError::Backend("update document must not be empty".to_string()));
    }

    for (operator, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            RecordStoreError::Backend(format!("modifiers for {operator} must be a document"))
        })?;

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == ID_TAG && document.get(ID_TAG) != Some(value) {
                        return Err(RecordStoreError::Backend(
                            "performing an update on the path '_id' would modify the immutable field '_id'".to_string(),
                        ));
                    }

                    set_path(&mut updated, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(&mut updated, path);
                }
            }
            other if other.starts_with('$') => {
                return Err(RecordStoreError::Backend(format!("unknown update operator: {other}")));
            }
            _ => {
                return Err(RecordStoreError::Backend("update document requires atomic operators".to_string()));
            }
        }
    }

    Ok(updated)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> RecordStoreResult<()> {
    match path.split_once('.') {
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(RecordStoreError::Backend(format!(
                    "cannot create field '{rest}' in element {head}"
                ))),
            }
        }
        None => {
            document.insert(path, value);
            Ok(())
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
        None => {
            document.remove(path);
        }
    }
}

fn run_stage(documents: Vec<Document>, stage: &Document) -> RecordStoreResult<Vec<Document>> {
    let mut entries = stage.iter();

    let (name, argument) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(RecordStoreError::Backend(
                "a pipeline stage specification object must contain exactly one field".to_string(),
            ));
        }
    };

    match name.as_str() {
        "$match" => {
            let filter = stage_document(name, argument)?;
            DocumentEvaluator::filter_documents(&documents, filter)
        }
        "$sort" => {
            let mut keys = Vec::new();

            for (field, direction) in stage_document(name, argument)? {
                let direction = match stage_integer(name, direction)? {
                    1 => SortDirection::Asc,
                    -1 => SortDirection::Desc,
                    _ => {
                        return Err(RecordStoreError::Backend(
                            "$sort key ordering must be 1 (for ascending) or -1 (for descending)".to_string(),
                        ));
                    }
                };
                keys.push((field.clone(), direction));
            }

            if keys.is_empty() {
                return Err(RecordStoreError::Backend("$sort stage must have at least one sort key".to_string()));
            }

            let mut documents = documents;
            documents.sort_by(|a, b| compare_documents(a, b, &keys));
            Ok(documents)
        }
        "$skip" => {
            let skip = non_negative(name, stage_integer(name, argument)?)?;
            Ok(documents.into_iter().skip(skip).collect())
        }
        "$limit" => match non_negative(name, stage_integer(name, argument)?)? {
            0 => Err(RecordStoreError::Backend("the limit must be positive".to_string())),
            limit => Ok(documents.into_iter().take(limit).collect()),
        },
        other => Err(RecordStoreError::Backend(format!("unrecognized pipeline stage name: '{other}'"))),
    }
}

fn stage_document<'a>(name: &str, argument: &'a Bson) -> RecordStoreResult<&'a Document> {
    argument
        .as_document()
        .ok_or_else(|| RecordStoreError::Backend(format!("the {name} stage specification must be an object")))
}

fn stage_integer(name: &str, argument: &Bson) -> RecordStoreResult<i64> {
    match argument {
        Bson::Int32(value) => Ok(i64::from(*value)),
        Bson::Int64(value) => Ok(*value),
        Bson::Double(value) if value.fract() == 0.0 => Ok(*value as i64),
        _ => Err(RecordStoreError::Backend(format!("{name} needs an integer argument"))),
    }
}

fn non_negative(name: &str, value: i64) -> RecordStoreResult<usize> {
    usize::try_from(value)
        .map_err(|_| RecordStoreError::Backend(format!("{name} argument must not be negative")))
}


/// Builder for constructing [`MemorySession`] instances.
///
/// The in-memory session takes no options; building always succeeds.
#[derive(Default)]
pub struct MemorySessionBuilder;

#[async_trait]
impl SessionBuilder for MemorySessionBuilder {
    type Session = MemorySession;

    async fn build(self) -> RecordStoreResult<Self::Session> {
        Ok(MemorySession::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use dockeep_core::query::Sort;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    async fn seeded() -> MemorySession {
        let session = MemorySession::new();

        for (id, name, age) in [(1, "carol", 41), (2, "alice", 30), (3, "bob", 25)] {
            session
                .insert_one("app", "users", doc! { "_id": id, "name": name, "age": age })
                .await
                .unwrap();
        }

        session
    }

    async fn names(cursor: DocumentCursor) -> Vec<String> {
        cursor
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .iter()
            .map(|document| document.get_str("name").unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn insert_generates_missing_identifier() {
        let session = MemorySession::new();

        session.insert_one("app", "users", doc! { "name": "dave" }).await.unwrap();

        let stored = session.documents("app", "users").await;
        assert!(matches!(stored[0].get(ID_TAG), Some(Bson::ObjectId(_))));
        assert_eq!(stored[0].keys().next().map(String::as_str), Some(ID_TAG));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_identifier() {
        let session = seeded().await;

        let result = session.insert_one("app", "users", doc! { "_id": 1, "name": "eve" }).await;

        assert!(matches!(result, Err(RecordStoreError::Backend(message)) if message.contains("duplicate key")));
        assert_eq!(session.documents("app", "users").await.len(), 3);
    }

    #[tokio::test]
    async fn databases_are_isolated() {
        let session = seeded().await;

        assert!(session.documents("other", "users").await.is_empty());
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let session = seeded().await;
        let spec = FindSpec { limit: Some(2), skip: Some(1), sort: Some(Sort::asc("age")) };

        let cursor = session.find("app", "users", Document::new(), spec).await.unwrap();

        assert_eq!(names(cursor).await, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn find_without_spec_keeps_insertion_order() {
        let session = seeded().await;

        let cursor = session
            .find("app", "users", doc! { "age": { "$gte": 30 } }, FindSpec::default())
            .await
            .unwrap();

        assert_eq!(names(cursor).await, vec!["carol", "alice"]);
    }

    #[tokio::test]
    async fn update_changes_only_first_match() {
        let session = seeded().await;

        session
            .update_one("app", "users", doc! { "age": { "$gt": 20 } }, doc! { "$set": { "name": "zed" }, "$unset": { "age": "" } })
            .await
            .unwrap();

        let stored = session.documents("app", "users").await;
        assert_eq!(stored[0], doc! { "_id": 1, "name": "zed" });
        assert_eq!(stored[1].get_str("name").unwrap(), "alice");
    }

    #[tokio::test]
    async fn update_without_match_is_not_an_error() {
        let session = seeded().await;

        session
            .update_one("app", "users", doc! { "name": "nobody" }, doc! { "$set": { "age": 1 } })
            .await
            .unwrap();
        session
            .update_one("app", "missing", doc! {}, doc! { "$set": { "age": 1 } })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_rejects_replacement_documents() {
        let session = seeded().await;

        let result = session.update_one("app", "users", doc! { "_id": 1 }, doc! { "name": "x" }).await;

        assert!(matches!(result, Err(RecordStoreError::Backend(_))));
        assert_eq!(session.documents("app", "users").await[0].get_str("name").unwrap(), "carol");
    }

    #[tokio::test]
    async fn aggregate_runs_stages_in_order() {
        let session = seeded().await;
        let pipeline = vec![
            doc! { "$match": { "age": { "$lt": 40 } } },
            doc! { "$sort": { "age": -1 } },
            doc! { "$limit": 1 },
        ];

        let cursor = session.aggregate("app", "users", pipeline).await.unwrap();

        assert_eq!(names(cursor).await, vec!["alice"]);
    }

    #[tokio::test]
    async fn aggregate_rejects_unknown_stages() {
        let session = seeded().await;

        let result = session.aggregate("app", "users", vec![doc! { "$group": { "_id": "$age" } }]).await;

        assert!(matches!(result, Err(RecordStoreError::Backend(message)) if message.contains("$group")));
    }

    #[tokio::test]
    async fn builder_creates_empty_session() {
        let session = MemorySession::builder().build().await.unwrap();

        session.ping().await.unwrap();
        assert!(session.documents("app", "users").await.is_empty());
    }
}
