//! Record store, the interface application code uses to persist and fetch records.
//!
//! A [`RecordStore`] pairs a shared [`ConnectionContext`] with a database name and exposes:
//!
//! - [`RecordStore::store`] / [`RecordStore::store_all`] - insert records verbatim
//! - [`RecordStore::update`] - apply a `$set` built from a record to the first match
//! - [`RecordStore::fetch_one`] / [`RecordStore::fetch_many`] - find or aggregate, decoded
//!   into a single record or a list of records
//!
//! # Example
//!
//! ```ignore
//! use dockeep::prelude::*;
//!
//! let store = RecordStore::new(context, "app");
//! store.store("users", &user).await?;
//!
//! let query = QueryDocument::new().with("name", "Alice");
//! let found: User = store.fetch_one(query, FetchMode::Find, "users").await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use futures::TryStreamExt;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    context::ConnectionContext,
    error::{RecordStoreError, RecordStoreResult},
    page::FetchControls,
    query::{self, CommandDocument, FetchMode, QueryDocument},
    record::Record,
    session::DocumentCursor,
};

/// Persists and fetches records in one database through a shared connection context.
#[derive(Debug, Clone)]
pub struct RecordStore {
    context: ConnectionContext,
    database: String,
}

impl RecordStore {
    /// Creates a store targeting `database`.
    ///
    /// The same context may back any number of stores.
    pub fn new(context: ConnectionContext, database: impl Into<String>) -> Self {
        Self { context, database: database.into() }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Inserts `record` into `collection`.
    ///
    /// The record is serialized as is; no tag mapping is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a document or the insert is
    /// rejected by the database.
    pub async fn store<R>(&self, collection: &str, record: &R) -> RecordStoreResult<()>
    where
        R: Serialize + Sync,
    {
        let session = self.context.session();
        let database = self.database.as_str();

        self.context
            .process(
                move |input| async move {
                    let document = to_document(input.unwrap_or(record))?;

                    debug!(database, collection, "Inserting record");

                    session.insert_one(database, collection, document).await
                },
                vec![record],
            )
            .await
    }

    /// Inserts every record of `records` into `collection`, in order.
    ///
    /// Stops at the first failed insert; the remaining records are not inserted. An empty
    /// list inserts nothing.
    pub async fn store_all<R>(&self, collection: &str, records: Vec<&R>) -> RecordStoreResult<()>
    where
        R: Serialize + Sync,
    {
        let session = self.context.session();
        let database = self.database.as_str();

        self.context
            .process(
                move |input| async move {
                    let Some(record) = input else {
                        return Ok(());
                    };
                    let document = to_document(record)?;

                    debug!(database, collection, "Inserting record");

                    session.insert_one(database, collection, document).await
                },
                records,
            )
            .await
    }

    /// Applies the storage-tagged fields of `record` as a `$set` to the first document
    /// matching `query`.
    ///
    /// At most one document is updated. The identifier is never part of the update.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be converted or the update fails.
    pub async fn update<R>(
        &self,
        query: QueryDocument,
        collection: &str,
        record: &R,
    ) -> RecordStoreResult<()>
    where
        R: Record + Sync,
    {
        let session = self.context.session();
        let database = self.database.as_str();

        let mut filter = query.into_document();
        FetchControls::take_from(&mut filter);
        let filter = &filter;

        self.context
            .process(
                move |_: Option<()>| async move {
                    let command = CommandDocument::from_record(CommandDocument::SET, record)?;

                    debug!(database, collection, filter = %filter, "Updating record");

                    session
                        .update_one(database, collection, filter.clone(), command.into_document())
                        .await
                },
                Vec::new(),
            )
            .await
    }

    /// Fetches the first record matching `query`.
    ///
    /// Reading stops after the first document; further matches are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::NotFound`] if nothing matched, or the decode/session
    /// error otherwise.
    pub async fn fetch_one<T>(
        &self,
        query: QueryDocument,
        mode: FetchMode,
        collection: &str,
    ) -> RecordStoreResult<T>
    where
        T: DeserializeOwned,
    {
        let mut cursor = self.open_cursor(query, mode, collection).await?;

        match cursor.try_next().await? {
            Some(document) => from_document(document),
            None => Err(RecordStoreError::NotFound(collection.to_string())),
        }
    }

    /// Fetches every record matching `query`, in cursor order.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::NotFound`] if nothing matched; an empty list is never
    /// returned.
    pub async fn fetch_many<T>(
        &self,
        query: QueryDocument,
        mode: FetchMode,
        collection: &str,
    ) -> RecordStoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut cursor = self.open_cursor(query, mode, collection).await?;
        let mut records = Vec::new();

        while let Some(document) = cursor.try_next().await? {
            records.push(from_document(document)?);
        }

        if records.is_empty() {
            return Err(RecordStoreError::NotFound(collection.to_string()));
        }

        Ok(records)
    }

    async fn open_cursor(
        &self,
        query: QueryDocument,
        mode: FetchMode,
        collection: &str,
    ) -> RecordStoreResult<DocumentCursor> {
        let session = self.context.session();
        let mut filter = query.into_document();
        let controls = FetchControls::take_from(&mut filter);

        match mode {
            FetchMode::Aggregate => {
                let pipeline = query::into_pipeline(filter);

                debug!(database = %self.database, collection, stages = pipeline.len(), "Running aggregate");

                session.aggregate(&self.database, collection, pipeline).await
            }
            FetchMode::Find => {
                let spec = controls.find_spec();

                debug!(database = %self.database, collection, filter = %filter, spec = ?spec, "Running find");

                session.find(&self.database, collection, filter, spec).await
            }
        }
    }
}

fn to_document<R: Serialize + ?Sized>(record: &R) -> RecordStoreResult<Document> {
    match serialize_to_bson(record)? {
        Bson::Document(document) => Ok(document),
        other => Err(RecordStoreError::InvalidInput(format!(
            "expected a record serializing to a document, got {:?}",
            other.element_type()
        ))),
    }
}

fn from_document<T: DeserializeOwned>(document: Document) -> RecordStoreResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::tests::RecordingSession,
        mapper::tests::{Account, account},
    };
    use bson::doc;
    use pretty_assertions::assert_eq;

    const ID: &str = "507f191e810c19729de860ea";

    fn store_with(session: RecordingSession) -> RecordStore {
        RecordStore::new(ConnectionContext::new(session), "bank")
    }

    fn account_document(id: &str, owner: &str) -> Document {
        doc! { "_id": id, "owner": owner, "balance": 10_i64, "note": "" }
    }

    #[tokio::test]
    async fn store_inserts_record_verbatim() {
        let session = RecordingSession::default();
        let store = store_with(session.clone());

        store.store("accounts", &account(ID)).await.unwrap();

        assert_eq!(
            session.calls(),
            vec![format!(
                "insert bank.accounts {}",
                doc! { "_id": ID, "owner": "alice", "balance": 120_i64, "note": "vip" }
            )]
        );
    }

    #[tokio::test]
    async fn store_rejects_non_document_records() {
        let store = store_with(RecordingSession::default());

        assert!(matches!(
            store.store("accounts", &42_i32).await,
            Err(RecordStoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn store_all_stops_at_first_failure() {
        let session = RecordingSession { fail_inserts: true, ..Default::default() };
        let store = store_with(session.clone());
        let first = account(ID);
        let second = account("");

        let result = store.store_all("accounts", vec![&first, &second]).await;

        assert!(matches!(result, Err(RecordStoreError::Backend(_))));
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test]
    async fn store_all_without_records_inserts_nothing() {
        let session = RecordingSession::default();
        let store = store_with(session.clone());

        store.store_all::<Account>("accounts", Vec::new()).await.unwrap();

        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn store_inserts_exactly_once() {
        let session = RecordingSession { fail_inserts: true, ..Default::default() };
        let store = store_with(session.clone());

        let result = store.store("accounts", &account(ID)).await;

        assert!(matches!(result, Err(RecordStoreError::Backend(_))));
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test]
    async fn update_sets_tagged_fields_without_reserved_keys() {
        let session = RecordingSession::default();
        let store = store_with(session.clone());
        let query = QueryDocument::new().with("owner", "alice").limit(3);

        store.update(query, "accounts", &account(ID)).await.unwrap();

        assert_eq!(
            session.calls(),
            vec![format!(
                "update bank.accounts {} {}",
                doc! { "owner": "alice" },
                doc! { "$set": { "owner": "alice", "balance,omitempty": 120_i64 } }
            )]
        );
    }

    #[tokio::test]
    async fn find_passes_pagination_and_sorting() {
        let session = RecordingSession::with_documents(vec![account_document(ID, "alice")]);
        let store = store_with(session.clone());
        let query = QueryDocument::new()
            .with("owner", "alice")
            .limit(10)
            .page(2)
            .sorting("balance,desc");

        let _: Vec<Account> = store.fetch_many(query, FetchMode::Find, "accounts").await.unwrap();

        let call = &session.calls()[0];
        assert!(call.starts_with(&format!("find bank.accounts {}", doc! { "owner": "alice" })));
        assert!(call.contains("limit: Some(10)"));
        assert!(call.contains("skip: Some(10)"));
        assert!(call.contains("field: \"balance\", direction: Desc"));
    }

    #[tokio::test]
    async fn aggregate_ignores_pagination() {
        let session = RecordingSession::with_documents(vec![account_document(ID, "alice")]);
        let store = store_with(session.clone());
        let query = QueryDocument::from(doc! { "$match": { "owner": "alice" } }).limit(1).page(4);

        let _: Account = store.fetch_one(query, FetchMode::Aggregate, "accounts").await.unwrap();

        assert_eq!(
            session.calls(),
            vec![format!(
                "aggregate bank.accounts {:?}",
                vec![doc! { "$match": { "owner": "alice" } }]
            )]
        );
    }

    #[tokio::test]
    async fn fetch_one_takes_first_document() {
        let session = RecordingSession::with_documents(vec![
            account_document(ID, "alice"),
            account_document("", "bob"),
        ]);
        let store = store_with(session);

        let found: Account = store.fetch_one(QueryDocument::new(), FetchMode::Find, "accounts").await.unwrap();

        assert_eq!(found.owner, "alice");
        assert_eq!(found.id, ID);
    }

    #[tokio::test]
    async fn fetch_many_keeps_cursor_order() {
        let session = RecordingSession::with_documents(vec![
            account_document("1", "carol"),
            account_document("2", "alice"),
            account_document("3", "bob"),
        ]);
        let store = store_with(session);

        let found: Vec<Account> = store.fetch_many(QueryDocument::new(), FetchMode::Find, "accounts").await.unwrap();

        assert_eq!(
            found.iter().map(|a| a.owner.as_str()).collect::<Vec<_>>(),
            vec!["carol", "alice", "bob"]
        );
    }

    #[tokio::test]
    async fn empty_results_are_not_found_in_both_modes() {
        let store = store_with(RecordingSession::default());

        let one = store.fetch_one::<Account>(QueryDocument::new(), FetchMode::Find, "accounts").await;
        let many = store.fetch_many::<Account>(QueryDocument::new(), FetchMode::Find, "accounts").await;

        assert!(matches!(one, Err(RecordStoreError::NotFound(collection)) if collection == "accounts"));
        assert!(matches!(many, Err(RecordStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn decode_failures_are_reported() {
        let session = RecordingSession::with_documents(vec![doc! { "_id": 1, "owner": true }]);
        let store = store_with(session);

        let result = store.fetch_one::<Account>(QueryDocument::new(), FetchMode::Find, "accounts").await;

        assert!(matches!(result, Err(RecordStoreError::Serialization(_))));
    }
}
