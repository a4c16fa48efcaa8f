//! Session capability abstraction for the record store.
//!
//! A session is a live, connection-like handle to a document database that can run
//! operations against named collections within a named database. The record store never
//! talks to a driver directly; it only sees the operations defined here.
//!
//! # Traits
//!
//! - [`Session`]: The core trait implemented by database sessions
//! - [`DynSession`]: A trait for dynamic dispatch over session implementations
//! - [`SessionBuilder`]: Factory trait for creating session instances
//!
//! # Examples
//!
//! ```ignore
//! use dockeep::session::Session;
//! use bson::doc;
//!
//! let session = MySession::new();
//! session.insert_one("app", "users", doc! { "name": "Alice", "age": 30 }).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::{any::Any, fmt::Debug};

use crate::{error::RecordStoreResult, query::FindSpec};

/// A stream of raw documents produced by a find or aggregate operation.
///
/// Documents are yielded in the order the database returns them. Dropping the cursor
/// stops reading; no further documents are requested.
pub type DocumentCursor = BoxStream<'static, RecordStoreResult<Document>>;

/// Abstract interface for document database sessions.
///
/// # Thread Safety
///
/// Implementations must be safe to share across tasks. A single session is usually
/// shared by every record store of an application, and the store performs no locking
/// of its own.
///
/// # Error Handling
///
/// Failures reported by the database should be returned as
/// [`RecordStoreError::Backend`](crate::error::RecordStoreError::Backend) carrying the
/// database's own message. A failed health check is
/// [`RecordStoreError::Unavailable`](crate::error::RecordStoreError::Unavailable).
#[async_trait]
pub trait Session: Send + Sync + Debug {
    /// Checks that the database is reachable.
    async fn ping(&self) -> RecordStoreResult<()>;

    /// Inserts a single document into `database.collection`.
    ///
    /// # Arguments
    ///
    /// * `database` - The target database name
    /// * `collection` - The target collection name
    /// * `document` - The document to insert, stored verbatim
    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> RecordStoreResult<()>;

    /// Applies an update command document to the first document matching `filter`.
    ///
    /// At most one document is modified. Matching nothing is not an error.
    ///
    /// # Arguments
    ///
    /// * `filter` - The filter selecting the document to update
    /// * `update` - The command document, e.g. `{ "$set": { "name": "X" } }`
    async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> RecordStoreResult<()>;

    /// Runs a filtered find, honoring the limit, skip and sort in `spec`.
    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> RecordStoreResult<DocumentCursor>;

    /// Runs an aggregation pipeline.
    async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> RecordStoreResult<DocumentCursor>;

    /// Cleanly shuts down the session, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> RecordStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`Session`] used by [`ConnectionContext`](crate::context::ConnectionContext).
///
/// Implemented for every [`Session`]; `as_any` lets a context hand out the concrete
/// session type again.
#[async_trait]
pub trait DynSession: Send + Sync + Debug {
    async fn ping(&self) -> RecordStoreResult<()>;
    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> RecordStoreResult<()>;
    async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> RecordStoreResult<()>;
    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> RecordStoreResult<DocumentCursor>;
    async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> RecordStoreResult<DocumentCursor>;

    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

#[async_trait]
impl<S: Session + 'static> DynSession for S {
    async fn ping(&self) -> RecordStoreResult<()> {
        Session::ping(self).await
    }

    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> RecordStoreResult<()> {
        Session::insert_one(self, database, collection, document).await
    }

    async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> RecordStoreResult<()> {
        Session::update_one(self, database, collection, filter, update).await
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> RecordStoreResult<DocumentCursor> {
        Session::find(self, database, collection, filter, spec).await
    }

    async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> RecordStoreResult<DocumentCursor> {
        Session::aggregate(self, database, collection, pipeline).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<S>()
    }
}

#[async_trait]
pub trait SessionBuilder {
    type Session: Session;

    async fn build(self) -> RecordStoreResult<Self::Session>;
}
