//! Connection context wrapping a shared session capability.
//!
//! A [`ConnectionContext`] is created once at startup around a live session and shared by
//! every [`RecordStore`](crate::store::RecordStore) of an application. It never re-binds
//! to another session.
//!
//! # Example
//!
//! ```ignore
//! use dockeep::{context::ConnectionContext, memory::MemorySession};
//!
//! let context = ConnectionContext::new(MemorySession::new());
//!
//! let mut session: Option<MemorySession> = None;
//! context.unwrap_into(&mut session)?;
//! ```

use std::{any::type_name, fmt, future::Future, sync::Arc};

use crate::{
    error::{RecordStoreError, RecordStoreResult},
    session::{DynSession, Session},
};

/// Shared handle to exactly one session.
///
/// Cloning a context shares the underlying session.
#[derive(Clone)]
pub struct ConnectionContext {
    session: Arc<dyn DynSession>,
}

impl ConnectionContext {
    /// Wraps `session` in a new context.
    pub fn new<S: Session + 'static>(session: S) -> Self {
        Self { session: Arc::new(session) }
    }

    /// Wraps an already shared session.
    pub fn from_shared(session: Arc<dyn DynSession>) -> Self {
        Self { session }
    }

    /// Returns the session capability used to run operations.
    pub fn session(&self) -> &dyn DynSession {
        &*self.session
    }

    /// Borrows the wrapped session as its concrete type.
    ///
    /// Returns `None` if the session is not an `S`.
    pub fn downcast<S: Session + 'static>(&self) -> Option<&S> {
        self.session.as_any().downcast_ref::<S>()
    }

    /// Binds a clone of the wrapped session into `slot`.
    ///
    /// The concrete type of the wrapped session must be exactly `S`, compared by runtime
    /// type identity.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::TypeMismatch`] if the session is not an `S`. The slot is
    /// left untouched in that case.
    pub fn unwrap_into<S: Session + Clone + 'static>(
        &self,
        slot: &mut Option<S>,
    ) -> RecordStoreResult<()> {
        let session = self
            .downcast::<S>()
            .ok_or_else(|| RecordStoreError::TypeMismatch(type_name::<S>().to_string()))?;

        *slot = Some(session.clone());

        Ok(())
    }

    /// Checks that the wrapped session can reach its database.
    pub async fn ping(&self) -> RecordStoreResult<()> {
        self.session.ping().await
    }

    /// Runs `action` once per item, in order, stopping at the first error.
    ///
    /// With no items, `action` runs exactly once with `None`. Items are processed
    /// sequentially; later items never run once an earlier one failed.
    pub async fn process<I, F, Fut>(&self, mut action: F, items: Vec<I>) -> RecordStoreResult<()>
    where
        F: FnMut(Option<I>) -> Fut,
        Fut: Future<Output = RecordStoreResult<()>>,
    {
        if items.is_empty() {
            return action(None).await;
        }

        for item in items {
            action(Some(item)).await?;
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("session", &self.session.type_name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{query::FindSpec, session::DocumentCursor};
    use async_trait::async_trait;
    use bson::Document;
    use futures::{StreamExt, stream};
    use std::sync::Mutex;

    /// Session stub recording the operations it receives.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingSession {
        pub(crate) calls: Arc<Mutex<Vec<String>>>,
        pub(crate) documents: Arc<Mutex<Vec<Document>>>,
        pub(crate) fail_inserts: bool,
    }

    impl RecordingSession {
        pub(crate) fn with_documents(documents: Vec<Document>) -> Self {
            Self { documents: Arc::new(Mutex::new(documents)), ..Default::default() }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn cursor(&self) -> DocumentCursor {
            stream::iter(self.documents.lock().unwrap().clone().into_iter().map(Ok)).boxed()
        }
    }

    #[async_trait]
    impl Session for RecordingSession {
        async fn ping(&self) -> RecordStoreResult<()> {
            self.record("ping".to_string());
            Ok(())
        }

        async fn insert_one(
            &self,
            database: &str,
            collection: &str,
            document: Document,
        ) -> RecordStoreResult<()> {
            self.record(format!("insert {database}.{collection} {document}"));

            if self.fail_inserts {
                return Err(RecordStoreError::Backend("insert rejected".to_string()));
            }

            Ok(())
        }

        async fn update_one(
            &self,
            database: &str,
            collection: &str,
            filter: Document,
            update: Document,
        ) -> RecordStoreResult<()> {
            self.record(format!("update {database}.{collection} {filter} {update}"));
            Ok(())
        }

        async fn find(
            &self,
            database: &str,
            collection: &str,
            filter: Document,
            spec: FindSpec,
        ) -> RecordStoreResult<DocumentCursor> {
            self.record(format!("find {database}.{collection} {filter} {spec:?}"));
            Ok(self.cursor())
        }

        async fn aggregate(
            &self,
            database: &str,
            collection: &str,
            pipeline: Vec<Document>,
        ) -> RecordStoreResult<DocumentCursor> {
            self.record(format!("aggregate {database}.{collection} {pipeline:?}"));
            Ok(self.cursor())
        }
    }

    #[derive(Debug, Clone)]
    struct OtherSession;

    #[async_trait]
    impl Session for OtherSession {
        async fn ping(&self) -> RecordStoreResult<()> {
            Err(RecordStoreError::Unavailable("unreachable".to_string()))
        }

        async fn insert_one(&self, _: &str, _: &str, _: Document) -> RecordStoreResult<()> {
            Ok(())
        }

        async fn update_one(&self, _: &str, _: &str, _: Document, _: Document) -> RecordStoreResult<()> {
            Ok(())
        }

        async fn find(&self, _: &str, _: &str, _: Document, _: FindSpec) -> RecordStoreResult<DocumentCursor> {
            Ok(stream::empty().boxed())
        }

        async fn aggregate(&self, _: &str, _: &str, _: Vec<Document>) -> RecordStoreResult<DocumentCursor> {
            Ok(stream::empty().boxed())
        }
    }

    #[test]
    fn unwrap_binds_matching_session() {
        let session = RecordingSession::default();
        let context = ConnectionContext::new(session.clone());

        let mut slot: Option<RecordingSession> = None;
        context.unwrap_into(&mut slot).unwrap();

        assert!(Arc::ptr_eq(&slot.unwrap().calls, &session.calls));
    }

    #[test]
    fn unwrap_rejects_other_session_type() {
        let context = ConnectionContext::new(RecordingSession::default());

        let mut slot: Option<OtherSession> = None;
        let err = context.unwrap_into(&mut slot).unwrap_err();

        assert!(matches!(err, RecordStoreError::TypeMismatch(name) if name.contains("OtherSession")));
        assert!(slot.is_none());
    }

    #[test]
    fn failed_unwrap_leaves_slot_unmodified() {
        let context = ConnectionContext::new(OtherSession);

        let original = RecordingSession::default();
        let mut slot = Some(original.clone());

        assert!(context.unwrap_into(&mut slot).is_err());
        assert!(Arc::ptr_eq(&slot.unwrap().calls, &original.calls));
    }

    #[tokio::test]
    async fn ping_forwards_session_failure() {
        let context = ConnectionContext::new(OtherSession);

        assert!(matches!(context.ping().await, Err(RecordStoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn process_without_items_runs_once() {
        let context = ConnectionContext::new(OtherSession);
        let seen = Mutex::new(Vec::new());

        context
            .process(
                |input: Option<u32>| {
                    seen.lock().unwrap().push(input);
                    async { Ok(()) }
                },
                Vec::new(),
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn process_without_items_propagates_error() {
        let context = ConnectionContext::new(OtherSession);

        let result = context
            .process(
                |_: Option<u32>| async { Err(RecordStoreError::Backend("boom".to_string())) },
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(RecordStoreError::Backend(message)) if message == "boom"));
    }

    #[tokio::test]
    async fn process_visits_items_in_order() {
        let context = ConnectionContext::new(OtherSession);
        let seen = Mutex::new(Vec::new());

        context
            .process(
                |input| {
                    seen.lock().unwrap().push(input);
                    async { Ok(()) }
                },
                vec!["a", "b", "c"],
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some("a"), Some("b"), Some("c")]);
    }

    #[tokio::test]
    async fn process_stops_at_first_failure() {
        let context = ConnectionContext::new(OtherSession);
        let seen = Mutex::new(Vec::new());

        let result = context
            .process(
                |input| {
                    seen.lock().unwrap().push(input);
                    async move {
                        match input {
                            Some("a") => Err(RecordStoreError::Backend("a failed".to_string())),
                            _ => Ok(()),
                        }
                    }
                },
                vec!["a", "b"],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![Some("a")]);
    }
}
