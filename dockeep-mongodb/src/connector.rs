//! Connector owning the connection context of a MongoDB deployment.

use tracing::debug;
use dockeep_core::{
    context::ConnectionContext,
    error::RecordStoreResult,
    session::{Session, SessionBuilder},
};

use crate::session::{MongoSession, ReadMode};


/// Creates a [`MongoSession`] and hands out the [`ConnectionContext`] around it.
///
/// # Example
///
/// ```ignore
/// use dockeep::mongodb::{MongoConnector, ReadMode};
///
/// let connector = MongoConnector::with_read_mode("mongodb://localhost:27017", ReadMode::Secondary).await?;
/// connector.connect().await?;
///
/// let store = RecordStore::new(connector.context().clone(), "app");
/// ```
#[derive(Debug, Clone)]
pub struct MongoConnector {
    context: ConnectionContext,
}

impl MongoConnector {
    /// Creates a connector using the driver's default read preference.
    pub async fn new(dsn: &str) -> RecordStoreResult<Self> {
        Ok(Self::from_session(MongoSession::builder(dsn).build().await?))
    }

    /// Creates a connector reading according to `mode`.
    pub async fn with_read_mode(dsn: &str, mode: ReadMode) -> RecordStoreResult<Self> {
        Ok(Self::from_session(
            MongoSession::builder(dsn)
                .read_preference(mode)
                .build()
                .await?,
        ))
    }

    pub fn from_session(session: MongoSession) -> Self {
        Self { context: ConnectionContext::new(session) }
    }

    /// Verifies the deployment is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Unavailable`](dockeep_core::error::RecordStoreError::Unavailable)
    /// if the ping fails.
    pub async fn connect(&self) -> RecordStoreResult<()> {
        let mut session: Option<MongoSession> = None;
        self.context.unwrap_into(&mut session)?;

        if let Some(session) = session {
            debug!("Pinging MongoDB deployment");
            session.ping().await?;
        }

        Ok(())
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }
}
