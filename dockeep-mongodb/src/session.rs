use std::{fmt, str::FromStr, convert::Infallible};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Document, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, ReadPreference, SelectionCriteria},
};
use tracing::info;
use dockeep_core::{
    error::{RecordStoreError, RecordStoreResult},
    query::FindSpec,
    session::{DocumentCursor, Session, SessionBuilder},
};

use crate::options::find_options;


/// Read preference a [`MongoSession`] is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Read from the primary only.
    #[default]
    Primary,
    /// Read from secondaries only.
    Secondary,
}

impl ReadMode {
    pub const PRIMARY: &'static str = "primary";
    pub const SECONDARY: &'static str = "secondary";

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadMode::Primary => Self::PRIMARY,
            ReadMode::Secondary => Self::SECONDARY,
        }
    }

    fn selection_criteria(&self) -> SelectionCriteria {
        SelectionCriteria::ReadPreference(match self {
            ReadMode::Primary => ReadPreference::Primary,
            ReadMode::Secondary => ReadPreference::Secondary {
                options: Default::default(),
            },
        })
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only `"secondary"` selects secondaries; any other value reads from the primary.
impl FromStr for ReadMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            Self::SECONDARY => ReadMode::Secondary,
            _ => ReadMode::Primary,
        })
    }
}


/// Session backed by a MongoDB client.
///
/// Cloning shares the client's connection pool.
#[derive(Debug, Clone)]
pub struct MongoSession {
    client: Client,
}

impl MongoSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder(dsn: &str) -> MongoSessionBuilder {
        MongoSessionBuilder::new(dsn)
    }

    /// Returns the underlying MongoDB client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, database: &str, collection: &str) -> MongoCollection<Document> {
        self.client
            .database(database)
            .collection(collection)
    }
}

#[async_trait]
impl Session for MongoSession {
    async fn ping(&self) -> RecordStoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RecordStoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn insert_one(&self, database: &str, collection: &str, document: Document) -> RecordStoreResult<()> {
        self.get_collection(database, collection)
            .insert_one(document)
            .await
            .map_err(|e| RecordStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn update_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> RecordStoreResult<()> {
        self.get_collection(database, collection)
            .update_one(filter, update)
            .await
            .map_err(|e| RecordStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> RecordStoreResult<DocumentCursor> {
        Ok(
            self.get_collection(database, collection)
                .find(filter)
                .with_options(find_options(spec))
                .await
                .map_err(|e| RecordStoreError::Backend(e.to_string()))?
                .map_err(|e| RecordStoreError::Backend(e.to_string()))
                .boxed()
        )
    }

    async fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> RecordStoreResult<DocumentCursor> {
        Ok(
            self.get_collection(database, collection)
                .aggregate(pipeline)
                .await
                .map_err(|e| RecordStoreError::Backend(e.to_string()))?
                .map_err(|e| RecordStoreError::Backend(e.to_string()))
                .boxed()
        )
    }

    async fn shutdown(self) -> RecordStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}


/// Builder for [`MongoSession`].
///
/// Without an explicit read mode the driver default (or the DSN's own
/// `readPreference` option) applies.
pub struct MongoSessionBuilder {
    dsn: String,
    read_mode: Option<ReadMode>,
}

impl MongoSessionBuilder {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            read_mode: None,
        }
    }

    pub fn read_preference(mut self, mode: ReadMode) -> Self {
        self.read_mode = Some(mode);
        self
    }

    async fn client_options(&self) -> RecordStoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| RecordStoreError::Initialization(e.to_string()))?;

        if let Some(mode) = self.read_mode {
            options.selection_criteria = Some(mode.selection_criteria());
        }

        Ok(options)
    }
}

#[async_trait]
impl SessionBuilder for MongoSessionBuilder {
    type Session = MongoSession;

    async fn build(self) -> RecordStoreResult<Self::Session> {
        let client = Client::with_options(self.client_options().await?)
            .map_err(|e| RecordStoreError::Initialization(e.to_string()))?;

        info!(
            read_preference = self.read_mode.map(|mode| mode.as_str()).unwrap_or("default"),
            "MongoDB session created"
        );

        Ok(MongoSession::new(client))
    }
}
