//! Main dockeep crate providing a tag-driven persistence layer for document databases.
//!
//! This crate is the primary entry point for users of dockeep. It re-exports the core
//! types from the sub-crates, the `Record` derive macro, and the available sessions.
//!
//! # Features
//!
//! - **Tag-driven mapping** - Field attributes decide which fields filter and which are stored
//! - **Typed fetches** - Decode one record or a list of records straight from the database
//! - **Pagination** - `page`, `limit` and `sorting` keys in any query document
//! - **Multiple sessions** - In-memory and MongoDB sessions behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use dockeep::{prelude::*, memory::MemorySession};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     #[record(filter = "_id", storage = "_id")]
//!     pub id: String,
//!     #[record(filter = "name", storage = "name")]
//!     pub name: String,
//!     #[record(storage = "age")]
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ConnectionContext::new(MemorySession::new());
//!     let store = RecordStore::new(context, "app");
//!
//!     let user = User { id: "u-1".to_string(), name: "Alice".to_string(), age: 30 };
//!     store.store("users", &user).await?;
//!
//!     // Update by name, then read the record back
//!     let query = QueryDocument::new().with("name", "Alice");
//!     store.update(query.clone(), "users", &User { age: 31, ..user }).await?;
//!
//!     let found: User = store.fetch_one(query, FetchMode::Find, "users").await?;
//!     println!("Found user: {:?}", found);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Pagination
//!
//! Find queries read the reserved `page`, `limit` and `sorting` keys and remove them
//! before the filter is sent:
//!
//! ```ignore
//! let query = QueryDocument::new()
//!     .with("active", true)
//!     .limit(20)
//!     .page(3)
//!     .sorting("created,desc");
//!
//! let users: Vec<User> = store.fetch_many(query, FetchMode::Find, "users").await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as dockeep;

pub mod prelude;

pub use dockeep_core::{context, error, mapper, page, query, record, session, store};
pub use dockeep_macros::Record;

pub use bson;

/// In-memory session.
pub mod memory {
    pub use dockeep_memory::{MemorySession, MemorySessionBuilder};
}

/// MongoDB session, enabled with the `mongodb` feature.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use dockeep_mongodb::{MongoConnector, MongoSession, MongoSessionBuilder, ReadMode};
}
