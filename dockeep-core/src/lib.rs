//! A tag-driven record persistence layer for document databases.
//!
//! This crate is the core of the dockeep project and provides:
//!
//! - **Session abstraction** ([`session`]) - The narrow capability a database session must offer
//! - **Connection context** ([`context`]) - A shared, type-checked wrapper around one session
//! - **Record tags** ([`record`]) - How typed records expose their filter and storage tags
//! - **Document mapping** ([`mapper`], [`query`]) - Query and command documents built from records
//! - **Pagination controls** ([`page`]) - The reserved `page`, `limit` and `sorting` keys
//! - **Record store** ([`store`]) - Store, update and fetch records in a database
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use dockeep::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     #[record(filter = "_id", storage = "_id")]
//!     pub id: String,
//!     #[record(filter = "name", storage = "name")]
//!     pub name: String,
//! }
//!
//! let store = RecordStore::new(ConnectionContext::new(session), "app");
//! store.store("users", &user).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as dockeep_core;

pub mod context;
pub mod error;
pub mod mapper;
pub mod page;
pub mod query;
pub mod record;
pub mod session;
pub mod store;
