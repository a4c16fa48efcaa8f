//! In-memory session for dockeep.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Session` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Database filters** - Equality, comparison, membership and logical operators
//! - **Find options** - Sorting, skip and limit
//! - **Aggregation** - `$match`, `$sort`, `$skip` and `$limit` stages
//!
//! # Quick Start
//!
//! ```ignore
//! use dockeep::{context::ConnectionContext, memory::MemorySession, store::RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ConnectionContext::new(MemorySession::new());
//!     let store = RecordStore::new(context, "app");
//!
//!     store.store("users", &user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dockeep_memory;

pub mod store;
mod evaluator;

pub use store::{MemorySession, MemorySessionBuilder};
