//! MongoDB session for dockeep.
//!
//! This crate provides a MongoDB implementation of the `Session` trait, running record
//! store operations through the official async driver.
//!
//! To use this session, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! dockeep = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Sessions are created from a MongoDB connection string through the builder, optionally
//! with a [`ReadMode`]. A [`MongoConnector`] wraps the session in a connection context
//! and pings the deployment on [`connect`](MongoConnector::connect).
//!
//! # Example
//!
//! ```ignore
//! use dockeep::{session::SessionBuilder, mongodb::{MongoSession, ReadMode}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = MongoSession::builder("mongodb://localhost:27017")
//!         .read_preference(ReadMode::Secondary)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dockeep_mongodb;

pub mod connector;
pub mod session;
mod options;

pub use connector::MongoConnector;
pub use session::{MongoSession, MongoSessionBuilder, ReadMode};
