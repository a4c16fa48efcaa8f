//! Convenient re-exports of commonly used types from dockeep.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use dockeep::prelude::*;
//! ```
//!
//! This provides access to:
//! - The `Record` trait and its derive macro
//! - The connection context and record store
//! - Query and command documents, fetch modes and sorting
//! - Session traits and error types

pub use dockeep_core::{
    context::ConnectionContext,
    store::RecordStore,
    record::{FieldTag, Record, ID_TAG},
    query::{QueryDocument, CommandDocument, FetchMode, FindSpec, Sort, SortDirection},
    page::FetchControls,
    session::{Session, SessionBuilder, DocumentCursor},
    error::{RecordStoreError, RecordStoreResult},
};
pub use dockeep_macros::Record;
