//! Core trait describing how a typed record exposes its fields to the document mapper.
//!
//! A record carries two independent tag namespaces on its fields:
//!
//! - a **filter** tag, naming the key the field is matched under when the record is turned
//!   into a query document. The reserved value `"_id"` marks the identifier field.
//! - a **storage** tag of the form `"name,options"`, naming the key the field is written under
//!   when the record is turned into an update command document.
//!
//! The tag enumeration is produced at compile time by `#[derive(Record)]`, so no runtime
//! introspection is needed.
//!
//! # Example
//!
//! ```ignore
//! use dockeep::Record;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     #[record(filter = "_id", storage = "_id")]
//!     pub id: String,
//!     #[record(filter = "name", storage = "name")]
//!     pub name: String,
//!     #[record(storage = "age,omitempty")]
//!     pub age: i32,
//! }
//! ```

use bson::Bson;

use crate::error::RecordStoreResult;

/// The reserved tag value marking a record's identifier field.
pub const ID_TAG: &str = "_id";

/// Tags declared on a single record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag {
    /// The Rust field name.
    pub field: &'static str,
    /// The filter tag, if any.
    pub filter: Option<&'static str>,
    /// The raw storage tag (`"name,options"`), if any.
    pub storage: Option<&'static str>,
}

impl FieldTag {
    /// Creates an untagged field descriptor.
    pub const fn new(field: &'static str) -> Self {
        Self { field, filter: None, storage: None }
    }

    /// Sets the filter tag.
    pub const fn with_filter(mut self, tag: &'static str) -> Self {
        self.filter = Some(tag);
        self
    }

    /// Sets the storage tag.
    pub const fn with_storage(mut self, tag: &'static str) -> Self {
        self.storage = Some(tag);
        self
    }

    /// Returns the non-empty filter key of this field.
    pub fn filter_key(&self) -> Option<&'static str> {
        self.filter.filter(|tag| !tag.is_empty())
    }

    /// Returns the storage key, i.e. the first comma separated component of the storage tag.
    ///
    /// Empty names yield `None`.
    pub fn storage_key(&self) -> Option<&'static str> {
        self.storage
            .and_then(|tag| tag.split(',').next())
            .filter(|name| !name.is_empty())
    }

    /// Returns the key the field is written under in a command document.
    ///
    /// This is the whole storage tag, options included, as long as it is non-empty and
    /// its first component is not the identifier tag.
    pub fn command_key(&self) -> Option<&'static str> {
        self.storage
            .filter(|tag| !tag.is_empty())
            .filter(|_| self.storage_key() != Some(ID_TAG))
    }

    /// Whether the filter tag marks this field as the record identifier.
    pub fn is_identifier(&self) -> bool {
        self.filter == Some(ID_TAG)
    }
}

/// A structured record whose fields can be mapped to query and command documents.
///
/// Usually derived with `#[derive(Record)]`. Hand-written implementations must return
/// exactly one value per entry of [`Record::field_tags`], in the same order.
pub trait Record {
    /// Returns the tag descriptors of every declared field, in declaration order.
    fn field_tags() -> &'static [FieldTag]
    where
        Self: Sized;

    /// Returns the current value of every declared field, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a field value cannot be represented as BSON.
    fn field_values(&self) -> RecordStoreResult<Vec<Bson>>;
}
