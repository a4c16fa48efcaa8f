//! Query and command documents exchanged with a session.
//!
//! - [`QueryDocument`] - a filter mapping, optionally carrying the reserved pagination
//!   and sorting keys described in [`page`](crate::page)
//! - [`CommandDocument`] - an update command, `{ operator: { field: value, ... } }`
//! - [`FetchMode`] - whether a fetch runs a filtered find or an aggregation pipeline
//! - [`FindSpec`] / [`Sort`] - find options handed to the session
//!
//! # Example
//!
//! ```ignore
//! use dockeep::query::QueryDocument;
//!
//! let mut query = QueryDocument::new()
//!     .limit(10)
//!     .page(2)
//!     .sorting("age,desc");
//!
//! query.key_value("status", "active");
//! query.set_object_id("507f191e810c19729de860ea")?;
//! ```

use bson::{Bson, Document, oid::ObjectId};
use std::{fmt, str::FromStr};

use crate::{
    error::{RecordStoreError, RecordStoreResult},
    mapper,
    page::{LIMIT_KEY, PAGE_KEY, SORTING_KEY},
    record::{ID_TAG, Record},
};

/// Sort direction for find results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric form used in sort documents, `1` or `-1`.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort specification for find results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// Renders the sort as a sort document, e.g. `{ "age": -1 }`.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert(self.field.clone(), self.direction.as_i32());
        document
    }
}

/// Options of a filtered find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindSpec {
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

/// How a fetch reads from a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// A filtered find honoring `page`, `limit` and `sorting`.
    Find,
    /// An aggregation pipeline built from the query document. Pagination and sorting
    /// keys are ignored; pipeline stages are expected to encode them.
    Aggregate,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Find => "find",
            FetchMode::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMode {
    type Err = RecordStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find" => Ok(FetchMode::Find),
            "aggregate" => Ok(FetchMode::Aggregate),
            other => Err(RecordStoreError::UnsupportedFetchMode(other.to_string())),
        }
    }
}

/// A filter document used to select records.
///
/// Keys map to arbitrary values. The reserved keys `page`, `limit` and `sorting` drive
/// pagination and sorting and are stripped before the document reaches the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDocument {
    document: Document,
}

impl QueryDocument {
    /// Creates an empty query document, matching every record.
    pub fn new() -> Self {
        Self { document: Document::new() }
    }

    /// Parses `id` as a hex object id and stores it under `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::InvalidInput`] if `id` is not a valid object id.
    pub fn set_object_id(&mut self, id: &str) -> RecordStoreResult<()> {
        self.document.insert(ID_TAG, mapper::parse_object_id(id)?);
        Ok(())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn key_value(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.document.insert(key.into(), value.into());
    }

    /// Adds the filter-tagged fields of `record` to this document.
    ///
    /// When the record's identifier is set, it alone is added (as an object id under
    /// `_id`). An empty identifier is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::InvalidInput`] if the identifier field is not a string
    /// or not a valid object id.
    pub fn from_record<R: Record>(&mut self, record: &R) -> RecordStoreResult<()> {
        for (key, value) in mapper::to_query_document(record)? {
            self.document.insert(key, value);
        }

        Ok(())
    }

    /// Builds a query document from the filter-tagged fields of `record`.
    pub fn for_record<R: Record>(record: &R) -> RecordStoreResult<Self> {
        Ok(Self { document: mapper::to_query_document(record)? })
    }

    /// Sets `key` to `value` and returns the document.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.key_value(key, value);
        self
    }

    /// Sets the 1-based page number.
    pub fn page(self, page: i64) -> Self {
        self.with(PAGE_KEY, page)
    }

    /// Sets the maximum number of results.
    pub fn limit(self, limit: i64) -> Self {
        self.with(LIMIT_KEY, limit)
    }

    /// Sets the sorting value (`"field,desc"` or `"asc"`).
    pub fn sorting(self, sorting: impl Into<String>) -> Self {
        self.with(SORTING_KEY, sorting.into())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.document.get(key)
    }

    /// Returns the parsed identifier, if one was set as an object id.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.document.get(ID_TAG) {
            Some(Bson::ObjectId(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl From<Document> for QueryDocument {
    fn from(document: Document) -> Self {
        Self { document }
    }
}

impl From<QueryDocument> for Document {
    fn from(query: QueryDocument) -> Self {
        query.document
    }
}

impl TryFrom<Bson> for QueryDocument {
    type Error = RecordStoreError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::Document(document) => Ok(Self { document }),
            other => Err(RecordStoreError::InvalidInput(format!(
                "query should be of type document, got {:?}",
                other.element_type()
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for QueryDocument {
    type Error = RecordStoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(RecordStoreError::InvalidInput(
                "query should be of type object".to_string(),
            ));
        }

        Self::try_from(bson::ser::serialize_to_bson(&value)?)
    }
}

/// Converts the stripped query document of an aggregate fetch into pipeline stages.
///
/// A document whose keys are all stage operators (`$match`, `$sort`, ...) yields one
/// stage per key, in document order. Any other non-empty document is treated as a filter
/// and wrapped in a single `$match` stage.
pub fn into_pipeline(document: Document) -> Vec<Document> {
    if document.is_empty() {
        return Vec::new();
    }

    if document.keys().all(|key| key.starts_with('$')) {
        return document
            .into_iter()
            .map(|(stage, spec)| {
                let mut document = Document::new();
                document.insert(stage, spec);
                document
            })
            .collect();
    }

    let mut stage = Document::new();
    stage.insert("$match", document);
    vec![stage]
}

/// An update command document, `{ operator: { field: value, ... } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDocument {
    document: Document,
}

impl CommandDocument {
    /// The field assignment operator used by record updates.
    pub const SET: &'static str = "$set";

    /// Builds `{ operator: { storage_tag: value, ... } }` from the storage-tagged fields
    /// of `record`. The identifier is never included.
    ///
    /// # Errors
    ///
    /// Returns an error if a field value cannot be represented as BSON.
    pub fn from_record<R: Record>(operator: &str, record: &R) -> RecordStoreResult<Self> {
        Ok(Self { document: mapper::to_command_document(operator, record)? })
    }

    /// Returns the operator, the single top-level key.
    pub fn operator(&self) -> Option<&str> {
        self.document.keys().next().map(String::as_str)
    }

    /// Returns the field payload under the operator.
    pub fn fields(&self) -> Option<&Document> {
        self.document.values().next().and_then(Bson::as_document)
    }

    pub fn as_document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}
