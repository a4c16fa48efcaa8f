//! Conversions from tagged records to query and command documents.
//!
//! Both conversions walk the [`FieldTag`] enumeration of a [`Record`] alongside the
//! record's current field values. Filter tags drive [`to_query_document`]; storage tags
//! drive [`to_command_document`].

use bson::{Bson, Document, oid::ObjectId};

use crate::{
    error::{RecordStoreError, RecordStoreResult},
    record::{FieldTag, ID_TAG, Record},
};

/// Parses a hex string into an object id.
///
/// # Errors
///
/// Returns [`RecordStoreError::InvalidInput`] if `id` is not 24 hex characters.
pub fn parse_object_id(id: &str) -> RecordStoreResult<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|e| RecordStoreError::InvalidInput(format!("invalid object id {id}: {e}")))
}

/// Pairs every field tag of `record` with its current value.
fn tagged_values<R: Record>(record: &R) -> RecordStoreResult<Vec<(&'static FieldTag, Bson)>> {
    let tags = R::field_tags();
    let values = record.field_values()?;

    if tags.len() != values.len() {
        return Err(RecordStoreError::InvalidInput(
            "only accept input of type simple struct".to_string(),
        ));
    }

    Ok(tags.iter().zip(values).collect())
}

/// Builds a filter document from the filter-tagged fields of `record`.
///
/// Every field with a non-empty filter tag contributes `{ tag: value }`, zero values
/// included. The identifier field (filter tag `"_id"`) is handled apart: when it holds a
/// non-empty string, the string is parsed as an object id and the resulting document
/// contains only `{ "_id": ObjectId(..) }`. This holds wherever the identifier is
/// declared: filter fields declared before it are dropped as well, not just the ones
/// after it. An empty identifier is skipped.
///
/// # Errors
///
/// Returns [`RecordStoreError::InvalidInput`] if the identifier field is not a string, or
/// holds a string that is not a valid object id.
pub fn to_query_document<R: Record>(record: &R) -> RecordStoreResult<Document> {
    let mut document = Document::new();

    for (tag, value) in tagged_values(record)? {
        if tag.is_identifier() {
            let id = match value {
                Bson::String(id) => id,
                _ => {
                    return Err(RecordStoreError::InvalidInput(format!(
                        "valid _id only of value string, field {} is not",
                        tag.field
                    )));
                }
            };

            if id.is_empty() {
                continue;
            }

            let mut identified = Document::new();
            identified.insert(ID_TAG, parse_object_id(&id)?);
            return Ok(identified);
        }

        if let Some(key) = tag.filter_key() {
            document.insert(key, value);
        }
    }

    Ok(document)
}

/// Builds `{ operator: { storage_tag: value, ... } }` from the storage-tagged fields of
/// `record`.
///
/// The whole storage tag is used as the key, options included (`"age,omitempty"` stays
/// `"age,omitempty"`). Fields whose storage tag starts with `"_id"` are never part of the
/// payload, whatever their value.
pub fn to_command_document<R: Record>(operator: &str, record: &R) -> RecordStoreResult<Document> {
    let mut fields = Document::new();

    for (tag, value) in tagged_values(record)? {
        if let Some(key) = tag.command_key() {
            fields.insert(key, value);
        }
    }

    let mut command = Document::new();
    command.insert(operator, fields);

    Ok(command)
}
