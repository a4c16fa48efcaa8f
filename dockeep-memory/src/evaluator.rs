//! Filter evaluation and ordering for in-memory documents.
//!
//! Filters are plain BSON documents in the usual database shape: `{ "field": value }`
//! for equality, `{ "field": { "$op": value } }` for comparisons and the `$and`, `$or`
//! and `$nor` combinators. Field names may be dotted paths into embedded documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use dockeep_core::{
    error::{RecordStoreError, RecordStoreResult},
    query::SortDirection,
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)`, `Int64(1)` and `Double(1.0)`
/// compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used when sorting documents; values of different types are ordered
    /// by type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// Resolves a possibly dotted `path` inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => lookup(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

/// Orders two documents by the given sort keys, in key order.
pub(crate) fn compare_documents(
    left: &Document,
    right: &Document,
    keys: &[(String, SortDirection)],
) -> Ordering {
    for (field, direction) in keys {
        let a = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let b = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match direction {
            SortDirection::Asc => a.sort_cmp(&b),
            SortDirection::Desc => b.sort_cmp(&a),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}


/// Evaluates filter documents against a single stored document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Backend`] for unknown operators or malformed operands.
    pub fn matches(&self, filter: &Document) -> RecordStoreResult<bool> {
        for (key, value) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(clauses(key, value)?)?,
                "$or" => self.any(clauses(key, value)?)?,
                "$nor" => !self.any(clauses(key, value)?)?,
                operator if operator.starts_with('$') => {
                    return Err(unknown_operator(operator));
                }
                field => self.matches_field(field, value)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents matching `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> RecordStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn all(&self, filters: Vec<&Document>) -> RecordStoreResult<bool> {
        for filter in filters {
            if !self.matches(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, filters: Vec<&Document>) -> RecordStoreResult<bool> {
        for filter in filters {
            if self.matches(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn matches_field(&self, field: &str, condition: &Bson) -> RecordStoreResult<bool> {
        let value = lookup(self.document, field);

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (operator, operand) in operators {
                    if !self.apply(operator, value, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            _ => Ok(equals(value, condition)),
        }
    }

    fn apply(&self, operator: &str, value: Option<&Bson>, operand: &Bson) -> RecordStoreResult<bool> {
        match operator {
            "$eq" => Ok(equals(value, operand)),
            "$ne" => Ok(!equals(value, operand)),
            "$gt" => Ok(compares(value, operand, |o| o == Ordering::Greater)),
            "$gte" => Ok(compares(value, operand, |o| o != Ordering::Less)),
            "$lt" => Ok(compares(value, operand, |o| o == Ordering::Less)),
            "$lte" => Ok(compares(value, operand, |o| o != Ordering::Greater)),
            "$in" => Ok(in_array(operator, value, operand)?),
            "$nin" => Ok(!in_array(operator, value, operand)?),
            "$exists" => match operand {
                Bson::Boolean(expected) => Ok(value.is_some() == *expected),
                Bson::Int32(flag) => Ok(value.is_some() == (*flag != 0)),
                Bson::Int64(flag) => Ok(value.is_some() == (*flag != 0)),
                _ => Err(RecordStoreError::Backend("$exists needs a boolean".to_string())),
            },
            other => Err(unknown_operator(other)),
        }
    }
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn clauses<'b>(operator: &str, value: &'b Bson) -> RecordStoreResult<Vec<&'b Document>> {
    let invalid = || RecordStoreError::Backend(format!("{operator} must be an array of documents"));

    match value {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_document().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn unknown_operator(operator: &str) -> RecordStoreError {
    RecordStoreError::Backend(format!("unknown operator: {operator}"))
}

/// Equality with array semantics: an array field matches when it equals the operand or
/// contains it. A missing field equals null.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    let expected = Comparable::from(operand);

    match value {
        None => expected == Comparable::Null,
        Some(value) => {
            let actual = Comparable::from(value);

            if actual == expected {
                return true;
            }

            match actual {
                Comparable::Array(items) => items.iter().any(|item| item == &expected),
                _ => false,
            }
        }
    }
}

/// Range comparison; only values of the same type compare.
fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let expected = Comparable::from(operand);

    match value.map(Comparable::from) {
        Some(Comparable::Array(items)) => items
            .iter()
            .any(|item| item.partial_cmp(&expected).is_some_and(&accept)),
        Some(actual) => actual.partial_cmp(&expected).is_some_and(accept),
        None => false,
    }
}

fn in_array(operator: &str, value: Option<&Bson>, operand: &Bson) -> RecordStoreResult<bool> {
    match operand {
        Bson::Array(candidates) => Ok(candidates.iter().any(|candidate| equals(value, candidate))),
        _ => Err(RecordStoreError::Backend(format!("{operator} needs an array"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: Document, filter: Document) -> bool {
        DocumentEvaluator::new(&document).matches(&filter).unwrap()
    }

    #[test]
    fn implicit_equality_normalizes_numbers() {
        assert!(matches(doc! { "age": 30_i64 }, doc! { "age": 30 }));
        assert!(!matches(doc! { "age": 31 }, doc! { "age": 30 }));
    }

    #[test]
    fn missing_field_equals_null() {
        assert!(matches(doc! { "name": "a" }, doc! { "email": Bson::Null }));
        assert!(!matches(doc! { "name": "a" }, doc! { "email": "x" }));
    }

    #[test]
    fn object_ids_do_not_equal_strings() {
        let id = ObjectId::parse_str("507f191e810c19729de860ea").unwrap();

        assert!(matches(doc! { "_id": id }, doc! { "_id": id }));
        assert!(!matches(doc! { "_id": id }, doc! { "_id": "507f191e810c19729de860ea" }));
    }

    #[test]
    fn comparison_operators() {
        let document = doc! { "age": 30, "name": "bob" };

        assert!(matches(document.clone(), doc! { "age": { "$gt": 18, "$lte": 30 } }));
        assert!(!matches(document.clone(), doc! { "age": { "$lt": 30 } }));
        assert!(!matches(document.clone(), doc! { "name": { "$gt": 5 } }));
        assert!(matches(document, doc! { "name": { "$ne": "alice" } }));
    }

    #[test]
    fn membership_and_existence() {
        let document = doc! { "tags": ["a", "b"], "role": "admin" };

        assert!(matches(document.clone(), doc! { "tags": "a" }));
        assert!(matches(document.clone(), doc! { "role": { "$in": ["user", "admin"] } }));
        assert!(matches(document.clone(), doc! { "role": { "$nin": ["user"] } }));
        assert!(matches(document.clone(), doc! { "role": { "$exists": true } }));
        assert!(matches(document, doc! { "email": { "$exists": false } }));
    }

    #[test]
    fn logical_combinators() {
        let document = doc! { "age": 30, "name": "bob" };

        assert!(matches(document.clone(), doc! { "$or": [{ "age": 1 }, { "name": "bob" }] }));
        assert!(!matches(document.clone(), doc! { "$and": [{ "age": 30 }, { "name": "eve" }] }));
        assert!(matches(document, doc! { "$nor": [{ "age": 1 }, { "name": "eve" }] }));
    }

    #[test]
    fn dotted_paths_reach_embedded_documents() {
        let document = doc! { "address": { "city": "Oslo" } };

        assert!(matches(document.clone(), doc! { "address.city": "Oslo" }));
        assert!(!matches(document, doc! { "address.zip": { "$exists": true } }));
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let document = doc! { "age": 30 };

        assert!(DocumentEvaluator::new(&document).matches(&doc! { "age": { "$regex": "3" } }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$where": "x" }).is_err());
    }

    #[test]
    fn sorting_orders_across_types() {
        let keys = vec![("v".to_string(), SortDirection::Asc)];

        assert_eq!(compare_documents(&doc! {}, &doc! { "v": 1 }, &keys), Ordering::Less);
        assert_eq!(compare_documents(&doc! { "v": "a" }, &doc! { "v": 1 }, &keys), Ordering::Greater);
        assert_eq!(compare_documents(&doc! { "v": 2 }, &doc! { "v": 1.5 }, &keys), Ordering::Greater);
    }
}
