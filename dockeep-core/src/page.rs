//! Pagination and sorting controls carried inside a query document.
//!
//! A query document may carry three reserved keys which are never used as filter
//! criteria:
//!
//! - `page` - the 1-based page number
//! - `limit` - the maximum number of results
//! - `sorting` - `"<field>,desc"`, or the bare literal `"asc"`
//!
//! [`FetchControls::take_from`] strips them from a document and turns them into the
//! [`FindSpec`] handed to the session.
//!
//! # Example
//!
//! ```ignore
//! use dockeep::page::FetchControls;
//! use bson::doc;
//!
//! let mut filter = doc! { "status": "active", "page": 3, "limit": 20 };
//! let controls = FetchControls::take_from(&mut filter);
//!
//! assert_eq!(filter, doc! { "status": "active" });
//! assert_eq!(controls.skip(), Some(40));
//! ```

use bson::{Bson, Document};
use tracing::warn;

use crate::query::{FindSpec, Sort};

/// Reserved key holding the 1-based page number.
pub const PAGE_KEY: &str = "page";
/// Reserved key holding the maximum number of results.
pub const LIMIT_KEY: &str = "limit";
/// Reserved key holding the sort specification.
pub const SORTING_KEY: &str = "sorting";

/// Pagination and sorting values extracted from a query document.
///
/// Missing or wrongly typed values are read as zero (or an empty string), the same as
/// an unset key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchControls {
    /// The 1-based page number, `0` when unset.
    pub page: i64,
    /// The maximum number of results, `0` when unset.
    pub limit: i64,
    /// The raw sorting value, empty when unset.
    pub sorting: String,
}

impl FetchControls {
    /// Removes the reserved keys from `document` and returns their values.
    pub fn take_from(document: &mut Document) -> Self {
        let page = document.remove(PAGE_KEY);
        let limit = document.remove(LIMIT_KEY);
        let sorting = document.remove(SORTING_KEY);

        Self {
            page: page.as_ref().and_then(as_int).unwrap_or(0),
            limit: limit.as_ref().and_then(as_int).unwrap_or(0),
            sorting: match sorting {
                Some(Bson::String(sorting)) => sorting,
                _ => String::new(),
            },
        }
    }

    /// The number of results to skip, `limit * (page - 1)`.
    ///
    /// Only set when `page` is positive. Without a positive limit the skip is zero.
    /// Products beyond `i64::MAX` saturate there.
    pub fn skip(&self) -> Option<u64> {
        if self.page <= 0 {
            return None;
        }

        Some(self.limit.max(0).saturating_mul(self.page - 1) as u64)
    }

    /// The result cap, only set when `limit` is positive.
    pub fn max_results(&self) -> Option<i64> {
        (self.limit > 0).then_some(self.limit)
    }

    /// Parses the sorting value.
    ///
    /// `"field,desc"` sorts descending on `field`. The bare literal `"asc"` sorts
    /// ascending on the first comma separated component of the value, which is `"asc"`
    /// itself. Anything else, including `"field,asc"`, yields no sort.
    pub fn sort(&self) -> Option<Sort> {
        if self.sorting.is_empty() {
            return None;
        }

        let parts = self.sorting.split(',').collect::<Vec<_>>();

        if parts.len() == 2 && parts[1] == "desc" {
            Some(Sort::desc(parts[0]))
        } else if self.sorting == "asc" {
            Some(Sort::asc(parts[0]))
        } else {
            warn!(sorting = %self.sorting, "Ignoring unrecognized sorting value");
            None
        }
    }

    /// Builds the find options described by these controls.
    pub fn find_spec(&self) -> FindSpec {
        FindSpec {
            limit: self.max_results(),
            skip: self.skip(),
            sort: self.sort(),
        }
    }
}

fn as_int(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(*value as i64),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}
