//! # Filters and Pagination
//!
//! Page/sort parameters shared by every list endpoint. Validation rejects a
//! sort expression outside the endpoint's allow-list, so by the time
//! [`Filters::sort_clause`] is called the expression is known to be safe to
//! splice into an `ORDER BY`. Reaching it with anything else is a contract
//! violation reported as [`UnsafeSort`].

use serde::Serialize;

use crate::error::UnsafeSort;
use crate::validator::{self, Validator};

/// Largest accepted page number.
pub const MAX_PAGE: i64 = 1_000;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 100;
/// Page size when the client sends none.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Client-supplied paging and ordering.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Defaults: first page, [`DEFAULT_PAGE_SIZE`] rows, sorted by `id`.
    pub fn new(sort_safelist: &'static [&'static str]) -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: "id".to_owned(),
            sort_safelist,
        }
    }

    /// Resolve the sort expression into a column and direction.
    pub fn sort_clause(&self) -> Result<SortClause, UnsafeSort> {
        if !validator::permitted_value(&self.sort, self.sort_safelist) {
            return Err(UnsafeSort(self.sort.clone()));
        }
        Ok(match self.sort.strip_prefix('-') {
            Some(column) => SortClause {
                column: column.to_owned(),
                direction: SortDirection::Desc,
            },
            None => SortClause {
                column: self.sort.clone(),
                direction: SortDirection::Asc,
            },
        })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

pub fn validate_filters(v: &mut Validator, f: &Filters) {
    v.check(f.page > 0, "page", "must be greater than zero");
    v.check(f.page <= MAX_PAGE, "page", "must be a maximum of 1000");
    v.check(f.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        f.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    v.check(
        validator::permitted_value(&f.sort, f.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A resolved `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub column: String,
    pub direction: SortDirection,
}

/// Pagination metadata returned next to a page of results.
///
/// Every field is omitted when zero, so an empty result set serializes as
/// `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
