//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in a given ISO 4217 currency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency_code: String,
}

impl Money {
    pub fn new(amount: Decimal, currency_code: impl Into<String>) -> Self {
        Self {
            amount,
            currency_code: currency_code.into(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code)
    }
}

/// Sort direction for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination and sorting parameters as received from the query string
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<SortDirection>,
}

impl PageQuery {
    /// Resolve into clamped pagination
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page.unwrap_or(1).max(1),
            per_page: self
                .per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    /// Resolve the sort column against a whitelist; the first entry is the default.
    ///
    /// Returns the SQL column name, never the raw user input.
    pub fn sort_column<'a>(&self, allowed: &[(&str, &'a str)]) -> &'a str {
        self.sort_by
            .as_deref()
            .and_then(|key| allowed.iter().find(|(k, _)| *k == key))
            .or_else(|| allowed.first())
            .map(|(_, column)| *column)
            .unwrap_or("created_at")
    }

    pub fn direction(&self) -> SortDirection {
        self.sort_dir.unwrap_or_default()
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(pagination, total_items),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        let total_pages = total_items.div_ceil(per_page);
        Self {
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_clamps_values() {
        let query = PageQuery {
            page: Some(0),
            per_page: Some(1000),
            ..Default::default()
        };
        let pagination = query.pagination();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, MAX_PER_PAGE);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn offset_follows_page() {
        let pagination = Pagination { page: 3, per_page: 25 };
        assert_eq!(pagination.offset(), 50);
        assert_eq!(pagination.limit(), 25);
    }

    #[test]
    fn sort_column_only_accepts_whitelisted_keys() {
        let allowed = [("created_at", "p.created_at"), ("name", "p.name")];
        let query = PageQuery {
            sort_by: Some("name".into()),
            ..Default::default()
        };
        assert_eq!(query.sort_column(&allowed), "p.name");

        let injected = PageQuery {
            sort_by: Some("name; DROP TABLE orders".into()),
            ..Default::default()
        };
        assert_eq!(injected.sort_column(&allowed), "p.created_at");
    }

    #[test]
    fn total_pages_rounds_up() {
        let meta = PaginationMeta::new(Pagination { page: 1, per_page: 20 }, 41);
        assert_eq!(meta.total_pages, 3);
        let empty = PaginationMeta::new(Pagination::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
