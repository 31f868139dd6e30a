use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::validation::FieldErrors;

pub const MAX_PAGE_SIZE: u32 = 50;

/// A requested window over an ordered result set. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Page {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Parses raw `page`/`limit` query values, recording bad ones in `errors`.
    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u32,
        errors: &mut FieldErrors,
    ) -> Page {
        let page = match page.map(str::trim).filter(|v| !v.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => {
                    errors.push("page", "page must be an integer greater than 0");
                    1
                }
            },
        };
        let limit = match limit.map(str::trim).filter(|v| !v.is_empty()) {
            None => default_limit,
            Some(raw) => match raw.parse::<u32>() {
                Ok(l) if (1..=MAX_PAGE_SIZE).contains(&l) => l,
                _ => {
                    errors.push(
                        "limit",
                        format!("limit must be an integer between 1 and {MAX_PAGE_SIZE}"),
                    );
                    default_limit
                }
            },
        };
        Page::new(page, limit)
    }

    /// Applies the window to an already ordered in-memory list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Paging block returned beside every list. The total is emitted under a
/// resource-specific key (`totalJobs`, `totalApplications`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub total_pages: u64,
    pub total: u64,
    pub total_key: &'static str,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(page: Page, total: u64, total_key: &'static str) -> Self {
        let total_pages = total.div_ceil(u64::from(page.limit));
        PaginationMeta {
            current_page: page.page,
            total_pages,
            total,
            total_key,
            has_next_page: u64::from(page.page) < total_pages,
            has_prev_page: page.page > 1,
        }
    }
}

impl Serialize for PaginationMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("currentPage", &self.current_page)?;
        map.serialize_entry("totalPages", &self.total_pages)?;
        map.serialize_entry(self.total_key, &self.total)?;
        map.serialize_entry("hasNextPage", &self.has_next_page)?;
        map.serialize_entry("hasPrevPage", &self.has_prev_page)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let mut errors = FieldErrors::new();
        let page = Page::parse(None, None, 12, &mut errors);
        assert_eq!(page, Page { page: 1, limit: 12 });
        assert!(errors.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut errors = FieldErrors::new();
        Page::parse(Some("0"), Some("51"), 12, &mut errors);
        let fields: Vec<_> = errors.into_vec().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["page", "limit"]);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let mut errors = FieldErrors::new();
        Page::parse(Some("two"), None, 10, &mut errors);
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_offset_and_slice() {
        let page = Page::new(2, 3);
        assert_eq!(page.offset(), 3);
        let items: Vec<u32> = (1..=8).collect();
        assert_eq!(page.slice(&items), vec![4, 5, 6]);
        assert_eq!(Page::new(3, 3).slice(&items), vec![7, 8]);
        assert!(Page::new(4, 3).slice(&items).is_empty());
    }

    #[test]
    fn test_meta() {
        let meta = PaginationMeta::new(Page::new(2, 10), 25, "totalJobs");
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let meta = PaginationMeta::new(Page::new(1, 10), 0, "totalJobs");
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn test_meta_serializes_total_under_resource_key() {
        let meta = PaginationMeta::new(Page::new(1, 10), 3, "totalApplications");
        let value = serde_json::to_value(meta).unwrap();
        assert_eq!(value["totalApplications"], 3);
        assert_eq!(value["currentPage"], 1);
        assert_eq!(value["totalPages"], 1);
        assert!(value.get("total").is_none());
    }
}
