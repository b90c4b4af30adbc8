//! List query helpers shared by the read models: pagination and search.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// 0-based.
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Cut one page out of an already filtered and ordered result.
    pub fn apply<T>(self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items: Vec<T> = items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        let has_more = u64::from(self.offset) + (items.len() as u64) < total;

        Page {
            items,
            total,
            pagination: self,
            has_more,
        }
    }
}

/// One page of a list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Case-insensitive substring match of `needle` over any of `fields`.
///
/// A missing or blank needle matches everything.
pub fn contains_ci<'a>(needle: Option<&str>, fields: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) else {
        return true;
    };
    let needle = needle.to_lowercase();
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn limit_is_capped() {
        assert_eq!(Pagination::new(Some(5000), None).limit, MAX_LIMIT);
        assert_eq!(Pagination::new(None, None), Pagination::default());
    }

    #[test]
    fn apply_reports_total_and_more() {
        let page = Pagination::new(Some(2), Some(1)).apply(vec![1, 2, 3, 4]);
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.total, 4);
        assert!(page.has_more);

        let last = Pagination::new(Some(2), Some(2)).apply(vec![1, 2, 3, 4]);
        assert!(!last.has_more);
    }

    #[test]
    fn search_is_case_insensitive_and_skips_missing_fields() {
        assert!(contains_ci(Some("ROD"), [None, Some("Rodamiento 6204")]));
        assert!(!contains_ci(Some("filtro"), [Some("Correa"), None]));
        assert!(contains_ci(Some("  "), [None]));
        assert!(contains_ci(None, [Some("x")]));
    }

    proptest! {
        #[test]
        fn pages_tile_the_result(len in 0usize..200, limit in 1u32..50, offset in 0u32..250) {
            let items: Vec<usize> = (0..len).collect();
            let page = Pagination::new(Some(limit), Some(offset)).apply(items);

            prop_assert_eq!(page.total, len as u64);
            prop_assert!(page.items.len() <= limit as usize);
            prop_assert_eq!(page.items.first().copied(), ((offset as usize) < len).then_some(offset as usize));
            prop_assert_eq!(page.has_more, (offset as usize) + page.items.len() < len);
        }
    }
}
