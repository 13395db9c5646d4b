use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::Serialize;

pub const DEFAULT_PER_PAGE: u64 = 10;
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    // Page floors at 1, per-page lives in [1, 100].
    pub fn clamped(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(req: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(req.per_page);
        Self {
            current_page: req.page,
            per_page: req.per_page,
            total,
            total_pages,
            has_next: req.page < total_pages,
            has_prev: req.page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

// Count plus one page fetch, both through the query builder. Callers hand over a
// `Select`, never SQL text.
pub async fn paginate<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    req: PageRequest,
) -> Result<Page<E::Model>, sea_orm::DbErr>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let paginator = select.paginate(db, req.per_page);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(req.page - 1).await?;

    Ok(Page {
        data,
        pagination: PageMeta::new(req, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_becomes_one() {
        assert_eq!(PageRequest::clamped(0, 10).page, 1);
    }

    #[test]
    fn per_page_clamps_to_bounds() {
        assert_eq!(PageRequest::clamped(1, 500).per_page, 100);
        assert_eq!(PageRequest::clamped(1, 0).per_page, 1);
        assert_eq!(PageRequest::clamped(1, 25).per_page, 25);
    }

    #[test]
    fn meta_uses_ceiling_division() {
        let meta = PageMeta::new(PageRequest::clamped(2, 10), 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn first_page_has_no_prev() {
        let meta = PageMeta::new(PageRequest::clamped(1, 10), 25);
        assert!(!meta.has_prev);
        assert!(meta.has_next);
    }

    #[test]
    fn last_page_has_no_next() {
        let meta = PageMeta::new(PageRequest::clamped(3, 10), 25);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let meta = PageMeta::new(PageRequest::clamped(1, 10), 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn exact_multiple_of_per_page() {
        let meta = PageMeta::new(PageRequest::clamped(2, 10), 20);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next);
    }
}
