//! Storage primitives shared by the registry and rewards repositories.

use serde::{Deserialize, Serialize};

/// Failures surfaced by any repository implementation.
///
/// `Conflict` means a uniqueness rule rejected the write, `NotFound` means
/// the referenced record does not exist, and `Unavailable` wraps transport
/// or backend trouble.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One-based page selector accepted by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Page numbers below one and zero-sized pages are clamped rather than
    /// rejected; oversized pages are capped at [`MAX_PAGE_SIZE`].
    fn clamped(self) -> (usize, usize) {
        let page = self.page.max(1);
        let per_page = self.per_page.clamp(1, MAX_PAGE_SIZE);
        (page, per_page)
    }
}

/// Upper bound on `per_page` so a single request cannot dump the full store.
pub const MAX_PAGE_SIZE: usize = 200;

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

/// A slice of an ordered result set plus the paging metadata needed to walk
/// the rest of it.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Cuts the requested page out of an already-sorted full result set.
    pub fn paginate(all: Vec<T>, request: PageRequest) -> Self {
        let (page, per_page) = request.clamped();
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Self {
            items,
            page,
            per_page,
            total,
        }
    }
}
