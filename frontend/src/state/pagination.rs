use crate::models::{PAGE_SIZE, PageRequest};

const MAX_PAGE: u32 = u32::MAX / PAGE_SIZE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination { page: 1 }
    }
}

impl Pagination {
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Pages are 1-based; 0 is treated as the first page. Pages past the
    /// last offset a `u32` can carry are pinned to that page.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.clamp(1, MAX_PAGE);
    }

    pub fn reset_to_first_page(&mut self) {
        self.page = 1;
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::for_page(self.page)
    }
}
