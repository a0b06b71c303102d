use serde::{Deserialize, Serialize};

use super::error::{DaoLayerError, DaoResult};

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> DaoResult<Self> {
        let request = Self { page, page_size };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> DaoResult<()> {
        if self.page == 0 || self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(DaoLayerError::InvalidPagination {
                page: self.page,
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// One extra row is fetched to learn whether another page exists.
    pub fn fetch_size(&self) -> u64 {
        self.page_size.saturating_add(1)
    }

    pub fn into_response<T>(self, mut data: Vec<T>) -> PaginatedResponse<T> {
        let has_next = data.len() > self.page_size as usize;
        if has_next {
            data.truncate(self.page_size as usize);
        }

        PaginatedResponse {
            data,
            page: self.page,
            page_size: self.page_size,
            has_next,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub has_next: bool,
}

#[cfg(test)]
mod tests {
    use super::{MAX_PAGE_SIZE, PageRequest};
    use crate::db::dao::DaoLayerError;

    #[test]
    fn rejects_out_of_range_pages() {
        assert!(matches!(
            PageRequest::new(0, 10),
            Err(DaoLayerError::InvalidPagination { page: 0, .. })
        ));
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE).is_ok());
    }

    #[test]
    fn trims_the_lookahead_row() {
        let request = PageRequest::new(2, 2).expect("valid page");
        assert_eq!(request.offset(), 2);

        let page = request.into_response(vec![1, 2, 3]);
        assert_eq!(page.data, vec![1, 2]);
        assert!(page.has_next);

        let last = request.into_response(vec![4]);
        assert!(!last.has_next);
    }
}
