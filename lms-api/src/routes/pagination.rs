//! Page-number pagination
//!
//! List endpoints accept `?page=N&page_size=M` and answer with
//! `{count, next, previous, results}`. `next` and `previous` are the request
//! path with every other query parameter preserved.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_PAGE_SIZE,
    error::{ApiError, ApiResult},
};

/// Raw page parameters from the query string
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// Resolves the window; `page_size` 0 or absent falls back to `default_size`
    /// and anything above [`MAX_PAGE_SIZE`] is capped.
    pub fn resolve(params: PageParams, default_size: u32) -> ApiResult<Self> {
        let page = match params.page {
            None => 1,
            Some(0) => return Err(ApiError::field("page", "Invalid page")),
            Some(page) => page,
        };

        let page_size = match params.page_size {
            None | Some(0) => default_size,
            Some(size) => size.min(MAX_PAGE_SIZE),
        };

        Ok(Self { page, page_size })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// Paged response envelope
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Builds the envelope for `uri`
    ///
    /// # Errors
    ///
    /// A page past the last one (other than page 1 of an empty list) is 404.
    pub fn new(uri: &Uri, pagination: Pagination, count: i64, results: Vec<T>) -> ApiResult<Self> {
        if pagination.page > 1 && pagination.offset() >= count {
            return Err(ApiError::NotFound("Invalid page".to_string()));
        }

        let next = (pagination.offset() + pagination.limit() < count)
            .then(|| page_link(uri, pagination.page + 1));
        let previous = (pagination.page > 1).then(|| page_link(uri, pagination.page - 1));

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }
}

/// `uri` with its `page` parameter replaced
fn page_link(uri: &Uri, page: u32) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "page" && !pair.starts_with("page="))
        .map(String::from)
        .collect();
    pairs.push(format!("page={}", page));

    format!("{}?{}", uri.path(), pairs.join("&"))
}
