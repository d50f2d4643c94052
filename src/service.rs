//! Business rules, written against the store traits rather than `DBClient`
//! so they can run on the in-memory store in tests.

pub mod catalog;
pub mod comment;
pub mod review;
pub mod signup;
pub mod users;

use crate::db::StoreError;
use crate::error::{ErrorMessage, HttpError};

/// Log a storage failure and hide its details from the client
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(StoreError) -> HttpError {
    move |e| {
        tracing::error!("DB error, {}: {}", context, e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    }
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        PageParams { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            return 0;
        }
        (self.total + i64::from(self.limit) - 1) / i64::from(self.limit)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}
