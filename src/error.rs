use thiserror::Error;
use std::io;

use crate::storage::page::PageId;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not a valid database file")]
    InvalidFormat,
    #[error("file header not initialized")]
    HeaderNotInitialized,
    #[error("database is not open, call open() first")]
    NotOpen,
    #[error("page id {0} is out of range")]
    InvalidPageId(PageId),
    #[error("corrupt page {page}: {reason}")]
    Corrupt { page: PageId, reason: String },
    #[error("key of {size} bytes exceeds the {max}-byte key limit")]
    KeyTooLarge { size: usize, max: usize },
    #[error("cell of {size} bytes exceeds the {max} bytes a page can hold")]
    CellTooLarge { size: usize, max: usize },
    #[error("page {page} has no room for a cell of {size} bytes")]
    PageFull { page: PageId, size: usize },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DbError {
    pub(crate) fn corrupt(page: PageId, reason: impl Into<String>) -> Self {
        DbError::Corrupt { page, reason: reason.into() }
    }
}

pub type DbResult<T> = Result<T, DbError>;
