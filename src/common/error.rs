use thiserror::Error;

use super::types::PageId;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read on page {page_id}: got {got} of {expected} bytes")]
    ShortRead {
        page_id: PageId,
        got: usize,
        expected: usize,
    },

    #[error("invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("buffer pool exhausted: every frame is pinned")]
    PoolExhausted,

    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("pin count for page {0} is already zero")]
    PinCountZero(PageId),

    #[error("duplicate key: {0}")]
    DuplicateKey(i64),

    #[error("value too large: {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("tree corrupted: {0}")]
    TreeCorrupted(String),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("database '{0}' already exists")]
    DatabaseExists(String),

    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("no database selected; run 'use <name>' first")]
    NoDatabaseSelected,

    #[error("cannot drop database '{0}' while it is in use")]
    DatabaseInUse(String),

    #[error("database '{requested}' is not mounted; this server is bound to '{mounted}' (restart against the other database to use it)")]
    DatabaseNotMounted { requested: String, mounted: String },

    #[error("catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("syntax error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
