use super::types::PageId;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(-1);

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 100;

/// Default TCP port the server listens on
pub const DEFAULT_PORT: u16 = 8888;

/// Default root directory for database files
pub const DEFAULT_DATA_ROOT: &str = "./pagedb_data";

/// Name of the page file inside a database directory
pub const DB_FILE: &str = "data.db";

/// Name of the catalog sidecar inside a database directory
pub const META_FILE: &str = "meta.json";

/// Database mounted at server startup
pub const DEFAULT_DB: &str = "main";
