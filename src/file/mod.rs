mod error;
mod file_manager;

pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager, PagedFileOptions};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Zero-based page ordinal within a paged file
pub type PageNum = usize;
