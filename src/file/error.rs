use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::PageNum;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File handle not initialized")]
    FileHandleNotInitialized,

    /// `page_num` is signed so that stepping back from page 0 reports -1.
    #[error("Read non-existing page: page_num={page_num}, total_pages={total_pages}")]
    ReadNonExistingPage { page_num: i64, total_pages: usize },

    #[error("Write failed: page_num={page_num}: {source}")]
    WriteFailed {
        page_num: PageNum,
        #[source]
        source: io::Error,
    },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

pub type FileResult<T> = Result<T, FileError>;
