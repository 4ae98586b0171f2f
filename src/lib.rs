pub mod file;

pub use file::{
    FileError, FileHandle, FileResult, PAGE_SIZE, PageNum, PagedFileManager, PagedFileOptions,
};
