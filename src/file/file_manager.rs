use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageNum};

/// Contents of every freshly allocated page
static ZERO_PAGE: [u8; PAGE_SIZE] = [0; PAGE_SIZE];

/// Tunables shared by every handle a manager opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagedFileOptions {
    /// Call `sync_data` after every block write and append
    pub sync_on_write: bool,
    /// Call `sync_all` before releasing the file on close
    pub sync_on_close: bool,
}

/// Creates, opens, and destroys paged files.
///
/// A paged file is a flat sequence of `PAGE_SIZE` byte pages with no header;
/// the page count is derived from the file length alone. The manager keeps no
/// per-file state, so handles for different files are fully independent.
#[derive(Debug, Default)]
pub struct PagedFileManager {
    options: PagedFileOptions,
}

impl PagedFileManager {
    /// Create a new paged file manager
    pub fn new() -> Self {
        Self::with_options(PagedFileOptions::default())
    }

    /// Create a new paged file manager with the given options
    pub fn with_options(options: PagedFileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> PagedFileOptions {
        self.options
    }

    /// Create a page file holding a single zeroed page, truncating any
    /// existing content at `path`.
    pub fn create_page_file<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        let mut file = File::create(path).map_err(|source| FileError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        file.write_all(&ZERO_PAGE)
            .map_err(|source| FileError::WriteFailed {
                page_num: 0,
                source,
            })?;

        if self.options.sync_on_write {
            file.sync_data()?;
        }

        debug!("Created page file {}", path.display());
        Ok(())
    }

    /// Open an existing page file for reading and writing
    pub fn open_page_file<P: AsRef<Path>>(&self, path: P) -> FileResult<FileHandle> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| FileError::FileNotFound {
                path: path.to_path_buf(),
                source,
            })?;

        let file_size = file.metadata()?.len();
        // A trailing partial page is not counted
        let total_num_pages = (file_size / PAGE_SIZE as u64) as usize;
        if file_size % PAGE_SIZE as u64 != 0 {
            debug!(
                "Page file {} has {} trailing bytes beyond the last full page",
                path.display(),
                file_size % PAGE_SIZE as u64
            );
        }

        debug!(
            "Opened page file {} with {} pages",
            path.display(),
            total_num_pages
        );

        Ok(FileHandle {
            file_name: path.to_path_buf(),
            total_num_pages,
            cur_page_pos: 0,
            file: Some(file),
            options: self.options,
        })
    }

    /// Close a page file; the handle cannot be used for I/O afterwards
    pub fn close_page_file(&self, handle: &mut FileHandle) -> FileResult<()> {
        handle.close()
    }

    /// Remove a page file from the file system
    pub fn destroy_page_file<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        fs::remove_file(path).map_err(|source| FileError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Destroyed page file {}", path.display());
        Ok(())
    }
}

/// Handle to an open page file.
///
/// Tracks the page count and a cursor, the page last successfully read.
/// Reads move the cursor; writes and appends leave it where it is.
#[derive(Debug)]
pub struct FileHandle {
    file_name: PathBuf,
    total_num_pages: usize,
    cur_page_pos: PageNum,
    /// `None` once the handle has been closed
    file: Option<File>,
    options: PagedFileOptions,
}

impl FileHandle {
    /// Path the file was opened with
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn total_num_pages(&self) -> usize {
        self.total_num_pages
    }

    /// Current cursor position
    pub fn block_pos(&self) -> PageNum {
        self.cur_page_pos
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Release the underlying file. Closing twice is an error.
    ///
    /// With `sync_on_close`, a failed sync leaves the handle open.
    pub fn close(&mut self) -> FileResult<()> {
        if self.options.sync_on_close {
            self.file_mut()?.sync_all()?;
        }

        self.file
            .take()
            .ok_or(FileError::FileHandleNotInitialized)?;

        debug!("Closed page file {}", self.file_name.display());
        Ok(())
    }

    /// Flush file contents to disk
    pub fn sync(&mut self) -> FileResult<()> {
        self.file_mut()?.sync_data()?;
        Ok(())
    }

    /// Read page `page_num` into `buffer` and move the cursor there
    pub fn read_block(&mut self, page_num: PageNum, buffer: &mut [u8]) -> FileResult<()> {
        let total_pages = self.total_num_pages;
        let file = self.file_mut()?;
        check_page_size(buffer.len())?;

        if page_num >= total_pages {
            return Err(FileError::ReadNonExistingPage {
                page_num: page_num as i64,
                total_pages,
            });
        }

        file.seek(SeekFrom::Start(page_offset(page_num)))?;
        let bytes_read = read_full(file, buffer)?;
        if bytes_read < PAGE_SIZE {
            // The file shrank underneath us
            return Err(FileError::ReadNonExistingPage {
                page_num: page_num as i64,
                total_pages,
            });
        }

        self.cur_page_pos = page_num;
        trace!("Read page {} of {}", page_num, self.file_name.display());
        Ok(())
    }

    pub fn read_first_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_block(0, buffer)
    }

    pub fn read_last_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        match self.total_num_pages.checked_sub(1) {
            Some(last) => self.read_block(last, buffer),
            None => {
                self.file_mut()?;
                Err(FileError::ReadNonExistingPage {
                    page_num: -1,
                    total_pages: 0,
                })
            }
        }
    }

    pub fn read_previous_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        match self.cur_page_pos.checked_sub(1) {
            Some(previous) => self.read_block(previous, buffer),
            None => {
                self.file_mut()?;
                Err(FileError::ReadNonExistingPage {
                    page_num: -1,
                    total_pages: self.total_num_pages,
                })
            }
        }
    }

    /// Re-read the page under the cursor
    pub fn read_current_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_block(self.cur_page_pos, buffer)
    }

    pub fn read_next_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        let next = self.cur_page_pos + 1;
        if next >= self.total_num_pages {
            self.file_mut()?;
            return Err(FileError::ReadNonExistingPage {
                page_num: next as i64,
                total_pages: self.total_num_pages,
            });
        }
        self.read_block(next, buffer)
    }

    /// Overwrite an existing page. Never grows the file and never moves the
    /// cursor.
    pub fn write_block(&mut self, page_num: PageNum, buffer: &[u8]) -> FileResult<()> {
        let total_pages = self.total_num_pages;
        let sync = self.options.sync_on_write;
        let file = self.file_mut()?;
        check_page_size(buffer.len())?;

        if page_num >= total_pages {
            return Err(FileError::WriteFailed {
                page_num,
                source: io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("page {page_num} is beyond the last of {total_pages} pages"),
                ),
            });
        }

        file.seek(SeekFrom::Start(page_offset(page_num)))
            .and_then(|_| file.write_all(buffer))
            .map_err(|source| FileError::WriteFailed { page_num, source })?;

        if sync {
            file.sync_data()?;
        }

        trace!("Wrote page {} of {}", page_num, self.file_name.display());
        Ok(())
    }

    /// Overwrite the page under the cursor
    pub fn write_current_block(&mut self, buffer: &[u8]) -> FileResult<()> {
        self.write_block(self.cur_page_pos, buffer)
    }

    /// Append one zeroed page at the end of the file
    pub fn append_empty_block(&mut self) -> FileResult<()> {
        let page_num = self.total_num_pages;
        let sync = self.options.sync_on_write;
        let file = self.file_mut()?;

        let end = file
            .seek(SeekFrom::End(0))
            .map_err(|source| FileError::WriteFailed { page_num, source })?;

        if let Err(source) = file.write_all(&ZERO_PAGE) {
            // Drop whatever part of the page reached the file
            if let Err(err) = file.set_len(end) {
                warn!(
                    "Failed to truncate {} back to {} bytes after a short append: {}",
                    self.file_name.display(),
                    end,
                    err
                );
            }
            return Err(FileError::WriteFailed { page_num, source });
        }

        // The page is on disk now, even if the sync below fails
        self.total_num_pages += 1;
        if sync {
            self.file_mut()?.sync_data()?;
        }

        trace!("Appended page {} to {}", page_num, self.file_name.display());
        Ok(())
    }

    /// Grow the file to at least `number_of_pages` pages.
    ///
    /// Pages are appended one at a time; on failure the pages appended so far
    /// stay in the file.
    pub fn ensure_capacity(&mut self, number_of_pages: usize) -> FileResult<()> {
        self.file_mut()?;

        if self.total_num_pages >= number_of_pages {
            return Ok(());
        }

        debug!(
            "Growing {} from {} to {} pages",
            self.file_name.display(),
            self.total_num_pages,
            number_of_pages
        );

        for _ in self.total_num_pages..number_of_pages {
            self.append_empty_block()?;
        }
        Ok(())
    }

    fn file_mut(&mut self) -> FileResult<&mut File> {
        self.file
            .as_mut()
            .ok_or(FileError::FileHandleNotInitialized)
    }
}

fn check_page_size(len: usize) -> FileResult<()> {
    if len != PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn page_offset(page_num: PageNum) -> u64 {
    page_num as u64 * PAGE_SIZE as u64
}

/// Read until `buffer` is full or the file ends, returning the byte count
fn read_full(file: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
