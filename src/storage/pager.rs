use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::page::PAGE_SIZE;

/// Hard cap on the tree size: at most this many pages are ever resident or
/// allocated.
pub const TABLE_MAX_PAGES: usize = 100;

/// A single 4 KiB page of data.
pub struct Page {
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    fn new() -> Self {
        Page { data: [0; PAGE_SIZE] }
    }
}

/// Pager: manages reading/writing fixed-size pages from/into the database
/// file, keeping every touched page cached until close. Allocation is strictly
/// append; pages are never recycled.
pub struct Pager {
    file: File,
    /// Length of the file in bytes when it was opened. Pages past this point
    /// are fresh allocations and never read from disk.
    file_length: u64,
    /// Highest page index ever touched, plus one.
    num_pages: u32,
    /// `pages[page_num] = Some(..)` once that page has been faulted in.
    pages: Vec<Option<Box<Page>>>,
}

impl Pager {
    /// Open (or create, with user-only permissions) the database file.
    /// `num_pages` starts at the number of pages on disk, so an empty file
    /// yields zero.
    pub fn open(filename: &str) -> DbResult<Pager> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(filename)?;
        let file_length = file.metadata()?.len();
        let num_pages = file_length.div_ceil(PAGE_SIZE as u64) as u32;

        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: Vec::new(),
        })
    }

    /// Number of pages the pager knows about (on disk plus newly allocated).
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Fetch a page, faulting it in on first access: read from disk if it
    /// existed when the file was opened, otherwise start zeroed. Touching a
    /// page at or past `num_pages` extends the page count.
    pub fn get_page(&mut self, page_num: u32) -> DbResult<&mut Page> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(DbError::PageOutOfBounds {
                page: page_num,
                max: TABLE_MAX_PAGES as u32,
            });
        }

        if self.pages.len() <= page_num as usize {
            self.pages.resize_with(page_num as usize + 1, || None);
        }

        if self.pages[page_num as usize].is_none() {
            let mut page = Box::new(Page::new());

            let full_pages = self.file_length / PAGE_SIZE as u64;
            let tail = (self.file_length % PAGE_SIZE as u64) as usize;
            if (page_num as u64) < full_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut page.data)?;
            } else if page_num as u64 == full_pages && tail > 0 {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut page.data[..tail])?;
            }

            self.pages[page_num as usize] = Some(page);
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        // Safe to unwrap: a page was just inserted if the slot was empty.
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// Next page number to allocate. The caller materializes it with
    /// `get_page`. Refuses allocation once the page cap is reached.
    pub fn get_unused_page_num(&self) -> DbResult<u32> {
        if self.num_pages as usize >= TABLE_MAX_PAGES {
            return Err(DbError::TableFull);
        }
        Ok(self.num_pages)
    }

    /// Write the cached page back to disk. Always writes a whole page.
    pub fn flush_page(&mut self, page_num: u32) -> DbResult<()> {
        if let Some(page) = self.pages.get(page_num as usize).and_then(Option::as_ref) {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.write_all(&page.data)?;
        }
        Ok(())
    }

    /// Flush every resident page and sync the file.
    pub fn flush_all(&mut self) -> DbResult<()> {
        for page_num in 0..self.num_pages {
            self.flush_page(page_num)?;
        }
        self.file.sync_all()?;
        debug!("flushed {} pages", self.num_pages);
        Ok(())
    }
}
