use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::storage::page::{read_u16, read_u32, write_u16, write_u32, Page, PageId, PAGE_SIZE};

// ┌───────────────────────────────────────────────────────────────────────┐
// │ Offset │ Length │ Description                                         │
// │────────┼────────┼─────────────────────────────────────────────────────│
// │   0    │   19   │ MAGIC_HEADER                                        │
// │   19   │   2    │ PAGE_SIZE (u16 BE)                                  │
// │   21   │   4    │ MAX_PAGE_ID (u32 BE): last allocated page id        │
// │   25   │   4    │ ROOT_PAGE_ID (u32 BE): 0 while the tree is empty    │
// │   29   │   71   │ reserved                                            │
// └───────────────────────────────────────────────────────────────────────┘

pub const MAGIC_HEADER: &[u8; 19] = b"my simpledb format\0";
pub const FILE_HEADER_SIZE: usize = 100;

mod offsets {
    pub const MAGIC: usize = 0;
    pub const PAGE_SIZE: usize = 19;
    pub const MAX_PAGE_ID: usize = 21;
    pub const ROOT_PAGE_ID: usize = 25;
}

/// Decoded form of the 100-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub page_size: u16,
    pub max_page_id: PageId,
    pub root_page_id: PageId,
}

impl FileHeader {
    pub fn new() -> Self {
        FileHeader {
            page_size: PAGE_SIZE as u16,
            max_page_id: 0,
            root_page_id: 0,
        }
    }

    /// Parse a raw header. Returns `None` when the magic or page size do
    /// not match this format.
    pub fn decode(buf: &[u8; FILE_HEADER_SIZE]) -> Option<Self> {
        if &buf[offsets::MAGIC..offsets::MAGIC + MAGIC_HEADER.len()] != MAGIC_HEADER {
            return None;
        }
        let page_size = read_u16(buf, offsets::PAGE_SIZE);
        if page_size as usize != PAGE_SIZE {
            warn!("file header declares page size {}, expected {}", page_size, PAGE_SIZE);
            return None;
        }
        Some(FileHeader {
            page_size,
            max_page_id: read_u32(buf, offsets::MAX_PAGE_ID),
            root_page_id: read_u32(buf, offsets::ROOT_PAGE_ID),
        })
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0; FILE_HEADER_SIZE];
        buf[offsets::MAGIC..offsets::MAGIC + MAGIC_HEADER.len()].copy_from_slice(MAGIC_HEADER);
        write_u16(&mut buf, offsets::PAGE_SIZE, self.page_size);
        write_u32(&mut buf, offsets::MAX_PAGE_ID, self.max_page_id);
        write_u32(&mut buf, offsets::ROOT_PAGE_ID, self.root_page_id);
        buf
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader::new()
    }
}

/// Pager: reads and writes 4 KiB pages of the database file by page id and
/// owns the file header.
///
/// There is no cache. Every read and write goes straight to the file, so a
/// node must be written back before anyone reads its page again.
pub struct Pager {
    file: File,

    /// `None` until `verify` has accepted (or created) the header.
    header: Option<FileHeader>,
}

impl Pager {
    /// Open (or create) the database file at `path`. The header is not read
    /// until `verify`.
    pub fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        Ok(Pager { file, header: None })
    }

    /// Byte offset of page `id`. Ids start at 1, right after the file header.
    pub fn page_offset(id: PageId) -> u64 {
        FILE_HEADER_SIZE as u64 + (id as u64 - 1) * PAGE_SIZE as u64
    }

    /// Check the file header, writing a fresh one if the file is empty.
    pub fn verify(&mut self) -> DbResult<bool> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            debug!("verify: empty file, writing a fresh header");
            let header = FileHeader::new();
            self.header = Some(header);
            self.save_header()?;
            return Ok(true);
        }
        if len < FILE_HEADER_SIZE as u64 {
            warn!("verify: file is {} bytes, shorter than the header", len);
            self.header = None;
            return Ok(false);
        }

        let mut buf = [0; FILE_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut buf)?;
        self.header = FileHeader::decode(&buf);
        if let Some(header) = &self.header {
            debug!(
                "verify: max_page_id={} root_page_id={}",
                header.max_page_id, header.root_page_id
            );
        }
        Ok(self.header.is_some())
    }

    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    fn header_mut(&mut self) -> DbResult<&mut FileHeader> {
        self.header.as_mut().ok_or(DbError::HeaderNotInitialized)
    }

    pub fn max_page_id(&self) -> DbResult<PageId> {
        self.header.map(|h| h.max_page_id).ok_or(DbError::HeaderNotInitialized)
    }

    pub fn root_page_id(&self) -> DbResult<Option<PageId>> {
        let header = self.header.ok_or(DbError::HeaderNotInitialized)?;
        Ok((header.root_page_id != 0).then_some(header.root_page_id))
    }

    fn save_header(&mut self) -> DbResult<()> {
        let header = self.header.ok_or(DbError::HeaderNotInitialized)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        self.file.flush()?;
        Ok(())
    }

    /// Allocate a fresh `EMPTY` page at the end of the file and persist the
    /// bumped page counter.
    pub fn allocate_page(&mut self) -> DbResult<(PageId, Page)> {
        let header = self.header_mut()?;
        header.max_page_id += 1;
        let id = header.max_page_id;
        self.save_header()?;

        let page = Page::new();
        self.write_page(id, &page)?;
        debug!("allocate_page: page {}", id);
        Ok((id, page))
    }

    fn check_id(&self, id: PageId) -> DbResult<()> {
        let max = self.max_page_id()?;
        if id == 0 || id > max {
            return Err(DbError::InvalidPageId(id));
        }
        Ok(())
    }

    pub fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        self.check_id(id)?;
        let mut page = Page::zeroed();
        self.file.seek(SeekFrom::Start(Pager::page_offset(id)))?;
        self.file.read_exact(&mut page.data[..])?;
        Ok(page)
    }

    pub fn write_page(&mut self, id: PageId, page: &Page) -> DbResult<()> {
        self.check_id(id)?;
        self.file.seek(SeekFrom::Start(Pager::page_offset(id)))?;
        self.file.write_all(&page.data[..])?;
        self.file.flush()?;
        Ok(())
    }

    /// The root page and its contents, or `None` while the tree is empty.
    pub fn read_root(&mut self) -> DbResult<Option<(PageId, Page)>> {
        match self.root_page_id()? {
            Some(id) => Ok(Some((id, self.read_page(id)?))),
            None => Ok(None),
        }
    }

    /// Write `page` and point the header's root at it.
    pub fn set_root(&mut self, id: PageId, page: &Page) -> DbResult<()> {
        self.write_page(id, page)?;
        let header = self.header_mut()?;
        if header.root_page_id != id {
            debug!("set_root: root {} -> {}", header.root_page_id, id);
            header.root_page_id = id;
            self.save_header()?;
        }
        Ok(())
    }
}
