// ┌─────────────────────────────────────────────────────────────────────────┐
// │ Offset │ Length │ Description                                           │
// │────────┼────────┼───────────────────────────────────────────────────────│
// │   0    │   1    │ PAGE_TYPE (0x00 = empty, 0x0d = leaf, 0x05 = internal)│
// │   1    │   2    │ FREE_START (u16 BE): just past the last pointer slot  │
// │   3    │   2    │ CELL_AREA_START (u16 BE): first byte of packed cells  │
// │   5    │   3    │ reserved                                              │
// │────────┼────────┼───────────────────────────────────────────────────────│
// │   8    │  2 * n │ Cell pointers (u16 BE offsets, sorted by cell key)    │
// │   ..   │   ..   │ Free space                                            │
// │ CELL_AREA_START .. PAGE_SIZE │ Cells, packed backward from the end    │
// └─────────────────────────────────────────────────────────────────────────┘

use crate::error::{DbError, DbResult};

pub type PageId = u32;

pub const PAGE_SIZE: usize = 4096;

pub const PAGE_TYPE_OFFSET: usize       = 0;   // 1 byte
pub const FREE_START_OFFSET: usize      = 1;   // 2 bytes (u16)
pub const CELL_AREA_START_OFFSET: usize = 3;   // 2 bytes (u16)
pub const PAGE_HEADER_SIZE: usize       = 8;   // total header length

pub const CELL_POINTER_SIZE: usize = 2;

/// Bytes available to pointers and cells on a fresh page.
pub const PAGE_CAPACITY: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Empty = 0x00,
    Internal = 0x05,
    Leaf = 0x0d,
}

impl PageType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(PageType::Empty),
            0x05 => Some(PageType::Internal),
            0x0d => Some(PageType::Leaf),
            _ => None,
        }
    }
}

/// Decoded form of the 8-byte node header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub free_start: u16,
    pub cell_area_start: u16,
}

impl PageHeader {
    pub fn empty() -> Self {
        PageHeader {
            page_type: PageType::Empty,
            free_start: PAGE_HEADER_SIZE as u16,
            cell_area_start: PAGE_SIZE as u16,
        }
    }

    /// Parse and validate the header stored at the start of `data`.
    pub fn decode(page_id: PageId, data: &[u8; PAGE_SIZE]) -> DbResult<Self> {
        let code = data[PAGE_TYPE_OFFSET];
        let page_type = PageType::from_code(code)
            .ok_or_else(|| DbError::corrupt(page_id, format!("unknown page type {:#04x}", code)))?;
        let free_start = read_u16(data, FREE_START_OFFSET);
        let cell_area_start = read_u16(data, CELL_AREA_START_OFFSET);

        let free = free_start as usize;
        let cells = cell_area_start as usize;
        if free < PAGE_HEADER_SIZE || (free - PAGE_HEADER_SIZE) % CELL_POINTER_SIZE != 0 {
            return Err(DbError::corrupt(page_id, format!("bad free_start {}", free)));
        }
        if cells > PAGE_SIZE || cells < free {
            return Err(DbError::corrupt(
                page_id,
                format!("cell_area_start {} outside [{}, {}]", cells, free, PAGE_SIZE),
            ));
        }

        Ok(PageHeader { page_type, free_start, cell_area_start })
    }

    pub fn encode(&self, data: &mut [u8; PAGE_SIZE]) {
        data[PAGE_TYPE_OFFSET] = self.page_type as u8;
        write_u16(data, FREE_START_OFFSET, self.free_start);
        write_u16(data, CELL_AREA_START_OFFSET, self.cell_area_start);
    }

    /// Gap between the pointer array and the cell area.
    pub fn free_space(&self) -> usize {
        (self.cell_area_start - self.free_start) as usize
    }

    pub fn pointer_count(&self) -> usize {
        (self.free_start as usize - PAGE_HEADER_SIZE) / CELL_POINTER_SIZE
    }
}

/// A single 4 KiB page of data.
#[derive(Clone)]
pub struct Page {
    pub data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// An all-zero buffer, the shape `read_exact` fills in.
    pub fn zeroed() -> Self {
        Page { data: Box::new([0; PAGE_SIZE]) }
    }

    /// A zeroed page tagged `EMPTY` with a fresh header.
    pub fn new() -> Self {
        let mut page = Page::zeroed();
        PageHeader::empty().encode(&mut page.data);
        page
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}
