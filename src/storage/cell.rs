// ┌───────────────────────────────────────────────────────────────────────┐
// │ PointerCell (internal nodes)                                          │
// │────────┬────────┬─────────────────────────────────────────────────────│
// │   0    │   4    │ KEY_SIZE (u32 BE)                                   │
// │   4    │   4    │ CHILD_PAGE_ID (u32 BE)                              │
// │   8    │   N    │ KEY bytes                                           │
// ├───────────────────────────────────────────────────────────────────────┤
// │ KeyValueCell (leaf nodes)                                             │
// │────────┬────────┬─────────────────────────────────────────────────────│
// │   0    │   4    │ KEY_SIZE (u32 BE)                                   │
// │   4    │   4    │ VALUE_SIZE (u32 BE)                                 │
// │   8    │   N    │ KEY bytes                                           │
// │  8+N   │   M    │ VALUE bytes                                         │
// └───────────────────────────────────────────────────────────────────────┘

use crate::error::{DbError, DbResult};
use crate::storage::page::{read_u32, write_u32, PageId, PageType};

pub const CELL_HEADER_SIZE: usize = 8;

/// One record inside a node. Which variant a page holds is decided by its
/// page type, never by the bytes of the cell itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Pointer { key: Vec<u8>, child: PageId },
    KeyValue { key: Vec<u8>, value: Vec<u8> },
}

impl Cell {
    pub fn pointer(key: &[u8], child: PageId) -> Self {
        Cell::Pointer { key: key.to_vec(), child }
    }

    pub fn key_value(key: &[u8], value: &[u8]) -> Self {
        Cell::KeyValue { key: key.to_vec(), value: value.to_vec() }
    }

    pub fn pointer_size(key_len: usize) -> usize {
        CELL_HEADER_SIZE + key_len
    }

    pub fn key_value_size(key_len: usize, value_len: usize) -> usize {
        CELL_HEADER_SIZE + key_len + value_len
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Cell::Pointer { key, .. } | Cell::KeyValue { key, .. } => key,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Cell::Pointer { key, .. } => Cell::pointer_size(key.len()),
            Cell::KeyValue { key, value } => Cell::key_value_size(key.len(), value.len()),
        }
    }

    /// The node type a cell of this kind lives in.
    pub fn page_type(&self) -> PageType {
        match self {
            Cell::Pointer { .. } => PageType::Internal,
            Cell::KeyValue { .. } => PageType::Leaf,
        }
    }

    pub fn child(&self) -> Option<PageId> {
        match self {
            Cell::Pointer { child, .. } => Some(*child),
            Cell::KeyValue { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Cell::KeyValue { value, .. } => Some(value),
            Cell::Pointer { .. } => None,
        }
    }

    /// Serialize into `buf`, which must be exactly `self.size()` bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), self.size());
        match self {
            Cell::Pointer { key, child } => {
                write_u32(buf, 0, key.len() as u32);
                write_u32(buf, 4, *child);
                buf[CELL_HEADER_SIZE..].copy_from_slice(key);
            }
            Cell::KeyValue { key, value } => {
                write_u32(buf, 0, key.len() as u32);
                write_u32(buf, 4, value.len() as u32);
                let value_start = CELL_HEADER_SIZE + key.len();
                buf[CELL_HEADER_SIZE..value_start].copy_from_slice(key);
                buf[value_start..].copy_from_slice(value);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0; self.size()];
        self.write_to(&mut buf);
        buf
    }

    /// Byte length of the cell starting at the front of `bytes`.
    pub fn encoded_len(page_type: PageType, bytes: &[u8]) -> Option<usize> {
        if bytes.len() < CELL_HEADER_SIZE {
            return None;
        }
        let key_size = read_u32(bytes, 0) as usize;
        let len = match page_type {
            PageType::Internal => Cell::pointer_size(key_size),
            PageType::Leaf => Cell::key_value_size(key_size, read_u32(bytes, 4) as usize),
            PageType::Empty => return None,
        };
        (len <= bytes.len()).then_some(len)
    }

    /// Borrow the key of the cell starting at the front of `bytes`.
    pub fn key_slice(page_type: PageType, bytes: &[u8]) -> Option<&[u8]> {
        Cell::encoded_len(page_type, bytes)?;
        let key_size = read_u32(bytes, 0) as usize;
        bytes.get(CELL_HEADER_SIZE..CELL_HEADER_SIZE + key_size)
    }

    /// Decode the cell at the front of `bytes` for a node of `page_type`.
    pub fn decode(page_id: PageId, page_type: PageType, bytes: &[u8]) -> DbResult<Cell> {
        let len = Cell::encoded_len(page_type, bytes)
            .ok_or_else(|| DbError::corrupt(page_id, "cell runs past the end of the page"))?;
        let key_size = read_u32(bytes, 0) as usize;
        let key = bytes[CELL_HEADER_SIZE..CELL_HEADER_SIZE + key_size].to_vec();
        Ok(match page_type {
            PageType::Internal => Cell::Pointer { key, child: read_u32(bytes, 4) },
            _ => Cell::KeyValue {
                key,
                value: bytes[CELL_HEADER_SIZE + key_size..len].to_vec(),
            },
        })
    }
}
