use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::cell::Cell;
use crate::storage::page::{
    read_u16, write_u16, Page, PageHeader, PageId, PageType, CELL_POINTER_SIZE, PAGE_CAPACITY,
    PAGE_HEADER_SIZE, PAGE_SIZE,
};

/// Where a descent goes next from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Follow the pointer into this child page.
    Child(PageId),
    /// The current node is the leaf that owns the key.
    Leaf,
}

/// A B-tree node: one page buffer plus its decoded header.
///
/// The node never touches the file. Callers read it through the pager, mutate
/// it here, and hand `page()` back to the pager to persist it.
///
/// Internal nodes hold `Cell::Pointer` separators. The child of the cell with
/// the greatest key ≤ the search key owns that key; keys below every
/// separator go to the first child, and the last cell's child catches every
/// key past the final separator.
pub struct BTreeNode {
    id: PageId,
    header: PageHeader,
    page: Page,
}

impl BTreeNode {
    pub fn from_page(id: PageId, page: Page) -> DbResult<Self> {
        let header = PageHeader::decode(id, &page.data)?;
        Ok(BTreeNode { id, header, page })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn header(&self) -> PageHeader {
        self.header
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn is_empty(&self) -> bool {
        self.header.page_type == PageType::Empty
    }

    pub fn is_leaf(&self) -> bool {
        self.header.page_type == PageType::Leaf
    }

    pub fn is_internal(&self) -> bool {
        self.header.page_type == PageType::Internal
    }

    pub fn key_count(&self) -> usize {
        self.header.pointer_count()
    }

    fn sync_header(&mut self) {
        self.header.encode(&mut self.page.data);
    }

    fn cell_offsets(&self) -> Vec<u16> {
        (0..self.key_count())
            .map(|i| read_u16(&self.page.data[..], PAGE_HEADER_SIZE + i * CELL_POINTER_SIZE))
            .collect()
    }

    fn write_cell_offsets(&mut self, offsets: &[u16]) {
        for (i, offset) in offsets.iter().enumerate() {
            write_u16(&mut self.page.data[..], PAGE_HEADER_SIZE + i * CELL_POINTER_SIZE, *offset);
        }
        self.header.free_start = (PAGE_HEADER_SIZE + offsets.len() * CELL_POINTER_SIZE) as u16;
    }

    fn cell_bytes(&self, offset: u16) -> DbResult<&[u8]> {
        let start = offset as usize;
        if start < self.header.cell_area_start as usize || start >= PAGE_SIZE {
            return Err(DbError::corrupt(
                self.id,
                format!("cell pointer {} outside the cell area", start),
            ));
        }
        Ok(&self.page.data[start..])
    }

    fn key_at_offset(&self, offset: u16) -> DbResult<&[u8]> {
        let bytes = self.cell_bytes(offset)?;
        Cell::key_slice(self.header.page_type, bytes)
            .ok_or_else(|| DbError::corrupt(self.id, format!("malformed cell at {}", offset)))
    }

    fn cell_at_offset(&self, offset: u16) -> DbResult<Cell> {
        Cell::decode(self.id, self.header.page_type, self.cell_bytes(offset)?)
    }

    /// Index of the first cell whose key is strictly greater than `key`, or
    /// `offsets.len()` when no such cell exists.
    fn upper_bound(&self, offsets: &[u16], key: &[u8]) -> DbResult<usize> {
        let (mut lo, mut hi) = (0, offsets.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at_offset(offsets[mid])? <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    pub fn key_at(&self, index: usize) -> DbResult<Option<&[u8]>> {
        if index >= self.key_count() {
            return Ok(None);
        }
        let offset = read_u16(&self.page.data[..], PAGE_HEADER_SIZE + index * CELL_POINTER_SIZE);
        self.key_at_offset(offset).map(Some)
    }

    pub fn cell_at(&self, index: usize) -> DbResult<Option<Cell>> {
        if index >= self.key_count() {
            return Ok(None);
        }
        let offset = read_u16(&self.page.data[..], PAGE_HEADER_SIZE + index * CELL_POINTER_SIZE);
        self.cell_at_offset(offset).map(Some)
    }

    pub fn first_key(&self) -> DbResult<Option<&[u8]>> {
        self.key_at(0)
    }

    pub fn last_key(&self) -> DbResult<Option<&[u8]>> {
        match self.key_count() {
            0 => Ok(None),
            n => self.key_at(n - 1),
        }
    }

    /// All keys in pointer order, which is ascending byte order.
    pub fn keys(&self) -> DbResult<Vec<Vec<u8>>> {
        self.cell_offsets()
            .into_iter()
            .map(|offset| self.key_at_offset(offset).map(<[u8]>::to_vec))
            .collect()
    }

    pub fn cells(&self) -> DbResult<Vec<Cell>> {
        self.cell_offsets()
            .into_iter()
            .map(|offset| self.cell_at_offset(offset))
            .collect()
    }

    /// Bytes the live cells and their pointers would occupy after compaction.
    pub fn live_size(&self) -> DbResult<usize> {
        let mut total = 0;
        for offset in self.cell_offsets() {
            let bytes = self.cell_bytes(offset)?;
            let len = Cell::encoded_len(self.header.page_type, bytes)
                .ok_or_else(|| DbError::corrupt(self.id, format!("malformed cell at {}", offset)))?;
            total += len + CELL_POINTER_SIZE;
        }
        Ok(total)
    }

    pub fn find_subtree_or_leaf(&self, key: &[u8]) -> DbResult<Route> {
        if !self.is_internal() {
            // Leaf, or the freshly allocated root that has no cells yet.
            return Ok(Route::Leaf);
        }

        let offsets = self.cell_offsets();
        if offsets.is_empty() {
            return Err(DbError::corrupt(self.id, "internal node without separators"));
        }
        // First separator greater than the key; step back one to the cell
        // that covers it. Past the end lands on the last cell, before the
        // start clamps to the first.
        let index = self.upper_bound(&offsets, key)?.saturating_sub(1);
        match self.cell_at_offset(offsets[index])? {
            Cell::Pointer { child, .. } => Ok(Route::Child(child)),
            Cell::KeyValue { .. } => Err(DbError::corrupt(self.id, "key/value cell in internal node")),
        }
    }

    pub fn find_key_value_cell(&self, key: &[u8]) -> DbResult<Option<Cell>> {
        if !self.is_leaf() {
            return Ok(None);
        }
        let offsets = self.cell_offsets();
        let index = self.upper_bound(&offsets, key)?;
        if index == 0 {
            return Ok(None);
        }
        let offset = offsets[index - 1];
        if self.key_at_offset(offset)? != key {
            return Ok(None);
        }
        self.cell_at_offset(offset).map(Some)
    }

    fn has_room(&self, cell_size: usize) -> bool {
        self.header.free_space() >= cell_size + CELL_POINTER_SIZE
    }

    /// Whether a new cell fits in the current gap. `None` for `value` asks
    /// about a pointer cell.
    pub fn can_hold(&self, key: &[u8], value: Option<&[u8]>) -> bool {
        let size = match value {
            Some(value) => Cell::key_value_size(key.len(), value.len()),
            None => Cell::pointer_size(key.len()),
        };
        self.has_room(size)
    }

    pub fn insert_key_value_cell(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.insert_cell(&Cell::key_value(key, value))
    }

    pub fn insert_pointer_cell(&mut self, key: &[u8], child: PageId) -> DbResult<()> {
        self.insert_cell(&Cell::pointer(key, child))
    }

    /// Write `cell` below the cell area and slot its pointer in key order.
    ///
    /// An equal key replaces the existing pointer; the old bytes stay behind
    /// until the page is compacted. An `EMPTY` node takes on the cell's type.
    pub fn insert_cell(&mut self, cell: &Cell) -> DbResult<()> {
        let cell_type = cell.page_type();
        if !self.is_empty() && self.header.page_type != cell_type {
            return Err(DbError::corrupt(
                self.id,
                format!("cannot store a {:?} cell in a {:?} node", cell_type, self.header.page_type),
            ));
        }
        let size = cell.size();
        if !self.has_room(size) {
            return Err(DbError::PageFull { page: self.id, size });
        }
        self.header.page_type = cell_type;

        let mut offsets = self.cell_offsets();
        let index = self.upper_bound(&offsets, cell.key())?;
        let replaces = index > 0 && self.key_at_offset(offsets[index - 1])? == cell.key();

        let start = self.header.cell_area_start as usize - size;
        cell.write_to(&mut self.page.data[start..start + size]);
        if replaces {
            offsets[index - 1] = start as u16;
        } else {
            offsets.insert(index, start as u16);
        }
        self.header.cell_area_start = start as u16;
        self.write_cell_offsets(&offsets);
        self.sync_header();
        Ok(())
    }

    /// Live cells minus any cell with exactly `key`, which an insert of
    /// that key would replace.
    fn cells_without(&self, key: &[u8]) -> DbResult<Vec<Cell>> {
        let mut cells = self.cells()?;
        cells.retain(|cell| cell.key() != key);
        Ok(cells)
    }

    /// Whether rewriting the live cells would leave room for `cell`. A cell
    /// that `cell` replaces does not count.
    pub fn fits_after_compaction(&self, cell: &Cell) -> DbResult<bool> {
        let cells = self.cells_without(cell.key())?;
        Ok(footprint(&cells) + cell.size() + CELL_POINTER_SIZE <= PAGE_CAPACITY)
    }

    /// Repack the live cells, dropping the one `cell` replaces, then insert
    /// `cell`.
    pub fn compact_and_insert(&mut self, cell: &Cell) -> DbResult<()> {
        let cells = self.cells_without(cell.key())?;
        debug!("compact_and_insert: page {} repacking {} cells", self.id, cells.len());
        self.rebuild(&cells)?;
        self.insert_cell(cell)
    }

    /// Clear the page and repack `cells` (already in key order) from the end.
    fn rebuild(&mut self, cells: &[Cell]) -> DbResult<()> {
        let page_type = self.header.page_type;
        self.page.data.fill(0);
        self.header = PageHeader { page_type, ..PageHeader::empty() };
        self.sync_header();
        for cell in cells {
            self.insert_cell(cell)?;
        }
        Ok(())
    }

    /// Lower the separator routing to `child` to `first_key`, the child's
    /// current smallest key, when it sits above it.
    ///
    /// Only the first separator can go stale this way: it is the one that
    /// catches keys below every separator. If the full key does not fit, the
    /// longest prefix of it no longer than the old separator is used instead.
    /// Returns whether anything changed.
    pub fn lower_separator(&mut self, child: PageId, first_key: &[u8]) -> DbResult<bool> {
        let mut cells = self.cells()?;
        let Some(index) = cells.iter().position(|cell| cell.child() == Some(child)) else {
            return Err(DbError::corrupt(self.id, format!("no separator for child page {}", child)));
        };
        let current = cells[index].key().to_vec();
        if current.as_slice() <= first_key {
            return Ok(false);
        }
        if index != 0 {
            return Err(DbError::corrupt(
                self.id,
                format!("separator for page {} is above its first key", child),
            ));
        }
        cells[0] = Cell::pointer(first_key, child);
        if footprint(&cells) > PAGE_CAPACITY {
            let keep = first_key.len().min(current.len());
            cells[0] = Cell::pointer(&first_key[..keep], child);
        }
        debug!(
            "lower_separator: page {} child {} separator lowered to {} bytes",
            self.id,
            child,
            cells[0].key().len()
        );
        self.rebuild(&cells)?;
        Ok(true)
    }

    /// Index at which `split_and_insert` would divide this node for
    /// `pending`, or `None` when no two-way split can place it.
    pub fn split_point(&self, pending: &Cell) -> DbResult<Option<usize>> {
        Ok(choose_split(&self.cells_without(pending.key())?, pending))
    }

    /// Index at which `split_before` would divide this node at `key`, or
    /// `None` when one side would be left empty.
    pub fn split_point_before(&self, key: &[u8]) -> DbResult<Option<usize>> {
        let cells = self.cells()?;
        let mid = cells.iter().position(|cell| cell.key() >= key).unwrap_or(cells.len());
        Ok((mid > 0 && mid < cells.len()).then_some(mid))
    }

    /// Move the later cells into the empty `sibling`, repack what stays,
    /// then place `pending` on whichever side its key belongs to. A cell
    /// with the same key as `pending` is dropped.
    ///
    /// The split point starts at the middle and only moves away from it
    /// when large cells would leave one side empty or over a page.
    pub fn split_and_insert(&mut self, sibling: &mut BTreeNode, pending: &Cell) -> DbResult<()> {
        let cells = self.cells_without(pending.key())?;
        let mid = choose_split(&cells, pending)
            .ok_or(DbError::PageFull { page: self.id, size: pending.size() })?;
        self.split_off(sibling, &cells, mid)?;

        if goes_left(&cells, mid, pending) {
            self.insert_cell(pending)
        } else {
            sibling.insert_cell(pending)
        }
    }

    /// Split without inserting: cells from `key` up move into `sibling`.
    pub fn split_before(&mut self, sibling: &mut BTreeNode, key: &[u8]) -> DbResult<()> {
        let mid = self
            .split_point_before(key)?
            .ok_or_else(|| DbError::corrupt(self.id, "split before a key that leaves a side empty"))?;
        let cells = self.cells()?;
        self.split_off(sibling, &cells, mid)
    }

    fn split_off(&mut self, sibling: &mut BTreeNode, cells: &[Cell], mid: usize) -> DbResult<()> {
        if !sibling.is_empty() || sibling.key_count() != 0 {
            return Err(DbError::corrupt(sibling.id, "split target is not an empty page"));
        }
        let (keep, moved) = cells.split_at(mid);
        debug!(
            "split_off: page {} keeps {} cells, page {} takes {}",
            self.id,
            keep.len(),
            sibling.id,
            moved.len()
        );

        sibling.header.page_type = self.header.page_type;
        sibling.sync_header();
        for cell in moved {
            sibling.insert_cell(cell)?;
        }
        self.rebuild(keep)
    }
}

/// Bytes `cells` and their pointers take on a page.
fn footprint(cells: &[Cell]) -> usize {
    cells.iter().map(|c| c.size() + CELL_POINTER_SIZE).sum()
}

/// Whether `pending` joins `cells[..mid]` when a node splits at `mid`: it
/// does unless its key reaches the first moved key.
fn goes_left(cells: &[Cell], mid: usize, pending: &Cell) -> bool {
    match cells.get(mid) {
        Some(first_moved) => pending.key() < first_moved.key(),
        None => cells.last().is_some_and(|last| pending.key() <= last.key()),
    }
}

/// Split index nearest the middle that leaves both nodes non-empty and
/// within a page once `pending` is placed.
fn choose_split(cells: &[Cell], pending: &Cell) -> Option<usize> {
    let pending_size = pending.size() + CELL_POINTER_SIZE;
    let fits = |mid: usize| {
        let (left, right) = cells.split_at(mid);
        let (mut left_size, mut right_size) = (footprint(left), footprint(right));
        let (mut left_len, mut right_len) = (left.len(), right.len());
        if goes_left(cells, mid, pending) {
            left_size += pending_size;
            left_len += 1;
        } else {
            right_size += pending_size;
            right_len += 1;
        }
        left_len > 0 && right_len > 0 && left_size <= PAGE_CAPACITY && right_size <= PAGE_CAPACITY
    };

    let n = cells.len();
    let half = n / 2;
    (0..=n)
        .flat_map(|d| [half.checked_sub(d), Some(half + d)])
        .flatten()
        .filter(|&mid| mid <= n)
        .find(|&mid| fits(mid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_node(id: PageId) -> BTreeNode {
        BTreeNode::from_page(id, Page::new()).unwrap()
    }

    fn key_string(node: &BTreeNode) -> String {
        node.keys()
            .unwrap()
            .into_iter()
            .map(|k| String::from_utf8(k).unwrap())
            .collect()
    }

    #[test]
    fn single_key_value_cell() {
        let mut node = empty_node(1);
        assert!(node.is_empty());
        node.insert_key_value_cell(b"a", b"1").unwrap();

        let size = Cell::key_value_size(1, 1);
        assert!(node.is_leaf());
        assert!(!node.is_internal());
        assert_eq!(node.header().free_start, 10);
        assert_eq!(node.header().cell_area_start as usize, PAGE_SIZE - size);
        assert_eq!(node.key_count(), 1);
        assert_eq!(node.first_key().unwrap(), Some(&b"a"[..]));
        assert_eq!(node.last_key().unwrap(), Some(&b"a"[..]));
    }

    #[test]
    fn cells_stay_sorted_whatever_the_insert_order() {
        let mut node = empty_node(1);
        for c in ["e", "d", "b", "a", "c"] {
            node.insert_key_value_cell(c.as_bytes(), b"v").unwrap();
        }
        let size = Cell::key_value_size(1, 1);
        assert_eq!(node.header().free_start, 18);
        assert_eq!(node.header().cell_area_start as usize, PAGE_SIZE - size * 5);
        assert_eq!(key_string(&node), "abcde");
        assert_eq!(node.key_at(4).unwrap(), Some(&b"e"[..]));
        assert_eq!(node.key_at(5).unwrap(), None);
    }

    #[test]
    fn upsert_keeps_one_cell_with_latest_value() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"k", b"old").unwrap();
        node.insert_key_value_cell(b"j", b"x").unwrap();
        node.insert_key_value_cell(b"k", b"new").unwrap();

        assert_eq!(node.key_count(), 2);
        assert_eq!(node.header().free_start, 12);
        let cell = node.find_key_value_cell(b"k").unwrap().unwrap();
        assert_eq!(cell.value(), Some(&b"new"[..]));
        assert!(node.find_key_value_cell(b"z").unwrap().is_none());
        assert!(node.find_key_value_cell(b"a").unwrap().is_none());
    }

    #[test]
    fn compaction_reclaims_replaced_cells() {
        let mut node = empty_node(1);
        let value = vec![7u8; 1000];
        for _ in 0..4 {
            node.insert_key_value_cell(b"k", &value).unwrap();
        }
        let pending = Cell::key_value(b"k", &value);
        assert!(!node.can_hold(b"k", Some(&value)));
        assert!(node.fits_after_compaction(&pending).unwrap());

        node.compact_and_insert(&pending).unwrap();
        assert_eq!(node.key_count(), 1);
        assert_eq!(node.live_size().unwrap(), Cell::key_value_size(1, 1000) + 2);
        assert_eq!(node.header().free_space(), PAGE_CAPACITY - node.live_size().unwrap());
    }

    #[test]
    fn grown_value_only_needs_room_beside_the_other_cells() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"a", &[1u8; 2000]).unwrap();
        node.insert_key_value_cell(b"b", &[2u8; 1000]).unwrap();

        let grown = Cell::key_value(b"a", &[3u8; 2500]);
        assert!(!node.can_hold(b"a", Some(&[3u8; 2500])));
        assert!(node.fits_after_compaction(&grown).unwrap());
        node.compact_and_insert(&grown).unwrap();

        assert_eq!(key_string(&node), "ab");
        let cell = node.find_key_value_cell(b"a").unwrap().unwrap();
        assert_eq!(cell.value(), Some(&[3u8; 2500][..]));
        assert_eq!(node.find_key_value_cell(b"b").unwrap().unwrap().value(), Some(&[2u8; 1000][..]));

        let too_big = Cell::key_value(b"a", &[3u8; 3200]);
        assert!(!node.fits_after_compaction(&too_big).unwrap());
    }

    #[test]
    fn routes_through_separators() {
        let mut node = empty_node(1);
        node.insert_pointer_cell(b"b", 10).unwrap();
        node.insert_pointer_cell(b"d", 20).unwrap();
        node.insert_pointer_cell(b"f", 30).unwrap();
        assert!(node.is_internal());

        assert_eq!(node.find_subtree_or_leaf(b"a").unwrap(), Route::Child(10));
        assert_eq!(node.find_subtree_or_leaf(b"b").unwrap(), Route::Child(10));
        assert_eq!(node.find_subtree_or_leaf(b"c").unwrap(), Route::Child(10));
        assert_eq!(node.find_subtree_or_leaf(b"d").unwrap(), Route::Child(20));
        assert_eq!(node.find_subtree_or_leaf(b"e").unwrap(), Route::Child(20));
        assert_eq!(node.find_subtree_or_leaf(b"f").unwrap(), Route::Child(30));
        assert_eq!(node.find_subtree_or_leaf(b"zzz").unwrap(), Route::Child(30));
        assert!(node.find_key_value_cell(b"b").unwrap().is_none());
    }

    #[test]
    fn leaf_and_empty_nodes_route_to_themselves() {
        let mut node = empty_node(1);
        assert_eq!(node.find_subtree_or_leaf(b"x").unwrap(), Route::Leaf);
        node.insert_key_value_cell(b"x", b"1").unwrap();
        assert_eq!(node.find_subtree_or_leaf(b"x").unwrap(), Route::Leaf);
    }

    #[test]
    fn equal_separator_replaces_child() {
        let mut node = empty_node(1);
        node.insert_pointer_cell(b"m", 4).unwrap();
        node.insert_pointer_cell(b"m", 9).unwrap();
        assert_eq!(node.key_count(), 1);
        assert_eq!(node.find_subtree_or_leaf(b"m").unwrap(), Route::Child(9));
    }

    #[test]
    fn rejects_mismatched_cell_kind() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"a", b"1").unwrap();
        assert!(node.insert_pointer_cell(b"b", 2).is_err());
        assert_eq!(node.key_count(), 1);
    }

    #[test]
    fn full_node_reports_page_full() {
        let mut node = empty_node(1);
        let value = vec![0u8; 2000];
        node.insert_key_value_cell(b"a", &value).unwrap();
        node.insert_key_value_cell(b"b", &value).unwrap();
        assert!(!node.can_hold(b"c", Some(&value)));
        assert!(matches!(
            node.insert_key_value_cell(b"c", &value),
            Err(DbError::PageFull { page: 1, .. })
        ));
    }

    #[test]
    fn split_moves_later_half_and_places_pending() {
        let mut node = empty_node(1);
        for c in ["a", "b", "c", "d"] {
            node.insert_key_value_cell(c.as_bytes(), b"v").unwrap();
        }
        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &Cell::key_value(b"bb", b"w")).unwrap();

        assert_eq!(key_string(&node), "abbb");
        assert_eq!(key_string(&sibling), "cd");
        assert!(sibling.is_leaf());
        assert_eq!(node.live_size().unwrap(), 3 * (Cell::key_value_size(1, 1) + 2) + 1);

        let mut right = empty_node(3);
        sibling.split_and_insert(&mut right, &Cell::key_value(b"e", b"w")).unwrap();
        assert_eq!(key_string(&sibling), "c");
        assert_eq!(key_string(&right), "de");
    }

    #[test]
    fn split_of_single_cell_keeps_both_sides_populated() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"m", &[1u8; 3000]).unwrap();

        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &Cell::key_value(b"z", &[2u8; 3000])).unwrap();
        assert_eq!(key_string(&node), "m");
        assert_eq!(key_string(&sibling), "z");

        let mut node = empty_node(1);
        node.insert_key_value_cell(b"m", &[1u8; 3000]).unwrap();
        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &Cell::key_value(b"a", &[2u8; 3000])).unwrap();
        assert_eq!(key_string(&node), "a");
        assert_eq!(key_string(&sibling), "m");
    }

    #[test]
    fn split_point_moves_off_the_middle_for_large_cells() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"a", &[0u8; 10]).unwrap();
        node.insert_key_value_cell(b"b", &[0u8; 10]).unwrap();
        node.insert_key_value_cell(b"c", &[0u8; 10]).unwrap();
        node.insert_key_value_cell(b"d", &[0u8; 3000]).unwrap();

        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &Cell::key_value(b"e", &[0u8; 2000])).unwrap();
        assert_eq!(key_string(&node), "abcd");
        assert_eq!(key_string(&sibling), "e");
    }

    #[test]
    fn split_drops_the_cell_pending_replaces() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"a", &[1u8; 2000]).unwrap();
        node.insert_key_value_cell(b"b", &[2u8; 1500]).unwrap();

        let grown = Cell::key_value(b"a", &[3u8; 3000]);
        assert!(!node.fits_after_compaction(&grown).unwrap());
        assert_eq!(node.split_point(&grown).unwrap(), Some(0));

        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &grown).unwrap();
        assert_eq!(key_string(&node), "a");
        assert_eq!(key_string(&sibling), "b");
        assert_eq!(node.cell_at(0).unwrap(), Some(grown));
    }

    #[test]
    fn middle_key_with_no_two_way_split() {
        let mut node = empty_node(1);
        node.insert_key_value_cell(b"a", &[0u8; 2000]).unwrap();
        node.insert_key_value_cell(b"c", &[0u8; 2000]).unwrap();

        let pending = Cell::key_value(b"b", &[0u8; 4000]);
        assert_eq!(node.split_point(&pending).unwrap(), None);
        let mut sibling = empty_node(2);
        assert!(matches!(
            node.split_and_insert(&mut sibling, &pending),
            Err(DbError::PageFull { page: 1, .. })
        ));
        assert_eq!(key_string(&node), "ac");
        assert!(sibling.is_empty());

        assert_eq!(node.split_point_before(b"a").unwrap(), None);
        assert_eq!(node.split_point_before(b"d").unwrap(), None);
        assert_eq!(node.split_point_before(b"b").unwrap(), Some(1));
        node.split_before(&mut sibling, b"b").unwrap();
        assert_eq!(key_string(&node), "a");
        assert_eq!(key_string(&sibling), "c");
        assert!(sibling.is_leaf());
    }

    #[test]
    fn split_of_internal_node_keeps_pointer_cells() {
        let mut node = empty_node(1);
        for (i, c) in ["a", "c", "e", "g"].iter().enumerate() {
            node.insert_pointer_cell(c.as_bytes(), i as PageId + 10).unwrap();
        }
        let mut sibling = empty_node(2);
        node.split_and_insert(&mut sibling, &Cell::pointer(b"f", 99)).unwrap();
        assert!(sibling.is_internal());
        assert_eq!(key_string(&node), "ac");
        assert_eq!(key_string(&sibling), "efg");
        assert_eq!(sibling.find_subtree_or_leaf(b"f").unwrap(), Route::Child(99));
    }

    #[test]
    fn lower_separator_rewrites_only_a_stale_first_key() {
        let mut node = empty_node(1);
        node.insert_pointer_cell(b"m", 10).unwrap();
        node.insert_pointer_cell(b"t", 11).unwrap();

        assert!(!node.lower_separator(10, b"n").unwrap());
        assert!(node.lower_separator(10, b"cat").unwrap());
        assert_eq!(node.key_at(0).unwrap(), Some(&b"cat"[..]));
        assert_eq!(node.find_subtree_or_leaf(b"a").unwrap(), Route::Child(10));
        assert_eq!(node.find_subtree_or_leaf(b"t").unwrap(), Route::Child(11));
        assert!(node.lower_separator(11, b"a").is_err());
        assert!(node.lower_separator(42, b"a").is_err());
    }

    #[test]
    fn lower_separator_falls_back_to_a_prefix_on_a_full_page() {
        let mut node = empty_node(1);
        node.insert_pointer_cell(b"m", 10).unwrap();
        node.insert_pointer_cell(&[b't'; 1352], 11).unwrap();
        node.insert_pointer_cell(&[b'u'; 1352], 12).unwrap();
        node.insert_pointer_cell(&[b'v'; 1300], 13).unwrap();

        let mut first_key = b"c".to_vec();
        first_key.extend_from_slice(&[b'x'; 100]);
        assert!(node.lower_separator(10, &first_key).unwrap());
        assert_eq!(node.key_at(0).unwrap(), Some(&b"c"[..]));
        assert_eq!(node.key_count(), 4);
    }
}
