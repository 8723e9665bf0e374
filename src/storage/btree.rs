use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::cell::Cell;
use crate::storage::cursor::Cursor;
use crate::storage::node::BTreeNode;
use crate::storage::page::{PageId, CELL_POINTER_SIZE, PAGE_CAPACITY};
use crate::storage::pager::Pager;

/// Largest key accepted. Any internal page can then hold at least three
/// separators, so a full parent always has something to split.
pub const MAX_KEY_SIZE: usize = PAGE_CAPACITY / 3 - CELL_POINTER_SIZE - 8;

/// A B-Tree over the pages of one file, growing by splitting full nodes.
///
///—————————————————————————————————————————————————————————————————————————————————————————————
/// On insert:
///   1. Descend from the root to the owning leaf, recording the path in the cursor.
///   2. If the leaf can hold the cell, write it in place (equal keys are replaced).
///   3. If rewriting the leaf's live cells (minus any cell being replaced) frees
///        enough room, compact and insert.
///   4. Otherwise split:
///        • Check that a split point exists, then allocate an empty sibling page,
///        • Move the later cells into it, place the new cell on its side,
///        • Step back along the cursor path to the parent.
///        • If no split point can hold the new cell, split the leaf at its key
///            without inserting, then start over from the root.
///   5. At the parent:
///        • No parent: the split node was the root. Allocate a new root with one
///            separator per half and point the file header at it.
///        • Otherwise add a separator for the sibling's first key. If the parent is
///            full, it becomes the node being split and step 4 repeats one level up.
///—————————————————————————————————————————————————————————————————————————————————————————————
pub struct BTree<'a> {
    pager: &'a mut Pager,
    cursor: Cursor,
    root: Option<PageId>,
}

impl<'a> BTree<'a> {
    /// Attach to the tree whose root is recorded in the pager's header.
    pub fn new(pager: &'a mut Pager) -> DbResult<BTree<'a>> {
        let root = pager.root_page_id()?;
        debug!("BTree::new: root page {:?}", root);
        Ok(BTree { pager, cursor: Cursor::new(), root })
    }

    pub fn root_page(&self) -> Option<PageId> {
        self.root
    }

    /// Page ids visited by the last `find` or `insert`, root first.
    pub fn path(&self) -> &[PageId] {
        self.cursor.path()
    }

    /// Returns the stored value for `key`, if any.
    pub fn find(&mut self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.cursor.reset();
        let Some(root) = self.cursor.get_root(self.pager)? else {
            debug!("find: empty tree");
            return Ok(None);
        };
        self.root = Some(root.id());

        let leaf = self.cursor.find_leaf_node_by_key(self.pager, root, key)?;
        let found = leaf.find_key_value_cell(key)?;
        debug!("find: leaf {} hit={}", leaf.id(), found.is_some());
        Ok(found.and_then(|cell| match cell {
            Cell::KeyValue { value, .. } => Some(value),
            Cell::Pointer { .. } => None,
        }))
    }

    /// Insert `key` → `value`, replacing any existing value for `key`.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(DbError::KeyTooLarge { size: key.len(), max: MAX_KEY_SIZE });
        }
        let pending = Cell::key_value(key, value);
        if pending.size() + CELL_POINTER_SIZE > PAGE_CAPACITY {
            return Err(DbError::CellTooLarge {
                size: pending.size(),
                max: PAGE_CAPACITY - CELL_POINTER_SIZE,
            });
        }

        loop {
            self.cursor.reset();
            let root = match self.cursor.get_root(self.pager)? {
                Some(root) => root,
                None => {
                    let (id, page) = self.pager.allocate_page()?;
                    self.pager.set_root(id, &page)?;
                    debug!("insert: allocated root page {}", id);
                    BTreeNode::from_page(id, page)?
                }
            };
            self.root = Some(root.id());

            let mut leaf = self.cursor.find_leaf_node_by_key(self.pager, root, key)?;
            if leaf.can_hold(key, Some(value)) {
                leaf.insert_cell(&pending)?;
                return self.pager.write_page(leaf.id(), leaf.page());
            }
            if leaf.fits_after_compaction(&pending)? {
                leaf.compact_and_insert(&pending)?;
                return self.pager.write_page(leaf.id(), leaf.page());
            }
            if leaf.split_point(&pending)?.is_some() {
                debug!("insert: leaf {} is full, splitting", leaf.id());
                return self.split_and_insert(leaf, Split::Insert(pending));
            }

            // The cell fits on neither side of any split: cut the leaf at its
            // key first, then descend again.
            debug!("insert: leaf {} splits before the key, retrying", leaf.id());
            self.split_and_insert(leaf, Split::Before(key.to_vec()))?;
        }
    }

    /// Split `node` and push separators up the cursor path until some
    /// ancestor has room, growing a new root if none does.
    ///
    /// Each level is checked before its sibling page is allocated, and
    /// nothing is written until every split on the way up has succeeded.
    fn split_and_insert(&mut self, mut node: BTreeNode, mut split: Split) -> DbResult<()> {
        let mut dirty: Vec<BTreeNode> = Vec::new();

        loop {
            if !split.fits(&node)? {
                return Err(DbError::PageFull { page: node.id(), size: split.size() });
            }
            let (sibling_id, page) = self.pager.allocate_page()?;
            let mut sibling = BTreeNode::from_page(sibling_id, page)?;
            split.apply(&mut node, &mut sibling)?;

            let left_first = first_key_of(&node)?;
            let right_first = first_key_of(&sibling)?;
            let node_id = node.id();
            dirty.push(node);
            dirty.push(sibling);

            let Some(mut parent) = self.cursor.prev(self.pager)? else {
                self.flush(&dirty)?;
                return self.create_root_and_increase_height(
                    (left_first.as_slice(), node_id),
                    (right_first.as_slice(), sibling_id),
                );
            };

            parent.lower_separator(node_id, &left_first)?;
            let separator = Cell::pointer(&right_first, sibling_id);
            if parent.can_hold(&right_first, None) {
                parent.insert_cell(&separator)?;
            } else if parent.fits_after_compaction(&separator)? {
                parent.compact_and_insert(&separator)?;
            } else {
                debug!("split_and_insert: parent {} is full, splitting it too", parent.id());
                split = Split::Insert(separator);
                node = parent;
                continue;
            }

            debug!(
                "split_and_insert: separator for page {} goes into parent {}",
                sibling_id,
                parent.id()
            );
            dirty.push(parent);
            return self.flush(&dirty);
        }
    }

    fn create_root_and_increase_height(
        &mut self,
        (left_key, left_id): (&[u8], PageId),
        (right_key, right_id): (&[u8], PageId),
    ) -> DbResult<()> {
        let (id, page) = self.pager.allocate_page()?;
        let mut root = BTreeNode::from_page(id, page)?;
        root.insert_pointer_cell(left_key, left_id)?;
        root.insert_pointer_cell(right_key, right_id)?;
        self.pager.set_root(id, root.page())?;
        debug!(
            "create_root_and_increase_height: new root {} over {} and {}",
            id, left_id, right_id
        );
        self.root = Some(id);
        Ok(())
    }

    fn flush(&mut self, nodes: &[BTreeNode]) -> DbResult<()> {
        for node in nodes {
            self.pager.write_page(node.id(), node.page())?;
        }
        Ok(())
    }
}

/// How the lowest node of a propagation is divided. Every level above
/// always inserts a separator.
enum Split {
    Insert(Cell),
    Before(Vec<u8>),
}

impl Split {
    fn fits(&self, node: &BTreeNode) -> DbResult<bool> {
        Ok(match self {
            Split::Insert(pending) => node.split_point(pending)?.is_some(),
            Split::Before(key) => node.split_point_before(key)?.is_some(),
        })
    }

    fn apply(&self, node: &mut BTreeNode, sibling: &mut BTreeNode) -> DbResult<()> {
        match self {
            Split::Insert(pending) => node.split_and_insert(sibling, pending),
            Split::Before(key) => node.split_before(sibling, key),
        }
    }

    fn size(&self) -> usize {
        match self {
            Split::Insert(pending) => pending.size(),
            Split::Before(_) => 0,
        }
    }
}

fn first_key_of(node: &BTreeNode) -> DbResult<Vec<u8>> {
    node.first_key()?
        .map(<[u8]>::to_vec)
        .ok_or_else(|| DbError::corrupt(node.id(), "node left empty by a split"))
}
