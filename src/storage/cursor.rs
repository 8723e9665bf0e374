use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::node::{BTreeNode, Route};
use crate::storage::page::PageId;
use crate::storage::pager::Pager;

/// Tracks the root-to-leaf path of one `find`/`insert`.
///
/// Pages keep no parent pointer, so splitting walks this path backwards to
/// reach each ancestor.
#[derive(Debug, Default)]
pub struct Cursor {
    breadcrumbs: Vec<PageId>,
}

impl Cursor {
    pub fn new() -> Self {
        Cursor { breadcrumbs: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.breadcrumbs.clear();
    }

    /// Page ids visited so far, root first.
    pub fn path(&self) -> &[PageId] {
        &self.breadcrumbs
    }

    pub fn get_root(&self, pager: &mut Pager) -> DbResult<Option<BTreeNode>> {
        match pager.read_root()? {
            Some((id, page)) => BTreeNode::from_page(id, page).map(Some),
            None => Ok(None),
        }
    }

    /// Descend from `start` until a leaf (or a still-empty root) owns `key`,
    /// recording every page on the way.
    pub fn find_leaf_node_by_key(
        &mut self,
        pager: &mut Pager,
        start: BTreeNode,
        key: &[u8],
    ) -> DbResult<BTreeNode> {
        let max_depth = pager.max_page_id()? as usize;
        let mut node = start;
        self.breadcrumbs.push(node.id());

        while let Route::Child(child) = node.find_subtree_or_leaf(key)? {
            if self.breadcrumbs.len() >= max_depth {
                return Err(DbError::corrupt(
                    child,
                    format!("descent from page {} revisits a page", self.breadcrumbs[0]),
                ));
            }
            node = BTreeNode::from_page(child, pager.read_page(child)?)?;
            self.breadcrumbs.push(child);
        }

        debug!("find_leaf_node_by_key: path {:?}", self.breadcrumbs);
        Ok(node)
    }

    /// Step back from the current node to its parent, re-read from disk.
    /// Returns `None` once the current node is the root.
    pub fn prev(&mut self, pager: &mut Pager) -> DbResult<Option<BTreeNode>> {
        self.breadcrumbs.pop();
        match self.breadcrumbs.last() {
            Some(&id) => BTreeNode::from_page(id, pager.read_page(id)?).map(Some),
            None => Ok(None),
        }
    }
}
