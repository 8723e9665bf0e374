use std::path::Path;

use log::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::storage::btree::BTree;
use crate::storage::pager::Pager;
use crate::storage::scalar::Scalar;

pub const DEFAULT_DB_FILE: &str = "data.db";

/// A string-keyed store backed by one database file.
///
/// `new` only opens the file. `open` must accept its header before `get` or
/// `set` will touch it.
pub struct Database {
    pager: Pager,
    opened: bool,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        debug!("Database::new: {}", path.display());
        Ok(Database { pager: Pager::new(path)?, opened: false })
    }

    /// Validate (or, for an empty file, create) the file header.
    pub fn open(&mut self) -> DbResult<()> {
        if !self.pager.verify()? {
            warn!("open: file header rejected");
            self.opened = false;
            return Err(DbError::InvalidFormat);
        }
        self.opened = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    fn tree(&mut self) -> DbResult<BTree<'_>> {
        if !self.opened {
            return Err(DbError::NotOpen);
        }
        BTree::new(&mut self.pager)
    }

    pub fn get(&mut self, key: &str) -> DbResult<Option<Scalar>> {
        match self.tree()?.find(key.as_bytes())? {
            Some(bytes) => Scalar::deserialize(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` and return the value as it now reads back.
    pub fn set(&mut self, key: &str, value: &str) -> DbResult<Scalar> {
        let encoded = Scalar::from_input(value).serialize();
        self.tree()?.insert(key.as_bytes(), &encoded)?;
        Scalar::deserialize(&encoded)
    }

    /// The pager underneath, for inspecting the file layout.
    pub fn pager(&mut self) -> &mut Pager {
        &mut self.pager
    }
}
