pub mod page;
pub mod pager;
pub mod cell;
pub mod node;
pub mod cursor;
pub mod btree;
pub mod scalar;
