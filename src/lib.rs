pub mod storage;
pub mod database;
pub mod error;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use storage::scalar::Scalar;
