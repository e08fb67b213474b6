//! I/O and persistence layer: the on-disk store-and-forward spool and the
//! relational store write path the [`daq_batch`] sink drives.

pub mod relational;
pub mod spool;

pub use relational::{BulkInsertOutcome, PgRelationalStore, RelationalStore};
pub use spool::Spool;
