//! Read-only view of Machines and Tags, and the hot NodeId -> Tag cache that
//! sits in front of it.

mod cache;
mod repository;

pub use cache::TagCache;
pub use repository::{MetadataRepository, PgMetadataRepository};
