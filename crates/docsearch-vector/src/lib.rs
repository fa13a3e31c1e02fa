//! docsearch-vector
//!
//! LanceDB store for the engine: `documents`, `sources` and `chunks` tables
//! behind the catalog and vector traits, plus a TTL cache table.
pub mod schema;
pub mod table;
pub mod store;
pub mod cache;

pub use cache::LanceCache;
pub use store::LanceStore;
