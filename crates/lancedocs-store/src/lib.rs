//! lancedocs-store
//!
//! LanceDB-backed document store: Arrow row-schema mapping, document
//! conversion, vector + full-text search, and translation of structured
//! filters into the engine's predicate syntax. All storage, indexing and
//! query execution happens inside LanceDB; this crate only maps between
//! documents and rows.

pub mod convert;
pub mod error;
pub mod filter_sql;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{DistanceMetric, DuplicatePolicy, ExistsPolicy, LanceDocumentStore};
