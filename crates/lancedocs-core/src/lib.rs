#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod schema;

pub use document::{Document, DocumentId, Meta, MetaValue};
pub use error::{Result, SchemaError};
pub use filter::{CompareOp, Filter};
pub use schema::{MetaField, MetaType, MetadataSchema};
