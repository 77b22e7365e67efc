use lancedocs_core::SchemaError;
use thiserror::Error;

/// Error taxonomy for the document store.
///
/// All engine and I/O failures surface as [`StoreError::Storage`],
/// wrapping the underlying cause; nothing is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document's metadata or embedding does not fit the declared row
    /// schema.
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaError),

    /// Identifier collision under [`DuplicatePolicy::Fail`](crate::DuplicatePolicy).
    /// The whole batch is rejected and nothing is written.
    #[error("duplicate document id(s): {}", ids.join(", "))]
    DuplicateDocument { ids: Vec<String> },

    /// The filter references an unknown field or applies an operator the
    /// field's declared type does not support.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Full-text search was requested before an index was built on the
    /// target field.
    #[error("no full-text index on field '{field}'; build one with create_fts_index first")]
    IndexNotReady { field: String },

    /// The store could not be opened: bad construction parameters, or an
    /// existing table whose schema is incompatible under
    /// [`ExistsPolicy::Validate`](crate::ExistsPolicy).
    #[error("store initialization failed: {0}")]
    StoreInit(String),

    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: lancedb::Error,
    },

    /// A query result batch is missing a column this store always writes.
    #[error("query returned malformed batch: missing or mistyped column '{0}'")]
    MalformedBatch(&'static str),

    #[error("arrow conversion failed: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl StoreError {
    pub(crate) fn storage(context: &'static str) -> impl FnOnce(lancedb::Error) -> StoreError {
        move |source| StoreError::Storage { context, source }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
