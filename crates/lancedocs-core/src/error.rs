use thiserror::Error;

/// Validation failures raised while checking metadata values against a
/// declared [`MetadataSchema`](crate::MetadataSchema), or while checking
/// the declaration itself.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown metadata field '{0}'")]
    UnknownField(String),

    #[error("field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("embedding length {actual} does not match store dimensionality {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid schema declaration: {0}")]
    InvalidDeclaration(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
