//! Arrow row schema for document tables.
//!
//! The on-disk row merges the fixed system fields (`id`, `content`,
//! `vector`) with the caller-declared metadata fields. All metadata lives
//! under a single `meta` struct column, so user field names can never
//! collide with system columns. The row schema is immutable for the
//! lifetime of a table; adding metadata fields requires a new table.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};
use lancedocs_core::{MetaField, MetaType, MetadataSchema};

pub const ID_COL: &str = "id";
pub const CONTENT_COL: &str = "content";
pub const VECTOR_COL: &str = "vector";
pub const META_COL: &str = "meta";

/// Build the full row schema for a table with the given metadata layout
/// and embedding dimensionality.
///
/// When the metadata schema declares no fields the `meta` column is
/// omitted entirely.
pub fn build_row_schema(metadata: &MetadataSchema, embedding_dims: usize) -> SchemaRef {
    let mut fields = vec![
        Field::new(ID_COL, DataType::Utf8, false),
        Field::new(CONTENT_COL, DataType::Utf8, false),
        Field::new(
            VECTOR_COL,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dims as i32,
            ),
            true,
        ),
    ];
    if !metadata.is_empty() {
        fields.push(Field::new(
            META_COL,
            DataType::Struct(meta_fields(&metadata.fields)),
            true,
        ));
    }
    Arc::new(Schema::new(fields))
}

pub(crate) fn meta_fields(fields: &[MetaField]) -> Fields {
    fields
        .iter()
        .map(|f| Arc::new(Field::new(&f.name, arrow_type(&f.ty), true)))
        .collect()
}

pub(crate) fn arrow_type(ty: &MetaType) -> DataType {
    match ty {
        MetaType::Bool => DataType::Boolean,
        MetaType::Int => DataType::Int64,
        MetaType::Float => DataType::Float64,
        MetaType::Str => DataType::Utf8,
        MetaType::List(inner) => {
            DataType::List(Arc::new(Field::new("item", arrow_type(inner), true)))
        }
        MetaType::Struct(fields) => DataType::Struct(meta_fields(fields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lancedocs_core::MetaField;

    #[test]
    fn system_fields_come_first() {
        let schema = build_row_schema(
            &MetadataSchema::new(vec![MetaField::new("page", MetaType::Int)]),
            4,
        );
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec![ID_COL, CONTENT_COL, VECTOR_COL, META_COL]);
    }

    #[test]
    fn empty_metadata_omits_meta_column() {
        let schema = build_row_schema(&MetadataSchema::default(), 4);
        assert!(schema.field_with_name(META_COL).is_err());
    }

    #[test]
    fn nested_types_map_to_nested_columns() {
        let schema = build_row_schema(
            &MetadataSchema::new(vec![
                MetaField::new("topics", MetaType::list(MetaType::Str)),
                MetaField::new(
                    "origin",
                    MetaType::Struct(vec![MetaField::new("line", MetaType::Int)]),
                ),
            ]),
            4,
        );
        let meta = schema.field_with_name(META_COL).expect("meta column");
        match meta.data_type() {
            DataType::Struct(fields) => {
                assert!(matches!(fields[0].data_type(), DataType::List(_)));
                assert!(matches!(fields[1].data_type(), DataType::Struct(_)));
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }
}
