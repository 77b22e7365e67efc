//! Document <-> Arrow RecordBatch conversion.
//!
//! The write path validates every document against the declared metadata
//! schema, then builds one column per row-schema field. The read path is
//! the exact inverse: a document reconstructed from a row equals the one
//! written, except for the transient `score`, which is populated from the
//! engine's `_distance` (vector search) or `_score` (full-text) result
//! columns when present.
//!
//! Absent metadata fields are stored as Arrow nulls; there is no
//! sentinel-value bookkeeping.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow_array::builder::{BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int64Type};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, ListArray, RecordBatch, StringArray,
    StructArray,
};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{Field, SchemaRef};

use lancedocs_core::{Document, Meta, MetaField, MetaType, MetaValue, MetadataSchema, SchemaError};

use crate::error::{Result, StoreError};
use crate::schema::{arrow_type, meta_fields, CONTENT_COL, ID_COL, META_COL, VECTOR_COL};

/// Column LanceDB adds to vector-search results: raw distance, ascending.
pub const DISTANCE_COL: &str = "_distance";
/// Column LanceDB adds to full-text results: BM25 relevance, descending.
pub const SCORE_COL: &str = "_score";

/// Convert a slice of documents into one RecordBatch matching `row_schema`.
///
/// Fails with a schema mismatch if any document carries an undeclared
/// metadata field, a value of the wrong type, or an embedding whose length
/// differs from `embedding_dims`.
pub fn documents_to_batch(
    docs: &[Document],
    metadata: &MetadataSchema,
    row_schema: &SchemaRef,
    embedding_dims: usize,
) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(docs.len());
    let mut contents = Vec::with_capacity(docs.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(docs.len());
    for doc in docs {
        metadata.validate(&doc.meta)?;
        if let Some(embedding) = &doc.embedding {
            if embedding.len() != embedding_dims {
                return Err(SchemaError::DimensionMismatch {
                    expected: embedding_dims,
                    actual: embedding.len(),
                }
                .into());
            }
        }
        ids.push(doc.id.clone());
        contents.push(doc.content.clone());
        vectors.push(
            doc.embedding
                .as_ref()
                .map(|e| e.iter().copied().map(Some).collect()),
        );
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(contents)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            vectors.into_iter(),
            embedding_dims as i32,
        )),
    ];
    if !metadata.is_empty() {
        columns.push(build_meta_column(&metadata.fields, docs)?);
    }
    Ok(RecordBatch::try_new(row_schema.clone(), columns)?)
}

/// Reconstruct documents from a query result batch.
pub fn batch_to_documents(batch: &RecordBatch, metadata: &MetadataSchema) -> Result<Vec<Document>> {
    let ids = batch
        .column_by_name(ID_COL)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or(StoreError::MalformedBatch(ID_COL))?;
    let contents = batch
        .column_by_name(CONTENT_COL)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or(StoreError::MalformedBatch(CONTENT_COL))?;
    let vectors = batch
        .column_by_name(VECTOR_COL)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());
    let meta_col = batch
        .column_by_name(META_COL)
        .and_then(|c| c.as_any().downcast_ref::<StructArray>());
    let distances = batch
        .column_by_name(DISTANCE_COL)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
    let relevances = batch
        .column_by_name(SCORE_COL)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut docs = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let embedding = vectors.and_then(|col| {
            if col.is_null(row) {
                None
            } else {
                Some(col.value(row).as_primitive::<Float32Type>().values().to_vec())
            }
        });
        let meta = match meta_col {
            Some(s) => read_meta(s, &metadata.fields, row),
            None => Meta::new(),
        };
        let score = distances
            .map(|d| d.value(row))
            .or_else(|| relevances.map(|s| s.value(row)));
        docs.push(Document {
            id: ids.value(row).to_string(),
            content: contents.value(row).to_string(),
            meta,
            embedding,
            score,
        });
    }
    Ok(docs)
}

fn build_meta_column(fields: &[MetaField], docs: &[Document]) -> Result<ArrayRef> {
    let arrays = fields
        .iter()
        .map(|f| {
            let values: Vec<Option<&MetaValue>> =
                docs.iter().map(|d| d.meta.get(&f.name)).collect();
            build_array(&f.ty, &f.name, &values)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(StructArray::try_new(
        meta_fields(fields),
        arrays,
        None,
    )?))
}

fn type_error(path: &str, expected: &str, actual: &MetaValue) -> StoreError {
    SchemaError::TypeMismatch {
        field: path.to_string(),
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
    .into()
}

fn build_array(ty: &MetaType, path: &str, values: &[Option<&MetaValue>]) -> Result<ArrayRef> {
    match ty {
        MetaType::Bool => {
            let mut builder = BooleanBuilder::new();
            for v in values {
                match v {
                    Some(MetaValue::Bool(x)) => builder.append_value(*x),
                    None => builder.append_null(),
                    Some(other) => return Err(type_error(path, "bool", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        MetaType::Int => {
            let mut builder = Int64Builder::new();
            for v in values {
                match v {
                    Some(MetaValue::Int(x)) => builder.append_value(*x),
                    None => builder.append_null(),
                    Some(other) => return Err(type_error(path, "int", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        MetaType::Float => {
            let mut builder = Float64Builder::new();
            for v in values {
                match v {
                    Some(MetaValue::Float(x)) => builder.append_value(*x),
                    None => builder.append_null(),
                    Some(other) => return Err(type_error(path, "float", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        MetaType::Str => {
            let mut builder = StringBuilder::new();
            for v in values {
                match v {
                    Some(MetaValue::Str(x)) => builder.append_value(x),
                    None => builder.append_null(),
                    Some(other) => return Err(type_error(path, "str", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        MetaType::List(inner) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut validity = Vec::with_capacity(values.len());
            let mut flat: Vec<Option<&MetaValue>> = Vec::new();
            for v in values {
                match v {
                    Some(MetaValue::List(items)) => {
                        validity.push(true);
                        lengths.push(items.len());
                        flat.extend(items.iter().map(Some));
                    }
                    None => {
                        validity.push(false);
                        lengths.push(0);
                    }
                    Some(other) => return Err(type_error(path, &ty.name(), other)),
                }
            }
            let child = build_array(inner, path, &flat)?;
            let field = Arc::new(Field::new("item", arrow_type(inner), true));
            Ok(Arc::new(ListArray::try_new(
                field,
                OffsetBuffer::from_lengths(lengths),
                child,
                Some(NullBuffer::from(validity)),
            )?))
        }
        MetaType::Struct(fields) => {
            let mut validity = Vec::with_capacity(values.len());
            for v in values {
                match v {
                    Some(MetaValue::Struct(_)) => validity.push(true),
                    None => validity.push(false),
                    Some(other) => return Err(type_error(path, "struct", other)),
                }
            }
            let arrays = fields
                .iter()
                .map(|f| {
                    let child_values: Vec<Option<&MetaValue>> = values
                        .iter()
                        .map(|v| match v {
                            Some(MetaValue::Struct(map)) => map.get(&f.name),
                            _ => None,
                        })
                        .collect();
                    build_array(&f.ty, &format!("{path}.{}", f.name), &child_values)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Arc::new(StructArray::try_new(
                meta_fields(fields),
                arrays,
                Some(NullBuffer::from(validity)),
            )?))
        }
    }
}

fn read_meta(arr: &StructArray, fields: &[MetaField], row: usize) -> Meta {
    let mut meta = Meta::new();
    if arr.is_null(row) {
        return meta;
    }
    for field in fields {
        if let Some(col) = arr.column_by_name(&field.name) {
            if let Some(value) = read_value(&field.ty, col.as_ref(), row) {
                meta.insert(field.name.clone(), value);
            }
        }
    }
    meta
}

fn read_value(ty: &MetaType, arr: &dyn Array, row: usize) -> Option<MetaValue> {
    if arr.is_null(row) {
        return None;
    }
    match ty {
        MetaType::Bool => arr.as_boolean_opt().map(|a| MetaValue::Bool(a.value(row))),
        MetaType::Int => arr
            .as_primitive_opt::<Int64Type>()
            .map(|a| MetaValue::Int(a.value(row))),
        MetaType::Float => arr
            .as_primitive_opt::<Float64Type>()
            .map(|a| MetaValue::Float(a.value(row))),
        MetaType::Str => arr
            .as_string_opt::<i32>()
            .map(|a| MetaValue::Str(a.value(row).to_string())),
        MetaType::List(inner) => {
            let list = arr.as_list_opt::<i32>()?;
            let values = list.value(row);
            let items = (0..values.len())
                .filter_map(|i| read_value(inner, values.as_ref(), i))
                .collect();
            Some(MetaValue::List(items))
        }
        MetaType::Struct(fields) => {
            let s = arr.as_struct_opt()?;
            let mut map = BTreeMap::new();
            for field in fields {
                if let Some(col) = s.column_by_name(&field.name) {
                    if let Some(value) = read_value(&field.ty, col.as_ref(), row) {
                        map.insert(field.name.clone(), value);
                    }
                }
            }
            Some(MetaValue::Struct(map))
        }
    }
}
