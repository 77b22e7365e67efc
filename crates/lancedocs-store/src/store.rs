//! LanceDB-backed document store.

use std::collections::HashSet;
use std::path::Path;

use arrow_array::{Array, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray};
use arrow_schema::{Schema, SchemaRef};
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::index::scalar::FullTextSearchQuery;
use lancedb::index::{Index, IndexType};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lancedocs_core::{Document, Filter, MetadataSchema, SchemaError};

use crate::convert::{batch_to_documents, documents_to_batch};
use crate::error::{Result, StoreError};
use crate::filter_sql::{string_literal, translate};
use crate::schema::{build_row_schema, ID_COL};

/// How identifier collisions are handled by [`LanceDocumentStore::write_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the existing row, silently drop the incoming duplicate.
    Skip,
    /// Replace the existing row with the incoming document.
    Overwrite,
    /// Any collision aborts the whole batch; nothing is written.
    Fail,
}

/// What to do when the table already exists with a different schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistsPolicy {
    /// Open the existing table; an incompatible schema is a
    /// [`StoreError::StoreInit`] error.
    Validate,
    /// Drop the incompatible table and start fresh.
    Recreate,
}

/// Distance metric used for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    L2,
    Cosine,
    Dot,
}

impl From<DistanceMetric> for DistanceType {
    fn from(metric: DistanceMetric) -> Self {
        match metric {
            DistanceMetric::L2 => DistanceType::L2,
            DistanceMetric::Cosine => DistanceType::Cosine,
            DistanceMetric::Dot => DistanceType::Dot,
        }
    }
}

/// `IN (...)` predicates are chunked so very large id lists never produce
/// a single oversized SQL string.
const IN_CHUNK: usize = 900;

/// Document store backed by a single LanceDB table.
///
/// The store owns the connection and table handle; share one store across
/// retrievers with an `Arc`. It does not coordinate concurrent writers
/// from multiple processes -- write/write and read/write safety is
/// whatever the embedded engine itself provides.
pub struct LanceDocumentStore {
    table: Table,
    table_name: String,
    metadata: MetadataSchema,
    embedding_dims: usize,
    row_schema: SchemaRef,
}

impl LanceDocumentStore {
    /// Open or create the table at `db_path`.
    ///
    /// The row schema is derived from `metadata` and `embedding_dims` and
    /// is fixed for the lifetime of the table. If the table already exists
    /// with a different schema, `exists_policy` decides between failing
    /// and recreating.
    pub async fn open(
        db_path: &Path,
        table_name: &str,
        metadata: MetadataSchema,
        embedding_dims: usize,
        exists_policy: ExistsPolicy,
    ) -> Result<Self> {
        if embedding_dims == 0 {
            return Err(StoreError::StoreInit(
                "embedding_dims must be positive".to_string(),
            ));
        }
        metadata
            .validate_declaration()
            .map_err(|e| StoreError::StoreInit(e.to_string()))?;
        let row_schema = build_row_schema(&metadata, embedding_dims);

        std::fs::create_dir_all(db_path)
            .map_err(|e| StoreError::StoreInit(format!("cannot create {}: {e}", db_path.display())))?;
        let conn = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(StoreError::storage("connect"))?;

        let names = conn
            .table_names()
            .execute()
            .await
            .map_err(StoreError::storage("list tables"))?;
        let table = if names.iter().any(|n| n == table_name) {
            let table = conn
                .open_table(table_name)
                .execute()
                .await
                .map_err(StoreError::storage("open table"))?;
            let existing = table
                .schema()
                .await
                .map_err(StoreError::storage("read table schema"))?;
            if schemas_compatible(&existing, &row_schema) {
                table
            } else {
                match exists_policy {
                    ExistsPolicy::Validate => {
                        return Err(StoreError::StoreInit(format!(
                            "table '{table_name}' exists with an incompatible schema"
                        )))
                    }
                    ExistsPolicy::Recreate => {
                        create_table(&conn, table_name, &row_schema, true).await?
                    }
                }
            }
        } else {
            create_table(&conn, table_name, &row_schema, false).await?
        };

        info!(table = table_name, dims = embedding_dims, "opened document store");
        Ok(Self {
            table,
            table_name: table_name.to_string(),
            metadata,
            embedding_dims,
            row_schema,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn metadata_schema(&self) -> &MetadataSchema {
        &self.metadata
    }

    pub fn embedding_dims(&self) -> usize {
        self.embedding_dims
    }

    /// Write a batch of documents. Returns the number of rows actually
    /// written (under `Skip`, duplicates are omitted from the count).
    ///
    /// Under `Fail` the batch is atomic: any id collision -- inside the
    /// batch or against the table -- rejects the whole call and the table
    /// is left untouched.
    pub async fn write_documents(
        &self,
        docs: &[Document],
        policy: DuplicatePolicy,
    ) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let batch = documents_to_batch(docs, &self.metadata, &self.row_schema, self.embedding_dims)?;

        let written = match policy {
            DuplicatePolicy::Overwrite => {
                let mut merge = self.table.merge_insert(&[ID_COL]);
                merge
                    .when_matched_update_all(None)
                    .when_not_matched_insert_all();
                let result = merge
                    .execute(self.reader(batch))
                    .await
                    .map_err(StoreError::storage("merge insert"))?;
                (result.num_inserted_rows + result.num_updated_rows) as usize
            }
            DuplicatePolicy::Skip => {
                let mut merge = self.table.merge_insert(&[ID_COL]);
                merge.when_not_matched_insert_all();
                let result = merge
                    .execute(self.reader(batch))
                    .await
                    .map_err(StoreError::storage("merge insert"))?;
                result.num_inserted_rows as usize
            }
            DuplicatePolicy::Fail => {
                let mut seen = HashSet::new();
                let in_batch: Vec<String> = docs
                    .iter()
                    .filter(|d| !seen.insert(d.id.as_str()))
                    .map(|d| d.id.clone())
                    .collect();
                if !in_batch.is_empty() {
                    return Err(StoreError::DuplicateDocument { ids: in_batch });
                }
                let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
                let existing = self.existing_ids(&ids).await?;
                if !existing.is_empty() {
                    return Err(StoreError::DuplicateDocument { ids: existing });
                }
                self.table
                    .add(self.reader(batch))
                    .execute()
                    .await
                    .map_err(StoreError::storage("add rows"))?;
                docs.len()
            }
        };
        debug!(table = self.table_name.as_str(), written, "wrote documents");
        Ok(written)
    }

    /// Delete the rows with the given identifiers. Missing ids are not an
    /// error; returns the number of rows actually removed.
    pub async fn delete_documents(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut seen = HashSet::new();
        let unique: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let before = self
            .table
            .count_rows(None)
            .await
            .map_err(StoreError::storage("count rows"))?;
        for chunk in unique.chunks(IN_CHUNK) {
            let predicate = in_predicate(ID_COL, chunk);
            self.table
                .delete(&predicate)
                .await
                .map_err(StoreError::storage("delete rows"))?;
        }
        let after = self
            .table
            .count_rows(None)
            .await
            .map_err(StoreError::storage("count rows"))?;
        let removed = before.saturating_sub(after);
        debug!(table = self.table_name.as_str(), removed, "deleted documents");
        Ok(removed)
    }

    /// Count rows, optionally constrained by a filter.
    pub async fn count_documents(&self, filter: Option<&Filter>) -> Result<usize> {
        let predicate = filter.map(|f| translate(f, &self.metadata)).transpose()?;
        self.table
            .count_rows(predicate)
            .await
            .map_err(StoreError::storage("count rows"))
    }

    /// Materialize every document matching the filter (all documents when
    /// no filter is given). Eager by design: typical corpora here are
    /// prototyping-scale.
    pub async fn filter_documents(&self, filter: Option<&Filter>) -> Result<Vec<Document>> {
        let mut query = self.table.query();
        if let Some(f) = filter {
            query = query.only_if(translate(f, &self.metadata)?);
        }
        let mut stream = query
            .execute()
            .await
            .map_err(StoreError::storage("scan table"))?;
        let mut docs = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(StoreError::storage("read result batch"))?
        {
            docs.extend(batch_to_documents(&batch, &self.metadata)?);
        }
        Ok(docs)
    }

    /// Top-k nearest neighbours of `query` under `metric`.
    ///
    /// Results arrive in the engine's rank order: ascending `_distance`,
    /// so the first document is the most similar for every supported
    /// metric (Lance reports dot products negated). Each document's
    /// `score` is that raw distance -- lower is better. Ties keep the
    /// engine's order.
    pub async fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
        metric: DistanceMetric,
    ) -> Result<Vec<Document>> {
        if query.len() != self.embedding_dims {
            return Err(SchemaError::DimensionMismatch {
                expected: self.embedding_dims,
                actual: query.len(),
            }
            .into());
        }
        let mut vector_query = self
            .table
            .vector_search(query.to_vec())
            .map_err(StoreError::storage("build vector query"))?
            .distance_type(metric.into())
            .limit(top_k);
        if let Some(f) = filter {
            vector_query = vector_query.only_if(translate(f, &self.metadata)?);
        }
        let mut stream = vector_query
            .execute()
            .await
            .map_err(StoreError::storage("vector search"))?;
        let mut docs = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(StoreError::storage("read result batch"))?
        {
            docs.extend(batch_to_documents(&batch, &self.metadata)?);
        }
        debug!(
            table = self.table_name.as_str(),
            returned = docs.len(),
            top_k,
            "similarity search"
        );
        Ok(docs)
    }

    /// Top-k lexical matches for `query` against `text_field`.
    ///
    /// Requires [`create_fts_index`](Self::create_fts_index) to have been
    /// called for `text_field` first; a missing index fails with
    /// [`StoreError::IndexNotReady`] rather than returning nothing. Each
    /// document's `score` is the BM25 relevance (`_score`), descending --
    /// higher is better.
    pub async fn text_search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&Filter>,
        text_field: &str,
    ) -> Result<Vec<Document>> {
        self.check_fts_index(text_field).await?;
        let mut text_query = self
            .table
            .query()
            .full_text_search(FullTextSearchQuery::new(query.to_string()))
            .limit(top_k);
        if let Some(f) = filter {
            text_query = text_query.only_if(translate(f, &self.metadata)?);
        }
        let mut stream = text_query
            .execute()
            .await
            .map_err(StoreError::storage("full-text search"))?;
        let mut docs = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(StoreError::storage("read result batch"))?
        {
            docs.extend(batch_to_documents(&batch, &self.metadata)?);
        }
        debug!(
            table = self.table_name.as_str(),
            returned = docs.len(),
            top_k,
            "full-text search"
        );
        Ok(docs)
    }

    /// Build the native full-text index on `text_field`.
    pub async fn create_fts_index(&self, text_field: &str) -> Result<()> {
        self.table
            .create_index(&[text_field], Index::FTS(Default::default()))
            .execute()
            .await
            .map_err(StoreError::storage("create fts index"))?;
        info!(
            table = self.table_name.as_str(),
            field = text_field,
            "built full-text index"
        );
        Ok(())
    }

    async fn check_fts_index(&self, text_field: &str) -> Result<()> {
        let indices = self
            .table
            .list_indices()
            .await
            .map_err(StoreError::storage("list indices"))?;
        let ready = indices.iter().any(|idx| {
            matches!(idx.index_type, IndexType::FTS) && idx.columns.iter().any(|c| c == text_field)
        });
        if ready {
            Ok(())
        } else {
            Err(StoreError::IndexNotReady {
                field: text_field.to_string(),
            })
        }
    }

    async fn existing_ids(&self, ids: &[&str]) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for chunk in ids.chunks(IN_CHUNK) {
            let predicate = in_predicate(ID_COL, chunk);
            let mut stream = self
                .table
                .query()
                .only_if(predicate)
                .select(Select::columns(&[ID_COL]))
                .execute()
                .await
                .map_err(StoreError::storage("probe existing ids"))?;
            while let Some(batch) = stream
                .try_next()
                .await
                .map_err(StoreError::storage("read id batch"))?
            {
                let col = batch
                    .column_by_name(ID_COL)
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                    .ok_or(StoreError::MalformedBatch(ID_COL))?;
                for i in 0..col.len() {
                    found.push(col.value(i).to_string());
                }
            }
        }
        Ok(found)
    }

    fn reader(&self, batch: RecordBatch) -> Box<dyn RecordBatchReader + Send> {
        Box::new(RecordBatchIterator::new(
            vec![Ok(batch)].into_iter(),
            self.row_schema.clone(),
        ))
    }
}

fn in_predicate(column: &str, ids: &[&str]) -> String {
    let rendered: Vec<String> = ids.iter().map(|id| string_literal(id)).collect();
    format!("{column} IN ({})", rendered.join(", "))
}

/// Compare field names and types; nullability and metadata are ignored so
/// engine-side normalization never reads as an incompatibility.
fn schemas_compatible(existing: &Schema, wanted: &Schema) -> bool {
    existing.fields().len() == wanted.fields().len()
        && existing
            .fields()
            .iter()
            .zip(wanted.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type())
}

async fn create_table(
    conn: &Connection,
    name: &str,
    schema: &SchemaRef,
    overwrite: bool,
) -> Result<Table> {
    let reader = Box::new(RecordBatchIterator::new(vec![].into_iter(), schema.clone()));
    let mut builder = conn.create_table(name, reader);
    if overwrite {
        builder = builder.mode(CreateTableMode::Overwrite);
    }
    builder
        .execute()
        .await
        .map_err(StoreError::storage("create table"))
}
