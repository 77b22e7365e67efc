//! Document and metadata value model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocumentId = String;
pub type Meta = BTreeMap<String, MetaValue>;

/// Version tag mixed into every generated document identifier. Bump this
/// when the hashing scheme changes so old and new ids can never collide
/// silently.
pub const ID_HASH_VERSION: &str = "lancedocs/id/v1";

/// A single metadata value.
///
/// This is a closed sum: every value a document may carry in its metadata
/// is one of these variants, and the declared
/// [`MetadataSchema`](crate::MetadataSchema) constrains which variant each
/// field may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetaValue>),
    Struct(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "bool",
            MetaValue::Int(_) => "int",
            MetaValue::Float(_) => "float",
            MetaValue::Str(_) => "str",
            MetaValue::List(_) => "list",
            MetaValue::Struct(_) => "struct",
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(v: Vec<MetaValue>) -> Self {
        MetaValue::List(v)
    }
}

/// A unit of retrievable text plus its metadata and optional embedding.
///
/// - `id`: stable identifier, by default a versioned BLAKE3 hash of the
///   content and metadata (see [`Document::hash_id`])
/// - `content`: the text payload
/// - `meta`: metadata conforming to the store's declared schema
/// - `embedding`: fixed-length vector, present once an upstream stage has
///   embedded the content
/// - `score`: transient relevance, populated only on query results and
///   never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    /// Create a document with a derived identifier.
    pub fn new(content: impl Into<String>, meta: Meta) -> Self {
        let content = content.into();
        let id = Self::hash_id(&content, &meta);
        Self {
            id,
            content,
            meta,
            embedding: None,
            score: None,
        }
    }

    /// Create a document with a caller-chosen identifier.
    pub fn with_id(id: impl Into<DocumentId>, content: impl Into<String>, meta: Meta) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            meta,
            embedding: None,
            score: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Deterministic identifier for a content + metadata pair.
    ///
    /// BLAKE3 over the version tag, the length-framed content, and the
    /// canonical JSON rendering of the metadata (`BTreeMap` keys are
    /// ordered, so the rendering is unique). Identical inputs always hash
    /// to the same id; the version tag keeps ids from different hashing
    /// schemes disjoint.
    pub fn hash_id(content: &str, meta: &Meta) -> DocumentId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ID_HASH_VERSION.as_bytes());
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
        let canonical = serde_json::to_vec(meta).expect("metadata serializes to JSON");
        hasher.update(&canonical);
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let mut meta = Meta::new();
        meta.insert("name".to_string(), MetaValue::from("a"));
        let d1 = Document::new("same text", meta.clone());
        let d2 = Document::new("same text", meta);
        assert_eq!(d1.id, d2.id);
    }

    #[test]
    fn hash_differs_on_content() {
        let d1 = Document::new("alpha", Meta::new());
        let d2 = Document::new("bravo", Meta::new());
        assert_ne!(d1.id, d2.id);
    }

    #[test]
    fn hash_differs_on_meta() {
        let mut meta = Meta::new();
        meta.insert("page".to_string(), MetaValue::Int(1));
        let d1 = Document::new("alpha", Meta::new());
        let d2 = Document::new("alpha", meta);
        assert_ne!(d1.id, d2.id);
    }

    #[test]
    fn meta_value_json_shape() {
        let v = MetaValue::List(vec![MetaValue::Int(1), MetaValue::Str("x".into())]);
        let json = serde_json::to_string(&v).expect("serialize");
        assert_eq!(json, r#"[1,"x"]"#);
        let back: MetaValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, v);
    }
}
