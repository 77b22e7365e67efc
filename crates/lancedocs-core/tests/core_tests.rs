use std::path::Path;

use lancedocs_core::config::{expand_path, resolve_with_base};
use lancedocs_core::{Document, Meta, MetaField, MetaType, MetaValue, MetadataSchema};

#[test]
fn document_ids_are_stable_across_construction_order() {
    let mut m1 = Meta::new();
    m1.insert("a".to_string(), MetaValue::Int(1));
    m1.insert("b".to_string(), MetaValue::from("x"));

    // Same pairs inserted in the opposite order hash identically.
    let mut m2 = Meta::new();
    m2.insert("b".to_string(), MetaValue::from("x"));
    m2.insert("a".to_string(), MetaValue::Int(1));

    assert_eq!(
        Document::new("text", m1).id,
        Document::new("text", m2).id
    );
}

#[test]
fn explicit_id_is_kept() {
    let doc = Document::with_id("doc-1", "text", Meta::new());
    assert_eq!(doc.id, "doc-1");
}

#[test]
fn schema_round_trips_through_json() {
    let schema = MetadataSchema::new(vec![
        MetaField::new("name", MetaType::Str),
        MetaField::new("pages", MetaType::list(MetaType::Int)),
        MetaField::new(
            "origin",
            MetaType::Struct(vec![MetaField::new("source", MetaType::Str)]),
        ),
    ]);
    let json = serde_json::to_string_pretty(&schema).expect("serialize");
    let back: MetadataSchema = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, schema);
}

#[test]
fn document_round_trips_through_json() {
    let mut meta = Meta::new();
    meta.insert("page".to_string(), MetaValue::Int(7));
    let doc = Document::new("hello", meta).with_embedding(vec![0.5, 0.25]);
    let json = serde_json::to_string(&doc).expect("serialize");
    let back: Document = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, doc);
}

#[test]
fn expand_and_resolve_paths() {
    let p = expand_path("data/indexes");
    assert!(p.is_relative());
    let resolved = resolve_with_base(Path::new("/srv/app"), "data/indexes");
    assert_eq!(resolved, Path::new("/srv/app/data/indexes"));
    let absolute = resolve_with_base(Path::new("/srv/app"), "/var/db");
    assert_eq!(absolute, Path::new("/var/db"));
}
