//! Declared metadata schema.
//!
//! A store's metadata layout is fixed at creation time as a structural
//! description (field name -> type). Every metadata field on any stored
//! document must appear here with a matching type; undeclared fields are
//! rejected at write time rather than silently dropped.

use serde::{Deserialize, Serialize};

use crate::document::{Meta, MetaValue};
use crate::error::{Result, SchemaError};

/// Column type for one metadata field. Closed sum of primitives plus
/// nested structs and lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaType {
    Bool,
    Int,
    Float,
    Str,
    List(Box<MetaType>),
    Struct(Vec<MetaField>),
}

impl MetaType {
    pub fn list(inner: MetaType) -> Self {
        MetaType::List(Box::new(inner))
    }

    /// Display name used in error messages.
    pub fn name(&self) -> String {
        match self {
            MetaType::Bool => "bool".to_string(),
            MetaType::Int => "int".to_string(),
            MetaType::Float => "float".to_string(),
            MetaType::Str => "str".to_string(),
            MetaType::List(inner) => format!("list<{}>", inner.name()),
            MetaType::Struct(_) => "struct".to_string(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            MetaType::Bool | MetaType::Int | MetaType::Float | MetaType::Str
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: MetaType,
}

impl MetaField {
    pub fn new(name: impl Into<String>, ty: MetaType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The caller-declared metadata schema for one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataSchema {
    pub fields: Vec<MetaField>,
}

impl MetadataSchema {
    pub fn new(fields: Vec<MetaField>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&MetaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a dotted path (e.g. `"attrs.depth"`) to the declared type,
    /// descending into nested structs.
    pub fn resolve(&self, path: &str) -> Option<&MetaType> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut ty = &self.field(first)?.ty;
        for part in parts {
            match ty {
                MetaType::Struct(fields) => {
                    ty = &fields.iter().find(|f| f.name == part)?.ty;
                }
                _ => return None,
            }
        }
        Some(ty)
    }

    /// Check the declaration itself: non-empty field names without dots,
    /// no duplicate siblings, no empty structs.
    pub fn validate_declaration(&self) -> Result<()> {
        check_declared_fields(&self.fields)
    }

    /// Check one document's metadata against this schema.
    ///
    /// Declared fields may be absent (they are stored as null); present
    /// fields must match their declared type exactly, and undeclared
    /// fields are an error.
    pub fn validate(&self, meta: &Meta) -> Result<()> {
        validate_struct(&self.fields, meta, "")
    }
}

fn check_declared_fields(fields: &[MetaField]) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for field in fields {
        if field.name.is_empty() || field.name.contains('.') {
            return Err(SchemaError::InvalidDeclaration(format!(
                "bad field name '{}'",
                field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::InvalidDeclaration(format!(
                "duplicate field '{}'",
                field.name
            )));
        }
        check_declared_type(&field.ty, &field.name)?;
    }
    Ok(())
}

fn check_declared_type(ty: &MetaType, name: &str) -> Result<()> {
    match ty {
        MetaType::List(inner) => check_declared_type(inner, name),
        MetaType::Struct(fields) => {
            if fields.is_empty() {
                return Err(SchemaError::InvalidDeclaration(format!(
                    "struct field '{name}' has no children"
                )));
            }
            check_declared_fields(fields)
        }
        _ => Ok(()),
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn validate_struct(fields: &[MetaField], values: &Meta, path: &str) -> Result<()> {
    for (key, value) in values {
        let Some(field) = fields.iter().find(|f| &f.name == key) else {
            return Err(SchemaError::UnknownField(join_path(path, key)));
        };
        validate_value(&field.ty, value, &join_path(path, key))?;
    }
    Ok(())
}

fn validate_value(ty: &MetaType, value: &MetaValue, path: &str) -> Result<()> {
    match (ty, value) {
        (MetaType::Bool, MetaValue::Bool(_))
        | (MetaType::Int, MetaValue::Int(_))
        | (MetaType::Float, MetaValue::Float(_))
        | (MetaType::Str, MetaValue::Str(_)) => Ok(()),
        (MetaType::List(inner), MetaValue::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(inner, item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        (MetaType::Struct(fields), MetaValue::Struct(map)) => validate_struct(fields, map, path),
        _ => Err(SchemaError::TypeMismatch {
            field: path.to_string(),
            expected: ty.name(),
            actual: value.kind().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> MetadataSchema {
        MetadataSchema::new(vec![
            MetaField::new("name", MetaType::Str),
            MetaField::new("page", MetaType::Int),
            MetaField::new("rating", MetaType::Float),
            MetaField::new("topics", MetaType::list(MetaType::Str)),
            MetaField::new(
                "origin",
                MetaType::Struct(vec![
                    MetaField::new("source", MetaType::Str),
                    MetaField::new("line", MetaType::Int),
                ]),
            ),
        ])
    }

    #[test]
    fn resolve_nested_path() {
        let s = schema();
        assert_eq!(s.resolve("origin.line"), Some(&MetaType::Int));
        assert_eq!(s.resolve("origin.missing"), None);
        assert_eq!(s.resolve("page.line"), None);
    }

    #[test]
    fn rejects_undeclared_field() {
        let s = schema();
        let mut meta = Meta::new();
        meta.insert("unknown".to_string(), MetaValue::Int(1));
        assert!(matches!(
            s.validate(&meta),
            Err(SchemaError::UnknownField(f)) if f == "unknown"
        ));
    }

    #[test]
    fn rejects_type_mismatch() {
        let s = schema();
        let mut meta = Meta::new();
        meta.insert("page".to_string(), MetaValue::Str("five".into()));
        assert!(matches!(
            s.validate(&meta),
            Err(SchemaError::TypeMismatch { field, .. }) if field == "page"
        ));
    }

    #[test]
    fn accepts_conforming_meta() {
        let s = schema();
        let mut origin = Meta::new();
        origin.insert("source".to_string(), MetaValue::from("book"));
        let mut meta = Meta::new();
        meta.insert("page".to_string(), MetaValue::Int(3));
        meta.insert(
            "topics".to_string(),
            MetaValue::List(vec![MetaValue::from("history")]),
        );
        meta.insert("origin".to_string(), MetaValue::Struct(origin));
        s.validate(&meta).expect("conforming metadata");
    }

    #[test]
    fn declaration_rejects_dotted_names() {
        let s = MetadataSchema::new(vec![MetaField::new("a.b", MetaType::Int)]);
        assert!(s.validate_declaration().is_err());
    }

    #[test]
    fn json_round_trip() {
        let s = schema();
        let json = serde_json::to_string(&s).expect("serialize");
        let back: MetadataSchema = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, s);
    }
}
