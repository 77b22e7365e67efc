//! Translation of structured filters into LanceDB SQL predicates.
//!
//! Recursive descent over the filter tree. Every referenced field is
//! resolved against the declared metadata schema (or the system fields)
//! and the operator is checked against the field's type before anything
//! is rendered, so an invalid filter fails with `UnsupportedFilter`
//! instead of producing a predicate the engine would misinterpret.
//!
//! Ordering comparisons are supported on numeric columns only; there is
//! no lexical string ordering.

use lancedocs_core::{CompareOp, Filter, MetaType, MetaValue, MetadataSchema};

use crate::error::{Result, StoreError};
use crate::schema::{CONTENT_COL, ID_COL, META_COL};

/// Render a filter as a LanceDB `WHERE` predicate.
pub fn translate(filter: &Filter, schema: &MetadataSchema) -> Result<String> {
    match filter {
        Filter::And(conditions) => join(conditions, " AND ", schema),
        Filter::Or(conditions) => join(conditions, " OR ", schema),
        Filter::Not(conditions) => Ok(format!("NOT ({})", join(conditions, " AND ", schema)?)),
        Filter::Compare { field, op, value } => comparison(field, *op, value, schema),
    }
}

/// Quote a string literal, doubling any internal single quotes.
pub(crate) fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn join(conditions: &[Filter], separator: &str, schema: &MetadataSchema) -> Result<String> {
    if conditions.is_empty() {
        return Err(StoreError::UnsupportedFilter(
            "logical operator requires at least one condition".to_string(),
        ));
    }
    let rendered = conditions
        .iter()
        .map(|c| Ok(format!("({})", translate(c, schema)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(separator))
}

fn comparison(
    field: &str,
    op: CompareOp,
    value: &MetaValue,
    schema: &MetadataSchema,
) -> Result<String> {
    let ty = field_type(field, schema)?;
    match op {
        CompareOp::Eq => {
            check_primitive(field, &ty, value)?;
            Ok(format!("{field} = {}", literal(value)?))
        }
        CompareOp::Ne => {
            check_primitive(field, &ty, value)?;
            // IS DISTINCT FROM counts null-valued rows as different,
            // which a plain != would silently exclude.
            Ok(format!("{field} IS DISTINCT FROM {}", literal(value)?))
        }
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            if !matches!(ty, MetaType::Int | MetaType::Float) {
                return Err(StoreError::UnsupportedFilter(format!(
                    "ordering comparison on non-numeric field '{field}' ({})",
                    ty.name()
                )));
            }
            if !matches!(value, MetaValue::Int(_) | MetaValue::Float(_)) {
                return Err(StoreError::UnsupportedFilter(format!(
                    "ordering comparison on '{field}' requires a numeric value, got {}",
                    value.kind()
                )));
            }
            let symbol = match op {
                CompareOp::Gt => ">",
                CompareOp::Ge => ">=",
                CompareOp::Lt => "<",
                _ => "<=",
            };
            Ok(format!("{field} {symbol} {}", literal(value)?))
        }
        CompareOp::In => {
            let MetaValue::List(items) = value else {
                return Err(StoreError::UnsupportedFilter(format!(
                    "'in' on '{field}' requires a list value, got {}",
                    value.kind()
                )));
            };
            if items.is_empty() {
                return Err(StoreError::UnsupportedFilter(format!(
                    "'in' on '{field}' requires a non-empty list"
                )));
            }
            for item in items {
                check_primitive(field, &ty, item)?;
            }
            let rendered = items
                .iter()
                .map(literal)
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            Ok(format!("{field} IN ({rendered})"))
        }
        CompareOp::Contains => {
            let MetaType::List(element) = &ty else {
                return Err(StoreError::UnsupportedFilter(format!(
                    "'contains' on non-list field '{field}' ({})",
                    ty.name()
                )));
            };
            check_primitive(field, element, value)?;
            Ok(format!("array_has({field}, {})", literal(value)?))
        }
    }
}

/// Resolve a filter field to its declared type. System fields `id` and
/// `content` are strings; everything else must be a `meta.<path>` into
/// the declared schema.
fn field_type(field: &str, schema: &MetadataSchema) -> Result<MetaType> {
    if field == ID_COL || field == CONTENT_COL {
        return Ok(MetaType::Str);
    }
    if let Some(path) = field
        .strip_prefix(META_COL)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        return schema.resolve(path).cloned().ok_or_else(|| {
            StoreError::UnsupportedFilter(format!("unknown field '{field}'"))
        });
    }
    Err(StoreError::UnsupportedFilter(format!(
        "field '{field}' must be '{ID_COL}', '{CONTENT_COL}' or 'meta.<name>'"
    )))
}

fn check_primitive(field: &str, ty: &MetaType, value: &MetaValue) -> Result<()> {
    let compatible = match ty {
        MetaType::Bool => matches!(value, MetaValue::Bool(_)),
        MetaType::Int => matches!(value, MetaValue::Int(_)),
        // Integer literals are fine against float columns.
        MetaType::Float => matches!(value, MetaValue::Int(_) | MetaValue::Float(_)),
        MetaType::Str => matches!(value, MetaValue::Str(_)),
        MetaType::List(_) | MetaType::Struct(_) => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(StoreError::UnsupportedFilter(format!(
            "value of type {} is not comparable with field '{field}' ({})",
            value.kind(),
            ty.name()
        )))
    }
}

fn literal(value: &MetaValue) -> Result<String> {
    match value {
        MetaValue::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        MetaValue::Int(i) => Ok(i.to_string()),
        MetaValue::Float(f) => {
            if !f.is_finite() {
                return Err(StoreError::UnsupportedFilter(
                    "non-finite float in filter value".to_string(),
                ));
            }
            Ok(f.to_string())
        }
        MetaValue::Str(s) => Ok(string_literal(s)),
        MetaValue::List(_) | MetaValue::Struct(_) => Err(StoreError::UnsupportedFilter(format!(
            "{} values cannot be rendered as literals",
            value.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lancedocs_core::{Filter, MetaField};

    fn schema() -> MetadataSchema {
        MetadataSchema::new(vec![
            MetaField::new("name", MetaType::Str),
            MetaField::new("page_number", MetaType::Int),
            MetaField::new("rating", MetaType::Float),
            MetaField::new("topics", MetaType::list(MetaType::Str)),
            MetaField::new(
                "origin",
                MetaType::Struct(vec![MetaField::new("line", MetaType::Int)]),
            ),
        ])
    }

    #[test]
    fn numeric_and_membership_combine() {
        let filter = Filter::all_of(vec![
            Filter::gt("meta.page_number", 5i64),
            Filter::contains("meta.topics", "history"),
        ]);
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(
            sql,
            "(meta.page_number > 5) AND (array_has(meta.topics, 'history'))"
        );
    }

    #[test]
    fn ordering_on_string_is_unsupported() {
        let filter = Filter::gt("meta.name", "abc");
        assert!(matches!(
            translate(&filter, &schema()),
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn string_values_are_escaped() {
        let filter = Filter::eq("meta.name", "O'Brien");
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(sql, "meta.name = 'O''Brien'");
    }

    #[test]
    fn in_renders_value_list() {
        let filter = Filter::is_in("id", vec!["a", "b"]);
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(sql, "id IN ('a', 'b')");
    }

    #[test]
    fn not_negates_the_conjunction() {
        let filter = Filter::Not(vec![
            Filter::eq("meta.page_number", 100i64),
            Filter::eq("meta.name", "name_0"),
        ]);
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(
            sql,
            "NOT ((meta.page_number = 100) AND (meta.name = 'name_0'))"
        );
    }

    #[test]
    fn ne_uses_is_distinct_from() {
        let filter = Filter::ne("meta.name", "x");
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(sql, "meta.name IS DISTINCT FROM 'x'");
    }

    #[test]
    fn nested_struct_paths_resolve() {
        let filter = Filter::ge("meta.origin.line", 3i64);
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(sql, "meta.origin.line >= 3");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let filter = Filter::eq("meta.missing", 1i64);
        assert!(matches!(
            translate(&filter, &schema()),
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn bare_field_names_are_rejected() {
        let filter = Filter::eq("name", "x");
        assert!(matches!(
            translate(&filter, &schema()),
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn contains_on_scalar_field_is_rejected() {
        let filter = Filter::contains("meta.name", "x");
        assert!(matches!(
            translate(&filter, &schema()),
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn empty_logical_node_is_rejected() {
        assert!(matches!(
            translate(&Filter::And(vec![]), &schema()),
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn int_literal_allowed_on_float_column() {
        let filter = Filter::lt("meta.rating", 4i64);
        let sql = translate(&filter, &schema()).expect("translate");
        assert_eq!(sql, "meta.rating < 4");
    }
}
