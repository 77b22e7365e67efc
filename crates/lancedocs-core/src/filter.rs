//! Structured filter expressions.
//!
//! Filters are trees of comparison predicates joined with AND/OR/NOT.
//! They reference system fields (`id`, `content`) or declared metadata
//! fields (`meta.<path>`), and are translated into the engine's native
//! predicate syntax by the store layer -- callers never pass raw query
//! strings.

use serde::{Deserialize, Serialize};

use crate::document::MetaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Contains,
}

/// A filter expression tree.
///
/// `Not` negates the conjunction of its conditions: `Not([a, b])` means
/// `NOT (a AND b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Compare {
        field: String,
        op: CompareOp,
        value: MetaValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Vec<Filter>),
}

impl Filter {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<MetaValue>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `field IN (values...)`.
    pub fn is_in<V: Into<MetaValue>>(field: impl Into<String>, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::compare(field, CompareOp::In, MetaValue::List(values))
    }

    /// Membership test against a list-typed field.
    pub fn contains(field: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::compare(field, CompareOp::Contains, value)
    }

    pub fn all_of(conditions: Vec<Filter>) -> Self {
        Filter::And(conditions)
    }

    pub fn any_of(conditions: Vec<Filter>) -> Self {
        Filter::Or(conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_expected_tree() {
        let f = Filter::all_of(vec![
            Filter::gt("meta.page", 5i64),
            Filter::contains("meta.topics", "history"),
        ]);
        match f {
            Filter::And(conditions) => {
                assert_eq!(conditions.len(), 2);
                assert!(matches!(
                    &conditions[0],
                    Filter::Compare { op: CompareOp::Gt, .. }
                ));
                assert!(matches!(
                    &conditions[1],
                    Filter::Compare { op: CompareOp::Contains, .. }
                ));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn json_round_trip() {
        let f = Filter::Not(vec![Filter::eq("meta.name", "name_0")]);
        let json = serde_json::to_string(&f).expect("serialize");
        let back: Filter = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, f);
    }
}
