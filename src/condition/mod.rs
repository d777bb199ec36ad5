//! Restricted condition language used by the `filter_data` tool.
//!
//! Three shapes are recognised, tried in this order:
//!
//! 1. `field OP value` with a single identifier on the left,
//! 2. a bare property name, which tests that property's truthiness,
//! 3. `path.to.field OP value` with a dotted path on the left.
//!
//! `OP` is one of `>`, `<`, `>=`, `<=`, `===`, `==`, `!==`, `!=`. The value
//! is a quoted string or a bare token. Anything else evaluates to `false`
//! for every row; evaluation never fails.

mod coerce;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

pub use coerce::Literal;

// Longer operators come first so `>=` is never read as `>` followed by `=`.
// Earlier versions listed `>` first and silently failed `age >= 25`; keep this order.
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)\s*(>=|<=|===|!==|==|!=|>|<)\s*(.+)$").unwrap()
});
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)+)\s*(>=|<=|===|!==|==|!=|>|<)\s*(.+)$")
        .unwrap()
});

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Ge,
    Le,
    StrictEq,
    LooseEq,
    StrictNe,
    LooseNe,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "===" => Self::StrictEq,
            "==" => Self::LooseEq,
            "!==" => Self::StrictNe,
            "!=" => Self::LooseNe,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::StrictEq => "===",
            Self::LooseEq => "==",
            Self::StrictNe => "!==",
            Self::LooseNe => "!=",
        };
        f.write_str(token)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Comparison {
    path: Vec<String>,
    op: Operator,
    value: Literal,
}

impl Comparison {
    fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        Some(Self {
            path: caps[1].split('.').map(str::to_string).collect(),
            op: Operator::from_token(&caps[2])?,
            value: Literal::parse(&caps[3]),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Form {
    Field(Comparison),
    /// Property-name check first, then the dotted-path comparison if the
    /// text had that shape.
    Fallback { path: Option<Comparison> },
}

/// A parsed filter condition, reusable across rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    raw: String,
    form: Form,
}

impl Condition {
    pub fn parse(condition: &str) -> Self {
        let raw = condition.trim().to_string();

        let form = match FIELD_RE.captures(&raw).and_then(|c| Comparison::from_captures(&c)) {
            Some(comparison) => Form::Field(comparison),
            None => Form::Fallback {
                path: PATH_RE
                    .captures(&raw)
                    .and_then(|c| Comparison::from_captures(&c)),
            },
        };

        Self { raw, form }
    }

    /// The condition text after trimming.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the condition can match anything beyond rows that happen to
    /// carry a property named exactly like the whole condition text.
    pub fn is_structured(&self) -> bool {
        !matches!(self.form, Form::Fallback { path: None })
    }

    pub fn evaluate(&self, item: &Value) -> bool {
        match &self.form {
            Form::Field(comparison) => {
                let value = lookup(item, &comparison.path[0]);
                coerce::compare(value, comparison.op, &comparison.value)
            }
            Form::Fallback { path } => {
                if let Some(value) = item.as_object().and_then(|o| o.get(&self.raw)) {
                    return crate::values::truthy(value);
                }
                match path {
                    Some(comparison) => evaluate_path(item, comparison),
                    None => {
                        tracing::warn!(condition = %self.raw, "Could not parse condition");
                        false
                    }
                }
            }
        }
    }
}

/// Convenience wrapper for a single evaluation.
pub fn evaluate_condition(item: &Value, condition: &str) -> bool {
    Condition::parse(condition).evaluate(item)
}

/// Descend one level. Objects are indexed by key, arrays by position.
fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn evaluate_path(item: &Value, comparison: &Comparison) -> bool {
    let mut current = Some(item);
    for key in &comparison.path {
        match current {
            Some(value @ (Value::Object(_) | Value::Array(_))) => current = lookup(value, key),
            _ => return false,
        }
    }
    coerce::compare(current, comparison.op, &comparison.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_field_comparison() {
        assert!(evaluate_condition(&json!({"id": 7}), "id > 5"));
        assert!(!evaluate_condition(&json!({"id": 3}), "id > 5"));
    }

    #[test]
    fn quoted_string_equality() {
        assert!(evaluate_condition(&json!({"status": "active"}), "status === 'active'"));
        assert!(!evaluate_condition(&json!({"status": "inactive"}), "status === 'active'"));
        assert!(evaluate_condition(&json!({"status": "active"}), "status == \"active\""));
        assert!(evaluate_condition(&json!({"status": "inactive"}), "status !== 'active'"));
    }

    #[test]
    fn bare_property_is_a_truthiness_check() {
        assert!(evaluate_condition(&json!({"active": true}), "active"));
        assert!(!evaluate_condition(&json!({"active": false}), "active"));
        assert!(!evaluate_condition(&json!({"active": 0}), "active"));
        assert!(!evaluate_condition(&json!({"enabled": true}), "active"));
    }

    #[test]
    fn dotted_path_comparison() {
        let nyc = json!({"address": {"city": "NYC"}});
        let la = json!({"address": {"city": "LA"}});
        assert!(evaluate_condition(&nyc, "address.city === 'NYC'"));
        assert!(!evaluate_condition(&la, "address.city === 'NYC'"));
    }

    #[test]
    fn dotted_path_through_a_scalar_is_false() {
        let item = json!({"address": "somewhere"});
        assert!(!evaluate_condition(&item, "address.city != 'NYC'"));
        let item = json!({"address": null});
        assert!(!evaluate_condition(&item, "address.city !== 'NYC'"));
    }

    #[test]
    fn missing_leaf_compares_as_undefined() {
        let item = json!({"address": {}});
        assert!(evaluate_condition(&item, "address.city !== 'NYC'"));
        assert!(!evaluate_condition(&item, "address.city === 'NYC'"));
    }

    #[test]
    fn two_character_operators_are_not_split() {
        let Form::Field(comparison) = Condition::parse("age >= 25").form else {
            panic!("expected a field comparison");
        };
        assert_eq!(comparison.op, Operator::Ge);
        assert_eq!(comparison.value, Literal::Number(25.0));

        assert!(evaluate_condition(&json!({"age": 25}), "age >= 25"));
        assert!(evaluate_condition(&json!({"age": 25}), "age <= 25"));
        assert!(!evaluate_condition(&json!({"age": 24}), "age >= 25"));
    }

    #[test]
    fn unparseable_condition_is_false_for_every_row() {
        let condition = Condition::parse("???");
        assert!(!condition.is_structured());
        for row in [json!({"id": 1}), json!({}), json!(null), json!("???")] {
            assert!(!condition.evaluate(&row));
        }
    }

    #[test]
    fn method_calls_are_not_supported() {
        assert!(!evaluate_condition(
            &json!({"name": "John Smith"}),
            "name.includes(\"John\")"
        ));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let condition = Condition::parse("   id < 10  ");
        assert_eq!(condition.as_str(), "id < 10");
        assert!(condition.evaluate(&json!({"id": 2})));
    }
}
