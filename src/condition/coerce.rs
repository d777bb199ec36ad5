//! Loose and strict comparison rules.
//!
//! Row values come from arbitrary JSON while the right-hand side of a
//! condition is always a number or a string literal. Strict operators
//! require matching types. Loose operators and the relational ones coerce
//! booleans, null and numeric strings to numbers first, and compare two
//! strings lexicographically by UTF-16 code unit.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use crate::values::{format_number, to_display_string};

use super::Operator;

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    /// Strip one pair of matching quotes, then read the text as a number
    /// only if it formats back to exactly the same text (`"5"` is a number,
    /// `"05"` and `"5.0"` stay strings).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let unquoted = strip_quotes(trimmed);

        let number = string_to_number(unquoted);
        if !number.is_nan() && format_number(number) == unquoted {
            Literal::Number(number)
        } else {
            Literal::Text(unquoted.to_string())
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// A row value reduced to a primitive. `None` inputs (missing fields)
/// become `Undefined`, containers become their string form.
enum Primitive<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Cow<'a, str>),
}

impl<'a> Primitive<'a> {
    fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            None => Primitive::Undefined,
            Some(Value::Null) => Primitive::Null,
            Some(Value::Bool(b)) => Primitive::Bool(*b),
            Some(Value::Number(n)) => Primitive::Number(n.as_f64().unwrap_or(f64::NAN)),
            Some(Value::String(s)) => Primitive::Text(Cow::Borrowed(s)),
            Some(other) => Primitive::Text(Cow::Owned(to_display_string(other))),
        }
    }

    fn from_literal(literal: &'a Literal) -> Self {
        match literal {
            Literal::Number(n) => Primitive::Number(*n),
            Literal::Text(s) => Primitive::Text(Cow::Borrowed(s)),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Primitive::Undefined => f64::NAN,
            Primitive::Null => 0.0,
            Primitive::Bool(b) => f64::from(u8::from(*b)),
            Primitive::Number(n) => *n,
            Primitive::Text(s) => string_to_number(s),
        }
    }
}

/// Numeric reading of a string: surrounding whitespace is ignored, the
/// empty string is zero, `0x`/`0o`/`0b` prefixes and `Infinity` are
/// accepted, anything else that is not a decimal literal is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    // `f64::from_str` also accepts "inf" and "nan", which must stay NaN here.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Apply `op` with the row value on the left and the literal on the right.
pub fn compare(left: Option<&Value>, op: Operator, right: &Literal) -> bool {
    match op {
        Operator::StrictEq => strict_equals(left, right),
        Operator::StrictNe => !strict_equals(left, right),
        Operator::LooseEq => loose_equals(left, right),
        Operator::LooseNe => !loose_equals(left, right),
        Operator::Gt => relational(left, right).is_some_and(|o| o == Ordering::Greater),
        Operator::Lt => relational(left, right).is_some_and(|o| o == Ordering::Less),
        Operator::Ge => relational(left, right).is_some_and(|o| o != Ordering::Less),
        Operator::Le => relational(left, right).is_some_and(|o| o != Ordering::Greater),
    }
}

fn strict_equals(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::Number(n)), Literal::Number(r)) => n.as_f64() == Some(*r),
        (Some(Value::String(s)), Literal::Text(r)) => s == r,
        _ => false,
    }
}

fn loose_equals(left: Option<&Value>, right: &Literal) -> bool {
    let left = Primitive::from_value(left);
    let right = Primitive::from_literal(right);

    match (&left, &right) {
        (Primitive::Undefined | Primitive::Null, _) => false,
        (Primitive::Text(l), Primitive::Text(r)) => l == r,
        _ => left.to_number() == right.to_number(),
    }
}

/// Ordering for the relational operators; `None` when either side is NaN
/// after coercion, which makes every relational comparison false.
fn relational(left: Option<&Value>, right: &Literal) -> Option<Ordering> {
    let left = Primitive::from_value(left);
    let right = Primitive::from_literal(right);

    if let (Primitive::Text(l), Primitive::Text(r)) = (&left, &right) {
        return Some(l.encode_utf16().cmp(r.encode_utf16()));
    }
    left.to_number().partial_cmp(&right.to_number())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_numbers_must_round_trip() {
        assert_eq!(Literal::parse("5"), Literal::Number(5.0));
        assert_eq!(Literal::parse("'5'"), Literal::Number(5.0));
        assert_eq!(Literal::parse("-2.5"), Literal::Number(-2.5));
        assert_eq!(Literal::parse("05"), Literal::Text("05".into()));
        assert_eq!(Literal::parse("5.0"), Literal::Text("5.0".into()));
        assert_eq!(Literal::parse("''"), Literal::Text(String::new()));
        assert_eq!(Literal::parse("\"active\""), Literal::Text("active".into()));
        assert_eq!(Literal::parse("'mixed\""), Literal::Text("'mixed\"".into()));
    }

    #[test]
    fn string_to_number_rejects_non_decimal_words() {
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("nan").is_nan());
        assert!(string_to_number("12abc").is_nan());
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
    }

    #[test]
    fn strict_equality_does_not_coerce() {
        let five = json!(5);
        let text = json!("5");
        assert!(compare(Some(&five), Operator::StrictEq, &Literal::Number(5.0)));
        assert!(!compare(Some(&text), Operator::StrictEq, &Literal::Number(5.0)));
        assert!(compare(Some(&text), Operator::StrictNe, &Literal::Number(5.0)));
    }

    #[test]
    fn loose_equality_coerces() {
        let text = json!("5");
        let truth = json!(true);
        let null = Value::Null;
        assert!(compare(Some(&text), Operator::LooseEq, &Literal::Number(5.0)));
        assert!(compare(Some(&truth), Operator::LooseEq, &Literal::Number(1.0)));
        assert!(compare(Some(&json!(5)), Operator::LooseEq, &Literal::Text("5.0".into())));
        assert!(!compare(Some(&null), Operator::LooseEq, &Literal::Number(0.0)));
        assert!(!compare(None, Operator::LooseEq, &Literal::Text("undefined".into())));
        assert!(compare(None, Operator::LooseNe, &Literal::Number(1.0)));
    }

    #[test]
    fn relational_comparisons() {
        let seven = json!(7);
        let null = Value::Null;
        let word = json!("banana");
        assert!(compare(Some(&seven), Operator::Gt, &Literal::Number(5.0)));
        assert!(compare(Some(&seven), Operator::Ge, &Literal::Number(7.0)));
        assert!(!compare(Some(&seven), Operator::Lt, &Literal::Number(7.0)));
        assert!(compare(Some(&null), Operator::Gt, &Literal::Number(-1.0)));
        assert!(!compare(None, Operator::Gt, &Literal::Number(-1.0)));
        assert!(!compare(None, Operator::Le, &Literal::Number(-1.0)));
        assert!(compare(Some(&word), Operator::Gt, &Literal::Text("apple".into())));
        assert!(!compare(Some(&word), Operator::Gt, &Literal::Number(1.0)));
    }
}
