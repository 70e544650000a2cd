/// Type Registry - best-effort coercion and type-aware equality
///
/// **Rules:**
/// - Coercion never fails. A value that cannot be converted is returned
///   unchanged so the comparison fails later instead of aborting a batch.
/// - Coercion never mutates its input; it always builds a new value.
/// - Equality coerces both sides first, then compares.
/// - Dict equality ignores key order, list equality does not.
/// - Integers compare exactly, mixed int/float compare by `f64` value.

use crate::types::TypeTag;
use serde_json::{Number, Value};

const NULL_TOKENS: [&str; 3] = ["", "null", "None"];

impl TypeTag {
    /// Convert a loosely-typed value into this tag's canonical representation.
    pub fn coerce(&self, raw: &Value) -> Value {
        match self {
            TypeTag::Int => coerce_int(raw),
            TypeTag::Float => coerce_float(raw),
            TypeTag::Str => coerce_str(raw),
            TypeTag::Bool => coerce_bool(raw),
            TypeTag::List => coerce_json(raw, Value::is_array),
            TypeTag::Dict => coerce_json(raw, Value::is_object),
            TypeTag::None => coerce_none(raw),
        }
    }

    /// Type-aware equality of two loosely-typed values.
    pub fn equal(&self, a: &Value, b: &Value) -> bool {
        let a = self.coerce(a);
        let b = self.coerce(b);

        match self {
            TypeTag::None => a.is_null() && b.is_null(),
            TypeTag::Str | TypeTag::Bool => a == b,
            TypeTag::Int | TypeTag::Float | TypeTag::List | TypeTag::Dict => deep_equal(&a, &b),
        }
    }
}

/// Whether a value is one of the accepted "no value" forms.
pub fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => NULL_TOKENS.contains(&s.trim()),
        _ => false,
    }
}

fn coerce_int(raw: &Value) -> Value {
    match raw {
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => canonical_big_int(s).map(Value::String).unwrap_or_else(|| raw.clone()),
        },
        _ => raw.clone(),
    }
}

/// Integers outside the `i64` range stay textual, normalized to an optional
/// `-` followed by digits without leading zeros.
fn canonical_big_int(text: &str) -> Option<String> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some("0".to_string());
    }
    Some(if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    })
}

fn coerce_float(raw: &Value) -> Value {
    let parsed = match raw {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| raw.clone())
}

fn coerce_str(raw: &Value) -> Value {
    match raw {
        Value::String(_) => raw.clone(),
        other => Value::String(other.to_string()),
    }
}

fn coerce_bool(raw: &Value) -> Value {
    match raw {
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw.clone(),
        },
        _ => raw.clone(),
    }
}

fn coerce_json(raw: &Value, accepts: fn(&Value) -> bool) -> Value {
    match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) if accepts(&parsed) => parsed,
            _ => raw.clone(),
        },
        _ => raw.clone(),
    }
}

fn coerce_none(raw: &Value) -> Value {
    if is_null_like(raw) {
        Value::Null
    } else {
        raw.clone()
    }
}

/// Structural equality with numeric normalization.
///
/// `serde_json::Map` is ordered by key, so object comparison never depends on
/// insertion order.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn representative_values() -> Vec<Value> {
        vec![
            json!("42"),
            json!(" 7 "),
            json!("3.5"),
            json!("abc"),
            json!("True"),
            json!("false"),
            json!("[1, 2, 3]"),
            json!("{\"b\": 2, \"a\": 1}"),
            json!("not json"),
            json!(""),
            json!("null"),
            json!("None"),
            json!("1180591620717411303424"),
            json!("-000123456789012345678901"),
            json!(12),
            json!(2.25),
            json!(true),
            json!([1, "x", null]),
            json!({"k": [1, 2]}),
            Value::Null,
        ]
    }

    #[test]
    fn test_coercion_is_idempotent() {
        for tag in TypeTag::ALL {
            for value in representative_values() {
                let once = tag.coerce(&value);
                let twice = tag.coerce(&once);
                assert_eq!(once, twice, "tag {} value {}", tag, value);
            }
        }
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(TypeTag::Int.coerce(&json!("2")), json!(2));
        assert_eq!(TypeTag::Int.coerce(&json!(" -17 ")), json!(-17));
        assert_eq!(TypeTag::Int.coerce(&json!(9)), json!(9));
        assert_eq!(TypeTag::Int.coerce(&json!("two")), json!("two"));
        assert_eq!(TypeTag::Int.coerce(&json!("2.5")), json!("2.5"));
    }

    #[test]
    fn test_big_int_outside_i64() {
        let big = "1180591620717411303424";
        assert_eq!(TypeTag::Int.coerce(&json!(big)), json!(big));
        assert_eq!(TypeTag::Int.coerce(&json!(" +0001180591620717411303424 ")), json!(big));
        assert_eq!(
            TypeTag::Int.coerce(&json!("-99999999999999999999")),
            json!("-99999999999999999999")
        );

        assert!(TypeTag::Int.equal(&json!(big), &json!("+1180591620717411303424")));
        assert!(!TypeTag::Int.equal(&json!(big), &json!("1180591620717411303425")));
        assert!(!TypeTag::Int.equal(&json!(big), &json!("-1180591620717411303424")));
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(TypeTag::Float.coerce(&json!("2.5")), json!(2.5));
        assert_eq!(TypeTag::Float.coerce(&json!(3)), json!(3.0));
        assert_eq!(TypeTag::Float.coerce(&json!("nan")), json!("nan"));
        assert_eq!(TypeTag::Float.coerce(&json!("x")), json!("x"));
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(TypeTag::Bool.coerce(&json!("TRUE")), json!(true));
        assert_eq!(TypeTag::Bool.coerce(&json!("False")), json!(false));
        assert_eq!(TypeTag::Bool.coerce(&json!(true)), json!(true));
        assert_eq!(TypeTag::Bool.coerce(&json!("yes")), json!("yes"));
    }

    #[test]
    fn test_coerce_str() {
        assert_eq!(TypeTag::Str.coerce(&json!("hi")), json!("hi"));
        assert_eq!(TypeTag::Str.coerce(&json!(5)), json!("5"));
        assert_eq!(TypeTag::Str.coerce(&json!([1, 2])), json!("[1,2]"));
    }

    #[test]
    fn test_coerce_collections() {
        assert_eq!(TypeTag::List.coerce(&json!("[1, 2]")), json!([1, 2]));
        assert_eq!(TypeTag::List.coerce(&json!("{\"a\": 1}")), json!("{\"a\": 1}"));
        assert_eq!(TypeTag::List.coerce(&json!("[1,")), json!("[1,"));
        assert_eq!(TypeTag::Dict.coerce(&json!("{\"a\": 1}")), json!({"a": 1}));
        assert_eq!(TypeTag::Dict.coerce(&json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_coerce_none() {
        assert_eq!(TypeTag::None.coerce(&json!("")), Value::Null);
        assert_eq!(TypeTag::None.coerce(&json!("null")), Value::Null);
        assert_eq!(TypeTag::None.coerce(&json!("None")), Value::Null);
        assert_eq!(TypeTag::None.coerce(&Value::Null), Value::Null);
        assert_eq!(TypeTag::None.coerce(&json!("abc")), json!("abc"));
    }

    #[test]
    fn test_coerce_does_not_mutate_input() {
        let raw = json!("[3, 1]");
        let _ = TypeTag::List.coerce(&raw);
        assert_eq!(raw, json!("[3, 1]"));
    }

    #[test]
    fn test_dict_equality_ignores_key_order() {
        assert!(TypeTag::Dict.equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(TypeTag::Dict.equal(&json!("{\"x\": 1}"), &json!({"x": 1})));
        assert!(TypeTag::Dict.equal(&json!("{ \"b\" : 2,\n \"a\": 1 }"), &json!("{\"a\":1,\"b\":2}")));
        assert!(!TypeTag::Dict.equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_list_equality_is_order_sensitive() {
        assert!(!TypeTag::List.equal(&json!([1, 2]), &json!([2, 1])));
        assert!(TypeTag::List.equal(&json!("[1,  2]"), &json!([1, 2])));
        assert!(TypeTag::List.equal(&json!([1, 2.0]), &json!([1.0, 2])));
    }

    #[test]
    fn test_numeric_equality() {
        assert!(TypeTag::Int.equal(&json!("5"), &json!(5)));
        assert!(TypeTag::Int.equal(&json!(5.0), &json!("5")));
        assert!(!TypeTag::Int.equal(&json!("5"), &json!("6")));
        assert!(TypeTag::Float.equal(&json!("0.5"), &json!(0.5)));
        assert!(TypeTag::Float.equal(&json!(2), &json!("2.0")));
    }

    #[test]
    fn test_none_equality() {
        assert!(TypeTag::None.equal(&Value::Null, &json!("null")));
        assert!(TypeTag::None.equal(&json!(""), &json!("None")));
        assert!(!TypeTag::None.equal(&json!("abc"), &json!("abc")));
        assert!(!TypeTag::None.equal(&Value::Null, &json!(0)));
    }

    #[test]
    fn test_equality_is_symmetric() {
        let values = representative_values();
        for tag in TypeTag::ALL {
            for a in &values {
                for b in &values {
                    assert_eq!(tag.equal(a, b), tag.equal(b, a), "tag {} {} {}", tag, a, b);
                }
            }
        }
    }
}
