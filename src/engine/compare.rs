//! Value comparison rules for the local engine
//!
//! No type coercion: a string never equals a number. Integers and floats are
//! both numbers and compare numerically.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Equality and ordering over JSON values
pub struct ValueOrdering;

impl ValueOrdering {
    /// Exact equality, numeric-aware
    pub fn equals(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                Self::compare_numbers(x, y) == Some(Ordering::Equal)
            }
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| Self::equals(x, y))
            }
            (Value::Object(xs), Value::Object(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .all(|(k, x)| ys.get(k).map_or(false, |y| Self::equals(x, y)))
            }
            _ => a == b,
        }
    }

    /// Partial ordering for comparison operators.
    ///
    /// Only numbers, strings and booleans are ordered. Anything else,
    /// including null, yields `None`.
    pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Self::compare_numbers(x, y),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }

    /// Total ordering for sorting.
    ///
    /// Ordering rules:
    /// - null < bool < number < string < array < object
    /// - For same types, natural ordering
    pub fn sort_order(a: &Value, b: &Value) -> Ordering {
        let a_rank = Self::type_rank(a);
        let b_rank = Self::type_rank(b);
        if a_rank != b_rank {
            return a_rank.cmp(&b_rank);
        }
        match (a, b) {
            (Value::Array(xs), Value::Array(ys)) => {
                for (x, y) in xs.iter().zip(ys) {
                    let ord = Self::sort_order(x, y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                xs.len().cmp(&ys.len())
            }
            _ => Self::compare(a, b).unwrap_or(Ordering::Equal),
        }
    }

    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return Some(x.cmp(&y));
        }
        if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
            return Some(x.cmp(&y));
        }
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_type_coercion() {
        assert!(!ValueOrdering::equals(&json!("123"), &json!(123)));
        assert!(ValueOrdering::equals(&json!(123), &json!(123)));
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        assert!(ValueOrdering::equals(&json!(2), &json!(2.0)));
        assert_eq!(
            ValueOrdering::compare(&json!(2), &json!(2.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_null_is_unordered() {
        assert_eq!(ValueOrdering::compare(&json!(null), &json!(1)), None);
        assert!(ValueOrdering::equals(&json!(null), &json!(null)));
    }

    #[test]
    fn test_sort_order_across_types() {
        let mut values = vec![json!("b"), json!(3), json!(null), json!(true), json!("a")];
        values.sort_by(ValueOrdering::sort_order);
        assert_eq!(
            values,
            vec![json!(null), json!(true), json!(3), json!("a"), json!("b")]
        );
    }

    #[test]
    fn test_object_equality_ignores_key_order() {
        let a = json!({"id": 1, "name": "a"});
        let b = json!({"name": "a", "id": 1.0});
        assert!(ValueOrdering::equals(&a, &b));
    }
}
