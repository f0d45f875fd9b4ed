use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::f64_to_property_string;

/// A primitive value stored in an [crate::EvaluationContext] property map.
///
/// Constraints compare against the stringified form of the value, see
/// [AttributeValue::to_property_string].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Stores a string value.
    String(String),
    /// Stores a number.
    Number(f64),
    /// Stores a boolean.
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> AttributeValue {
        AttributeValue::String(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> AttributeValue {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> AttributeValue {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Number(i as f64)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Number(f)
    }
}

impl AttributeValue {
    /// Converts a JSON value into a property value. Objects, arrays and nulls have no primitive
    /// representation and yield None.
    pub fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(AttributeValue::Bool(*b)),
            Value::Number(n) => match n.as_f64() {
                Some(float) => Some(AttributeValue::Number(float)),
                None => {
                    warn!("could not interpret '{:?}' as f64", n);
                    Some(AttributeValue::String(n.to_string()))
                }
            },
            Value::String(s) => Some(AttributeValue::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns None unless self is a String. It will not convert.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The string every constraint operator compares against.
    pub fn to_property_string(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Number(f) => f64_to_property_string(*f),
            AttributeValue::Bool(b) => b.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeValue;
    use serde_json::json;
    use spectral::prelude::*;

    #[test]
    fn deserialization() {
        fn test_case(json: &str, expected: AttributeValue) {
            assert_eq!(
                serde_json::from_str::<AttributeValue>(json).unwrap(),
                expected
            );
        }

        test_case("1.0", AttributeValue::Number(1.0));
        test_case("1", AttributeValue::Number(1.0));
        test_case("true", AttributeValue::Bool(true));
        test_case("\"foo\"", AttributeValue::String("foo".to_string()));
    }

    #[test]
    fn stringification() {
        assert_that!(AttributeValue::from("beta").to_property_string()).is_equal_to("beta".to_string());
        assert_that!(AttributeValue::from(7_i64).to_property_string()).is_equal_to("7".to_string());
        assert_that!(AttributeValue::from(7.5).to_property_string()).is_equal_to("7.5".to_string());
        assert_that!(AttributeValue::from(false).to_property_string()).is_equal_to("false".to_string());
    }

    #[test]
    fn from_json_rejects_composites() {
        assert_that!(AttributeValue::from_json(&json!("x"))).is_some();
        assert_that!(AttributeValue::from_json(&json!(3))).contains_value(AttributeValue::Number(3.0));
        assert_that!(AttributeValue::from_json(&json!(null))).is_none();
        assert_that!(AttributeValue::from_json(&json!([1, 2]))).is_none();
        assert_that!(AttributeValue::from_json(&json!({"a": 1}))).is_none();
    }
}
