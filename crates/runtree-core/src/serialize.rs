//! Stateless serialization helpers shared by the tree and its collaborators.
//!
//! - [`serialize_configuration`] renders a worker configuration canonically.
//! - [`serialize_error`] reduces an arbitrary error value, possibly cyclic,
//!   to plain JSON.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::suite::ConfigurationEntry;

/// Render a configuration as `name1=value1, name2=value2`.
pub fn serialize_configuration(configuration: &[ConfigurationEntry]) -> String {
    configuration
        .iter()
        .map(|entry| format!("{}={}", entry.name, entry.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The JSON shape of a native error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

/// A dynamically typed value thrown or reported by a test body.
///
/// Arrays and objects are shared handles so values can form arbitrary
/// graphs, including cycles.
#[derive(Debug, Clone)]
pub enum ErrorValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A native error with a message and an optional stack trace.
    Native {
        message: String,
        stack: Option<String>,
    },
    Array(Rc<RefCell<Vec<ErrorValue>>>),
    Object(Rc<RefCell<Vec<(String, ErrorValue)>>>),
}

impl ErrorValue {
    pub fn array() -> Self {
        ErrorValue::Array(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn object() -> Self {
        ErrorValue::Object(Rc::new(RefCell::new(Vec::new())))
    }

    /// Append an element. No-op unless `self` is an array.
    pub fn push(&self, value: ErrorValue) {
        if let ErrorValue::Array(items) = self {
            items.borrow_mut().push(value);
        }
    }

    /// Set a property, replacing an existing one with the same key. No-op
    /// unless `self` is an object.
    pub fn insert(&self, key: impl Into<String>, value: ErrorValue) {
        if let ErrorValue::Object(fields) = self {
            let key = key.into();
            let mut fields = fields.borrow_mut();
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = value,
                None => fields.push((key, value)),
            }
        }
    }

    /// Build a native error from an `anyhow::Error`; the stack holds the
    /// cause chain.
    pub fn from_error(error: &anyhow::Error) -> Self {
        ErrorValue::Native {
            message: error.to_string(),
            stack: Some(format!("{error:?}")),
        }
    }

    /// Address of the shared container, used for cycle detection.
    fn identity(&self) -> Option<usize> {
        match self {
            ErrorValue::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            ErrorValue::Object(fields) => Some(Rc::as_ptr(fields) as *const () as usize),
            _ => None,
        }
    }

    /// Fixed token used in place of a container seen before. Contents are
    /// never rendered, so the token is the same for every array or object.
    fn placeholder(&self) -> String {
        match self {
            ErrorValue::Array(_) => "[object Array]".to_string(),
            _ => "[object Object]".to_string(),
        }
    }
}

impl From<&str> for ErrorValue {
    fn from(s: &str) -> Self {
        ErrorValue::String(s.to_string())
    }
}

impl From<String> for ErrorValue {
    fn from(s: String) -> Self {
        ErrorValue::String(s)
    }
}

impl From<f64> for ErrorValue {
    fn from(n: f64) -> Self {
        ErrorValue::Number(n)
    }
}

impl From<bool> for ErrorValue {
    fn from(b: bool) -> Self {
        ErrorValue::Bool(b)
    }
}

/// Reduce an error value to acyclic JSON.
///
/// Native errors become `{message, stack}`. Other values are deep-copied;
/// any array or object reached a second time during the same call is
/// replaced by a fixed string token instead of being traversed again:
/// `"[object Array]"` for arrays and `"[object Object]"` for objects. The
/// token does not depend on the container's contents.
pub fn serialize_error(value: &ErrorValue) -> Value {
    if let ErrorValue::Native { message, stack } = value {
        return native_to_json(message, stack.as_deref());
    }
    let mut visited = HashSet::new();
    copy_acyclic(value, &mut visited)
}

fn native_to_json(message: &str, stack: Option<&str>) -> Value {
    serde_json::to_value(SerializedError {
        message: message.to_string(),
        stack: stack.map(str::to_string),
    })
    .unwrap_or(Value::Null)
}

fn copy_acyclic(value: &ErrorValue, visited: &mut HashSet<usize>) -> Value {
    if let Some(identity) = value.identity() {
        if !visited.insert(identity) {
            return Value::String(value.placeholder());
        }
    }
    match value {
        ErrorValue::Null => Value::Null,
        ErrorValue::Bool(b) => Value::Bool(*b),
        ErrorValue::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        ErrorValue::String(s) => Value::String(s.clone()),
        ErrorValue::Native { message, stack } => native_to_json(message, stack.as_deref()),
        ErrorValue::Array(items) => Value::Array(
            items
                .borrow()
                .iter()
                .map(|item| copy_acyclic(item, visited))
                .collect(),
        ),
        ErrorValue::Object(fields) => {
            let mut map = Map::new();
            for (key, field) in fields.borrow().iter() {
                map.insert(key.clone(), copy_acyclic(field, visited));
            }
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, value: &str) -> ConfigurationEntry {
        ConfigurationEntry {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn configuration_string() {
        let config = vec![entry("browser", "chromium"), entry("os", "linux")];
        assert_eq!(serialize_configuration(&config), "browser=chromium, os=linux");
        assert_eq!(serialize_configuration(&[]), "");
        assert_eq!(serialize_configuration(&[entry("mode", "headed")]), "mode=headed");
    }

    #[test]
    fn native_error_keeps_message_and_stack() {
        let err = ErrorValue::Native {
            message: "expected 1, got 2".into(),
            stack: Some("at login.spec:4".into()),
        };
        assert_eq!(
            serialize_error(&err),
            json!({"message": "expected 1, got 2", "stack": "at login.spec:4"})
        );
    }

    #[test]
    fn anyhow_error_carries_cause_chain() {
        let err = anyhow::anyhow!("socket closed").context("fetching fixture");
        let value = serialize_error(&ErrorValue::from_error(&err));
        assert_eq!(value["message"], "fetching fixture");
        assert!(value["stack"].as_str().unwrap().contains("socket closed"));
    }

    #[test]
    fn plain_values_are_deep_copied() {
        let obj = ErrorValue::object();
        obj.insert("code", 42.0.into());
        let list = ErrorValue::array();
        list.push("a".into());
        list.push(ErrorValue::Null);
        obj.insert("items", list);
        obj.insert("ok", false.into());

        assert_eq!(
            serialize_error(&obj),
            json!({"code": 42.0, "items": ["a", null], "ok": false})
        );
    }

    #[test]
    fn self_reference_is_replaced_by_string() {
        let obj = ErrorValue::object();
        obj.insert("name", "boom".into());
        obj.insert("self", obj.clone());

        let value = serialize_error(&obj);
        assert_eq!(value, json!({"name": "boom", "self": "[object Object]"}));
        let text = serde_json::to_string(&value).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, value);
    }

    #[test]
    fn indirect_cycle_through_array_terminates() {
        let obj = ErrorValue::object();
        let list = ErrorValue::array();
        list.push(obj.clone());
        obj.insert("children", list.clone());

        let value = serialize_error(&list);
        assert_eq!(value, json!([{"children": "[object Array]"}]));
    }

    #[test]
    fn revisited_array_is_a_fixed_token_not_its_elements() {
        let shared = ErrorValue::array();
        shared.push("x".into());
        shared.push(1.0.into());
        let obj = ErrorValue::object();
        obj.insert("first", shared.clone());
        obj.insert("second", shared);

        assert_eq!(
            serialize_error(&obj),
            json!({"first": ["x", 1.0], "second": "[object Array]"})
        );
    }

    #[test]
    fn non_finite_numbers_become_null() {
        assert_eq!(serialize_error(&ErrorValue::Number(f64::NAN)), Value::Null);
    }
}
