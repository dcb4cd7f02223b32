// ABOUTME: Per-scan container reports and the serialized container view.
// ABOUTME: The view adds derived fields; flatten turns it into snake_case key/value pairs.

use super::Container;
use super::update::{link, result_link};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of one scan for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerReport {
    pub container: Container,
    /// First observation, or a result change that shows an available update.
    pub changed: bool,
}

impl Serialize for ContainerReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ContainerReport", 2)?;
        state.serialize_field("container", &view(&self.container))?;
        state.serialize_field("changed", &self.changed)?;
        state.end()
    }
}

/// The container as exposed to consumers, derived fields included.
pub fn view(container: &Container) -> Value {
    let mut value = match serde_json::to_value(container) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(container = %container.full_name(), "cannot serialize container: {e}");
            return Value::Null;
        }
    };
    if let Value::Object(ref mut fields) = value {
        fields.insert(
            "updateAvailable".to_string(),
            Value::Bool(container.update_available()),
        );
        fields.insert(
            "updateKind".to_string(),
            serde_json::to_value(container.update_kind()).unwrap_or(Value::Null),
        );
        if let Some(link) = link(container) {
            fields.insert("link".to_string(), Value::String(link));
        }
        if let (Some(link), Some(Value::Object(result))) =
            (result_link(container), fields.get_mut("result"))
        {
            result.insert("link".to_string(), Value::String(link));
        }
    }
    value
}

/// Flatten the container view into `snake_case` paths joined with `_`.
///
/// `image.tag.value` becomes `image_tag_value`; nulls are skipped.
pub fn flatten(container: &Container) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Value::Object(fields) = view(container) {
        flatten_object("", &fields, &mut out);
    }
    out
}

fn flatten_object(prefix: &str, fields: &Map<String, Value>, out: &mut BTreeMap<String, String>) {
    for (key, value) in fields {
        let key = if prefix.is_empty() {
            snake_case(key)
        } else {
            format!("{prefix}_{}", snake_case(key))
        };
        flatten_value(key, value, out);
    }
}

fn flatten_value(key: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key, b.to_string());
        }
        Value::Number(n) => {
            out.insert(key, n.to_string());
        }
        Value::String(s) => {
            out.insert(key, s.clone());
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(format!("{key}_{index}"), item, out);
            }
        }
        Value::Object(fields) => flatten_object(&key, fields, out),
    }
}

/// Map a dotted camelCase field path (`image.registry.name`) to its flattened key.
pub fn flatten_key(path: &str) -> String {
    snake_case(path)
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '.' || c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}
