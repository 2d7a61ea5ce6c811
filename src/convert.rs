use indexmap::IndexMap;

use crate::value::Value;

/// Wraps a JSON document into the runtime value system. Numbers become
/// integers when they round-trip exactly, floats otherwise.
pub fn to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::array(items.iter().map(to_value).collect())
        }
        serde_json::Value::Object(map) => {
            let mut object = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                object.insert(key.clone(), to_value(value));
            }
            Value::object(object)
        }
    }
}

/// Unwraps a runtime value back into JSON. Callables have no JSON form.
pub fn from_value(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Undefined | Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(n) => Ok(serde_json::Value::from(*n)),
        Value::Float(n) => Ok(serde_json::Value::from(*n)),
        Value::String(s) => Ok(serde_json::Value::String(s.to_string())),
        Value::Array(items) => {
            let mut array = Vec::with_capacity(items.borrow().len());
            for item in items.borrow().iter() {
                array.push(from_value(item)?);
            }
            Ok(serde_json::Value::Array(array))
        }
        Value::Object(map) => {
            let mut object = serde_json::Map::with_capacity(map.borrow().len());
            for (key, value) in map.borrow().iter() {
                object.insert(key.clone(), from_value(value)?);
            }
            Ok(serde_json::Value::Object(object))
        }
        Value::Function(_) | Value::Macro(_) => {
            Err(format!("a {} cannot be converted to JSON", value.kind_name()))
        }
    }
}
