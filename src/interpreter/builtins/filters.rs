use std::cmp::Ordering;

use crate::diagnostic::Span;
use crate::value::{CallArgs, Value};

use super::super::error::RuntimeError;

fn unsupported(name: &str, value: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(
        format!("cannot apply filter `{}` to a {}", name, value.kind_name()),
        span,
    )
}

/// Orders two values of one comparable kind. `sort` rejects anything
/// else before getting here.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
    }
}

fn sort_array(items: &[Value], reverse: bool, span: Span) -> Result<Value, RuntimeError> {
    let all_numeric = items.iter().all(Value::is_numeric);
    let all_strings = items.iter().all(|v| matches!(v, Value::String(_)));
    if !(all_numeric || all_strings) {
        return Err(RuntimeError::type_error(
            "`sort` requires all elements to be numbers or all to be strings",
            span,
        ));
    }
    let mut sorted = items.to_vec();
    sorted.sort_by(compare);
    if reverse {
        sorted.reverse();
    }
    Ok(Value::array(sorted))
}

fn to_json(value: &Value, args: &CallArgs, span: Span) -> Result<Value, RuntimeError> {
    let json = crate::convert::from_value(value)
        .map_err(|message| RuntimeError::type_error(message, span))?;
    let text = match args.get_named("indent") {
        Value::Undefined | Value::Null => serde_json::to_string(&json),
        Value::Int(width) => {
            let indent = " ".repeat(width.max(0) as usize);
            let mut buffer = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer =
                serde_json::Serializer::with_formatter(&mut buffer, formatter);
            serde::Serialize::serialize(&json, &mut serializer)
                .map(|_| String::from_utf8_lossy(&buffer).into_owned())
        }
        other => {
            return Err(RuntimeError::type_error(
                format!("`tojson` indent must be an integer, got {}", other.kind_name()),
                span,
            ));
        }
    };
    let text = text.map_err(|e| RuntimeError::type_error(e.to_string(), span))?;
    Ok(Value::from(text))
}

/// Keeps the items whose named attribute passes a test: the attribute's
/// truthiness by default, or a named test with one optional argument.
/// Items missing the attribute are dropped.
fn select_attr(items: &[Value], args: &CallArgs, span: Span) -> Result<Value, RuntimeError> {
    let Value::String(attr) = args.get(0) else {
        return Err(RuntimeError::type_error(
            "`selectattr` expects an attribute name string",
            span,
        ));
    };

    let test_name = match args.get(1) {
        Value::Undefined => None,
        Value::String(name) => Some(name),
        other => {
            return Err(RuntimeError::type_error(
                format!("`selectattr` test name must be a string, got {}", other.kind_name()),
                span,
            ));
        }
    };

    let mut selected = Vec::new();
    for item in items {
        let attr_value = match item.as_object() {
            Some(object) => object.get(attr.as_ref()).cloned(),
            None => {
                return Err(RuntimeError::type_error(
                    "`selectattr` can only be applied to an array of objects",
                    span,
                ));
            }
        };
        let Some(attr_value) = attr_value else {
            continue;
        };
        let keep = match &test_name {
            Some(name) => {
                let test_args = CallArgs::positional(vec![args.get(2)]);
                super::tests::apply(name, &attr_value, &test_args, span)?
            }
            None => attr_value.is_truthy(),
        };
        if keep {
            selected.push(item.clone());
        }
    }
    Ok(Value::array(selected))
}

fn array_filter(
    name: &str,
    items: &[Value],
    args: &CallArgs,
    span: Span,
) -> Option<Result<Value, RuntimeError>> {
    let result = match name {
        "first" => Ok(items.first().cloned().unwrap_or(Value::Undefined)),
        "last" => Ok(items.last().cloned().unwrap_or(Value::Undefined)),
        "length" => Ok(Value::Int(items.len() as i64)),
        "reverse" => Ok(Value::array(items.iter().rev().cloned().collect())),
        "sort" => sort_array(items, args.get(0).is_truthy(), span),
        "selectattr" => select_attr(items, args, span),
        "list" => Ok(Value::array(items.to_vec())),
        "unique" => {
            let mut seen: Vec<Value> = Vec::new();
            for item in items {
                if !seen.contains(item) {
                    seen.push(item.clone());
                }
            }
            Ok(Value::array(seen))
        }
        "join" => {
            let separator = match args.get(0) {
                Value::Undefined => String::new(),
                Value::String(s) => s.to_string(),
                other => {
                    return Some(Err(RuntimeError::type_error(
                        format!("`join` separator must be a string, got {}", other.kind_name()),
                        span,
                    )));
                }
            };
            let parts: Vec<String> = items.iter().map(Value::to_display_string).collect();
            Ok(Value::from(parts.join(&separator)))
        }
        _ => return None,
    };
    Some(result)
}

fn string_filter(name: &str, text: &str) -> Option<Result<Value, RuntimeError>> {
    let result = match name {
        "length" => Ok(Value::Int(text.chars().count() as i64)),
        "upper" => Ok(Value::from(text.to_uppercase())),
        "lower" => Ok(Value::from(text.to_lowercase())),
        "title" => Ok(Value::from(super::members::title_case(text))),
        "trim" => Ok(Value::from(text.trim())),
        "capitalize" => {
            let mut chars = text.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            Ok(Value::from(capitalized))
        }
        _ => return None,
    };
    Some(result)
}

/// Applies a built-in filter. The table is keyed by the operand's kind;
/// an unknown name, or a known name on the wrong kind, is an error.
pub fn apply(
    name: &str,
    value: &Value,
    args: &CallArgs,
    span: Span,
) -> Result<Value, RuntimeError> {
    if name == "tojson" {
        return to_json(value, args, span);
    }

    let handled = match value {
        Value::Array(array) => array_filter(name, &array.borrow(), args, span),
        Value::String(text) => string_filter(name, text),
        Value::Int(n) => match name {
            "abs" => Some(Ok(Value::Int(n.abs()))),
            _ => None,
        },
        Value::Float(n) => match name {
            "abs" => Some(Ok(Value::Float(n.abs()))),
            _ => None,
        },
        Value::Object(object) => match name {
            "length" => Some(Ok(Value::Int(object.borrow().len() as i64))),
            "items" => {
                let pairs: Vec<Value> = object
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::array(vec![Value::from(k.as_str()), v.clone()]))
                    .collect();
                Some(Ok(Value::array(pairs)))
            }
            _ => None,
        },
        _ => None,
    };

    match handled {
        Some(result) => result,
        None if is_known_filter(name) => Err(unsupported(name, value, span)),
        None => Err(RuntimeError::unknown_filter(name, span)),
    }
}

fn is_known_filter(name: &str) -> bool {
    matches!(
        name,
        "first"
            | "last"
            | "length"
            | "reverse"
            | "sort"
            | "join"
            | "list"
            | "unique"
            | "selectattr"
            | "upper"
            | "lower"
            | "title"
            | "capitalize"
            | "trim"
            | "abs"
            | "items"
            | "tojson"
    )
}
