use std::rc::Rc;

use crate::diagnostic::Span;
use crate::value::{CallArgs, NativeFunction, Value};

use super::super::error::RuntimeError;

fn method(
    name: &'static str,
    func: impl Fn(CallArgs) -> Result<Value, RuntimeError> + 'static,
) -> Value {
    Value::Function(Rc::new(NativeFunction::new(name, move |args, _env| {
        func(args)
    })))
}

pub(super) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

fn expect_string(args: &CallArgs, index: usize, method: &str) -> Result<Rc<str>, RuntimeError> {
    match args.get(index) {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::type_error(
            format!(
                "`{method}` expects a string argument, got {}",
                other.kind_name()
            ),
            Span::dummy(),
        )),
    }
}

fn string_member(receiver: &Rc<str>, name: &str) -> Option<Value> {
    let text = Rc::clone(receiver);
    match name {
        "length" => Some(Value::Int(receiver.chars().count() as i64)),
        "upper" => Some(method("upper", move |_| Ok(Value::from(text.to_uppercase())))),
        "lower" => Some(method("lower", move |_| Ok(Value::from(text.to_lowercase())))),
        "strip" => Some(method("strip", move |_| Ok(Value::from(text.trim())))),
        "lstrip" => Some(method("lstrip", move |_| Ok(Value::from(text.trim_start())))),
        "rstrip" => Some(method("rstrip", move |_| Ok(Value::from(text.trim_end())))),
        "title" => Some(method("title", move |_| Ok(Value::from(title_case(&text))))),
        "split" => Some(method("split", move |args| {
            let parts: Vec<Value> = match args.get(0) {
                Value::Undefined | Value::Null => {
                    text.split_whitespace().map(Value::from).collect()
                }
                Value::String(sep) => text.split(sep.as_ref()).map(Value::from).collect(),
                other => {
                    return Err(RuntimeError::type_error(
                        format!("`split` expects a string separator, got {}", other.kind_name()),
                        Span::dummy(),
                    ));
                }
            };
            Ok(Value::array(parts))
        })),
        "startswith" => Some(method("startswith", move |args| {
            let prefix = expect_string(&args, 0, "startswith")?;
            Ok(Value::Bool(text.starts_with(prefix.as_ref())))
        })),
        "endswith" => Some(method("endswith", move |args| {
            let suffix = expect_string(&args, 0, "endswith")?;
            Ok(Value::Bool(text.ends_with(suffix.as_ref())))
        })),
        "replace" => Some(method("replace", move |args| {
            let from = expect_string(&args, 0, "replace")?;
            let to = expect_string(&args, 1, "replace")?;
            Ok(Value::from(text.replace(from.as_ref(), to.as_ref())))
        })),
        _ => None,
    }
}

/// The per-kind builtin member table, consulted after own object keys.
/// Returns `None` when the kind has no such member.
pub fn lookup(receiver: &Value, name: &str) -> Option<Value> {
    match receiver {
        Value::String(s) => string_member(s, name),
        Value::Array(array) => match name {
            "length" => Some(Value::Int(array.borrow().len() as i64)),
            _ => None,
        },
        Value::Object(object) => {
            let map = Rc::clone(object);
            match name {
                "get" => Some(method("get", move |args| {
                    let key = expect_string(&args, 0, "get")?;
                    match map.borrow().get(key.as_ref()) {
                        Some(value) => Ok(value.clone()),
                        None => Ok(match args.get(1) {
                            Value::Undefined => Value::Null,
                            fallback => fallback,
                        }),
                    }
                })),
                "items" => Some(method("items", move |_| {
                    let pairs: Vec<Value> = map
                        .borrow()
                        .iter()
                        .map(|(k, v)| Value::array(vec![Value::from(k.as_str()), v.clone()]))
                        .collect();
                    Ok(Value::array(pairs))
                })),
                "keys" => Some(method("keys", move |_| {
                    let keys: Vec<Value> = map
                        .borrow()
                        .keys()
                        .map(|k| Value::from(k.as_str()))
                        .collect();
                    Ok(Value::array(keys))
                })),
                "values" => Some(method("values", move |_| {
                    let values: Vec<Value> = map.borrow().values().cloned().collect();
                    Ok(Value::array(values))
                })),
                _ => None,
            }
        }
        _ => None,
    }
}
