pub mod filters;
pub mod members;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::diagnostic::Span;
use crate::value::{NativeFunction, Value};

use super::environment::Environment;
use super::error::RuntimeError;

/// Declares the engine globals into a fresh root scope: boolean and
/// none literals (both casings), `range`, `namespace`, and
/// `raise_exception`.
pub fn declare_globals(env: &Rc<Environment>) -> Result<(), RuntimeError> {
    env.declare("true", Value::Bool(true))?;
    env.declare("True", Value::Bool(true))?;
    env.declare("false", Value::Bool(false))?;
    env.declare("False", Value::Bool(false))?;
    env.declare("none", Value::Null)?;
    env.declare("None", Value::Null)?;

    env.declare(
        "range",
        Value::Function(Rc::new(NativeFunction::new("range", |args, _env| {
            let int_arg = |index: usize| match args.get(index) {
                Value::Int(n) => Ok(n),
                other => Err(RuntimeError::type_error(
                    format!("`range` expects integers, got {}", other.kind_name()),
                    Span::dummy(),
                )),
            };
            let (start, stop, step) = match args.len() {
                1 => (0, int_arg(0)?, 1),
                2 => (int_arg(0)?, int_arg(1)?, 1),
                3 => (int_arg(0)?, int_arg(1)?, int_arg(2)?),
                n => {
                    return Err(RuntimeError::type_error(
                        format!("`range` takes 1 to 3 arguments, got {n}"),
                        Span::dummy(),
                    ));
                }
            };
            if step == 0 {
                return Err(RuntimeError::type_error(
                    "`range` step must not be zero",
                    Span::dummy(),
                ));
            }
            let mut items = Vec::new();
            let mut current = start;
            while (step > 0 && current < stop) || (step < 0 && current > stop) {
                items.push(Value::Int(current));
                current += step;
            }
            Ok(Value::array(items))
        }))),
    )?;

    env.declare(
        "namespace",
        Value::Function(Rc::new(NativeFunction::new("namespace", |args, _env| {
            let mut map = IndexMap::new();
            for (name, value) in args.named {
                map.insert(name, value);
            }
            Ok(Value::object(map))
        }))),
    )?;

    env.declare(
        "raise_exception",
        Value::Function(Rc::new(NativeFunction::new(
            "raise_exception",
            |args, _env| {
                let message = match args.get(0) {
                    Value::String(s) => s.to_string(),
                    other => other.to_display_string(),
                };
                Err(RuntimeError::Raised {
                    message,
                    span: Span::dummy(),
                })
            },
        ))),
    )?;

    Ok(())
}
