use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};
use crate::diagnostic::Span;
use crate::value::{CallArgs, MacroValue, Value};

use super::builtins::{filters, members, tests};
use super::environment::Environment;
use super::error::{ControlFlow, RuntimeError};

/// A tree-walking evaluator. Strict mode raises on unresolved names;
/// probe mode substitutes the undefined value and records which names
/// failed to resolve, in first-seen order.
pub struct Interpreter {
    strict: bool,
    missing: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            strict: true,
            missing: Vec::new(),
        }
    }

    pub fn probe() -> Self {
        Self {
            strict: false,
            missing: Vec::new(),
        }
    }

    pub fn run(
        &mut self,
        program: &Program,
        env: &Rc<Environment>,
    ) -> Result<String, RuntimeError> {
        self.missing.clear();
        match self.evaluate_statements(&program.body, env) {
            Ok(output) => Ok(output),
            Err(ControlFlow::Error(error)) => Err(error),
            Err(ControlFlow::Break) | Err(ControlFlow::Continue) => Err(RuntimeError::type_error(
                "`break` and `continue` are only allowed inside a loop",
                Span::dummy(),
            )),
        }
    }

    /// Unresolved names collected by the last probe run.
    pub fn missing_names(&self) -> &[String] {
        &self.missing
    }

    fn record_missing(&mut self, name: &str) {
        if !self.missing.iter().any(|n| n == name) {
            self.missing.push(name.to_string());
        }
    }

    /// Renders a statement sequence, skipping null and undefined results
    /// and trimming one leading newline from the concatenation.
    fn evaluate_statements(
        &mut self,
        statements: &[Stmt],
        env: &Rc<Environment>,
    ) -> Result<String, ControlFlow> {
        let mut out = String::new();
        for statement in statements {
            self.evaluate_stmt(statement, env, &mut out)?;
        }
        if out.starts_with('\n') {
            out.remove(0);
        }
        Ok(out)
    }

    fn evaluate_stmt(
        &mut self,
        statement: &Stmt,
        env: &Rc<Environment>,
        out: &mut String,
    ) -> Result<(), ControlFlow> {
        match statement {
            Stmt::Text(text) => out.push_str(text),
            Stmt::Comment(_) => {}
            Stmt::Expression(expr) => {
                let value = self.evaluate_expr(expr, env)?;
                if !matches!(value, Value::Null | Value::Undefined) {
                    out.push_str(&value.to_display_string());
                }
            }
            Stmt::If {
                test,
                body,
                alternate,
            } => {
                let branch = if self.evaluate_expr(test, env)?.is_truthy() {
                    body
                } else {
                    alternate
                };
                let rendered = self.evaluate_statements(branch, env)?;
                out.push_str(&rendered);
            }
            Stmt::For {
                loopvar,
                iterable,
                body,
                else_body,
            } => self.evaluate_for(loopvar, iterable, body, else_body, env, out)?,
            Stmt::Set {
                target,
                value,
                body,
            } => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr, env)?,
                    None => Value::from(self.evaluate_statements(body, env)?),
                };
                self.assign_target(target, value, env)?;
            }
            Stmt::Macro { name, params, body } => {
                env.bind(
                    name.as_ref(),
                    Value::Macro(Rc::new(MacroValue {
                        name: Rc::clone(name),
                        params: params.clone(),
                        body: body.clone(),
                        env: Rc::clone(env),
                    })),
                );
            }
            Stmt::Call {
                caller_params,
                call,
                body,
            } => {
                let ExprKind::Call { callee, args } = &call.kind else {
                    return Err(RuntimeError::type_error(
                        "expected a call after `{% call %}`",
                        call.span,
                    )
                    .into());
                };
                let callee_value = self.evaluate_expr(callee, env)?;
                let args = self.evaluate_args(args, env)?;
                let caller = Value::Macro(Rc::new(MacroValue {
                    name: Rc::from("caller"),
                    params: caller_params.clone(),
                    body: body.clone(),
                    env: Rc::clone(env),
                }));
                let Value::Macro(target) = callee_value else {
                    return Err(RuntimeError::NotCallable {
                        kind: callee_value.kind_name(),
                        span: call.span,
                    }
                    .into());
                };
                let rendered = self.call_macro(&target, args, Some(caller))?;
                out.push_str(&rendered.to_display_string());
            }
            Stmt::Filter { filter, body } => {
                let rendered = Value::from(self.evaluate_statements(body, env)?);
                let result = self.apply_filter_expr(&rendered, filter, env)?;
                out.push_str(&result.to_display_string());
            }
            Stmt::Break => return Err(ControlFlow::Break),
            Stmt::Continue => return Err(ControlFlow::Continue),
        }
        Ok(())
    }

    fn evaluate_for(
        &mut self,
        loopvar: &Expr,
        iterable: &Expr,
        body: &[Stmt],
        else_body: &[Stmt],
        env: &Rc<Environment>,
        out: &mut String,
    ) -> Result<(), ControlFlow> {
        // An inline `if` on the iterable filters items before the loop,
        // with the loop variable in scope for the predicate.
        let (source, predicate) = match &iterable.kind {
            ExprKind::Select { value, condition } => (value.as_ref(), Some(condition.as_ref())),
            _ => (iterable, None),
        };

        let source_value = self.evaluate_expr(source, env)?;
        let Some(items) = source_value.as_array().map(|items| items.clone()) else {
            return Err(RuntimeError::type_error(
                format!("cannot iterate over a {}", source_value.kind_name()),
                source.span,
            )
            .into());
        };

        let mut selected = Vec::with_capacity(items.len());
        for item in items {
            if let Some(condition) = predicate {
                let scratch = Environment::child(env);
                self.bind_loop_variable(loopvar, item.clone(), &scratch)?;
                if !self.evaluate_expr(condition, &scratch)?.is_truthy() {
                    continue;
                }
            }
            selected.push(item);
        }

        if selected.is_empty() {
            let rendered = self.evaluate_statements(else_body, &Environment::child(env))?;
            out.push_str(&rendered);
            return Ok(());
        }

        let length = selected.len();
        for (i, item) in selected.iter().enumerate() {
            let scope = Environment::child(env);

            let mut meta = IndexMap::new();
            meta.insert("index".to_string(), Value::Int(i as i64 + 1));
            meta.insert("index0".to_string(), Value::Int(i as i64));
            meta.insert("revindex".to_string(), Value::Int((length - i) as i64));
            meta.insert("revindex0".to_string(), Value::Int((length - i - 1) as i64));
            meta.insert("first".to_string(), Value::Bool(i == 0));
            meta.insert("last".to_string(), Value::Bool(i == length - 1));
            meta.insert("length".to_string(), Value::Int(length as i64));
            meta.insert(
                "previtem".to_string(),
                if i > 0 {
                    selected[i - 1].clone()
                } else {
                    Value::Undefined
                },
            );
            meta.insert(
                "nextitem".to_string(),
                selected.get(i + 1).cloned().unwrap_or(Value::Undefined),
            );
            scope.bind("loop", Value::object(meta));

            self.bind_loop_variable(loopvar, item.clone(), &scope)?;

            match self.evaluate_statements(body, &scope) {
                Ok(rendered) => out.push_str(&rendered),
                Err(ControlFlow::Break) => break,
                Err(ControlFlow::Continue) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn bind_loop_variable(
        &mut self,
        loopvar: &Expr,
        item: Value,
        scope: &Rc<Environment>,
    ) -> Result<(), RuntimeError> {
        match &loopvar.kind {
            ExprKind::Identifier(name) => {
                scope.bind(name.as_ref(), item);
                Ok(())
            }
            ExprKind::TupleLiteral(names) => {
                let Some(parts) = item.as_array().map(|parts| parts.clone()) else {
                    return Err(RuntimeError::type_error(
                        format!("cannot unpack a {} into a tuple", item.kind_name()),
                        loopvar.span,
                    ));
                };
                if parts.len() != names.len() {
                    return Err(RuntimeError::type_error(
                        format!(
                            "expected {} items to unpack, got {}",
                            names.len(),
                            parts.len()
                        ),
                        loopvar.span,
                    ));
                }
                for (name, part) in names.iter().zip(parts) {
                    let ExprKind::Identifier(name) = &name.kind else {
                        return Err(RuntimeError::type_error(
                            "loop variables must be plain names",
                            name.span,
                        ));
                    };
                    scope.bind(name.as_ref(), part);
                }
                Ok(())
            }
            _ => Err(RuntimeError::type_error(
                "loop variables must be plain names",
                loopvar.span,
            )),
        }
    }

    fn assign_target(
        &mut self,
        target: &Expr,
        value: Value,
        env: &Rc<Environment>,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                env.assign(name.as_ref(), value);
                Ok(())
            }
            ExprKind::Member {
                object,
                property,
                computed: false,
            } => {
                let ExprKind::Identifier(attribute) = &property.kind else {
                    return Err(RuntimeError::type_error(
                        "invalid assignment target",
                        property.span,
                    ));
                };
                let receiver = self.evaluate_expr(object, env)?;
                match receiver {
                    Value::Object(map) => {
                        map.borrow_mut().insert(attribute.to_string(), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::type_error(
                        format!(
                            "can only assign attributes on an object, got {}",
                            other.kind_name()
                        ),
                        object.span,
                    )),
                }
            }
            ExprKind::TupleLiteral(targets) => {
                let Some(parts) = value.as_array().map(|parts| parts.clone()) else {
                    return Err(RuntimeError::type_error(
                        format!("cannot unpack a {} into a tuple", value.kind_name()),
                        target.span,
                    ));
                };
                if parts.len() != targets.len() {
                    return Err(RuntimeError::type_error(
                        format!(
                            "expected {} values to unpack, got {}",
                            targets.len(),
                            parts.len()
                        ),
                        target.span,
                    ));
                }
                for (target, part) in targets.iter().zip(parts) {
                    self.assign_target(target, part, env)?;
                }
                Ok(())
            }
            _ => Err(RuntimeError::type_error(
                "invalid assignment target",
                target.span,
            )),
        }
    }

    pub fn evaluate_expr(
        &mut self,
        expr: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::IntegerLiteral(n) => Ok(Value::Int(*n)),
            ExprKind::FloatLiteral(n) => Ok(Value::Float(*n)),
            ExprKind::StringLiteral(s) => Ok(Value::from(s.as_str())),
            ExprKind::Identifier(name) => match env.lookup(name) {
                Some(value) => Ok(value),
                None if self.strict => {
                    Err(RuntimeError::undefined_variable(name.as_ref(), expr.span))
                }
                None => {
                    self.record_missing(name);
                    Ok(Value::Undefined)
                }
            },
            ExprKind::ArrayLiteral(elements) | ExprKind::TupleLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expr(element, env)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::ObjectLiteral(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key_value = self.evaluate_expr(key, env)?;
                    let Value::String(key_string) = key_value else {
                        return Err(RuntimeError::type_error(
                            format!(
                                "object keys must evaluate to strings, got {}",
                                key_value.kind_name()
                            ),
                            key.span,
                        ));
                    };
                    map.insert(key_string.to_string(), self.evaluate_expr(value, env)?);
                }
                Ok(Value::object(map))
            }
            ExprKind::Binary { op, left, right } => {
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let left_value = self.evaluate_expr(left, env)?;
                    let take_left = match op {
                        BinaryOp::And => !left_value.is_truthy(),
                        _ => left_value.is_truthy(),
                    };
                    return if take_left {
                        Ok(left_value)
                    } else {
                        self.evaluate_expr(right, env)
                    };
                }
                let left_value = self.evaluate_expr(left, env)?;
                let right_value = self.evaluate_expr(right, env)?;
                apply_binary(*op, &left_value, &right_value, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.evaluate_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(RuntimeError::type_error(
                            format!("cannot negate a {}", other.kind_name()),
                            expr.span,
                        )),
                    },
                }
            }
            ExprKind::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                if self.evaluate_expr(condition, env)?.is_truthy() {
                    self.evaluate_expr(true_expr, env)
                } else {
                    self.evaluate_expr(false_expr, env)
                }
            }
            ExprKind::Select { value, condition } => {
                if self.evaluate_expr(condition, env)?.is_truthy() {
                    self.evaluate_expr(value, env)
                } else {
                    Ok(Value::Undefined)
                }
            }
            ExprKind::Member {
                object,
                property,
                computed,
            } => self.evaluate_member(object, property, *computed, env),
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate_expr(callee, env)?;
                let args = self.evaluate_args(args, env)?;
                match callee_value {
                    Value::Function(function) => function.call(args, env),
                    Value::Macro(target) => self.call_macro(&target, args, None),
                    other => Err(RuntimeError::NotCallable {
                        kind: other.kind_name(),
                        span: expr.span,
                    }),
                }
            }
            ExprKind::Filter { operand, filter } => {
                let value = self.evaluate_expr(operand, env)?;
                self.apply_filter_expr(&value, filter, env)
            }
            ExprKind::Test {
                operand,
                negate,
                test,
            } => {
                let (name, name_span, args) = split_filter_spec(test)?;
                let args = self.evaluate_args(args, env)?;

                // `defined`/`undefined` observe resolution failure instead
                // of propagating it; a probe run must not log names the
                // template itself guards.
                let value = if matches!(name, "defined" | "undefined") {
                    let checkpoint = self.missing.len();
                    let result = match self.evaluate_expr(operand, env) {
                        Ok(value) => value,
                        Err(error) if error.is_unresolved_name() => Value::Undefined,
                        Err(error) => return Err(error),
                    };
                    self.missing.truncate(checkpoint);
                    result
                } else {
                    self.evaluate_expr(operand, env)?
                };

                let mut result = tests::apply(name, &value, &args, name_span)?;
                if *negate {
                    result = !result;
                }
                Ok(Value::Bool(result))
            }
            ExprKind::Slice { .. } => Err(RuntimeError::type_error(
                "a slice is only valid inside `[ ]`",
                expr.span,
            )),
            ExprKind::KeywordArgument { .. } => Err(RuntimeError::type_error(
                "keyword arguments are only valid in an argument list",
                expr.span,
            )),
            ExprKind::Spread(_) => Err(RuntimeError::type_error(
                "`*` spreads are only valid in an argument list",
                expr.span,
            )),
        }
    }

    fn evaluate_member(
        &mut self,
        object: &Expr,
        property: &Expr,
        computed: bool,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let receiver = self.evaluate_expr(object, env)?;

        if computed {
            if let ExprKind::Slice { start, stop, step } = &property.kind {
                return self.evaluate_slice(&receiver, start, stop, step, env, property.span);
            }
            let key = self.evaluate_expr(property, env)?;
            return match (&receiver, &key) {
                (Value::Object(_), Value::String(name)) => {
                    self.resolve_property(&receiver, name, property.span)
                }
                (Value::Array(items), Value::Int(index)) => {
                    Ok(index_sequence(&items.borrow(), *index))
                }
                (Value::String(text), Value::Int(index)) => {
                    let chars: Vec<char> = text.chars().collect();
                    Ok(match index_position(chars.len(), *index) {
                        Some(i) => Value::from(chars[i].to_string()),
                        None => Value::Undefined,
                    })
                }
                (Value::Array(_) | Value::String(_), other) => Err(RuntimeError::type_error(
                    format!("indices must be integers, got {}", other.kind_name()),
                    property.span,
                )),
                (Value::Undefined, _) if !self.strict => Ok(Value::Undefined),
                _ => Err(RuntimeError::type_error(
                    format!("cannot index a {}", receiver.kind_name()),
                    property.span,
                )),
            };
        }

        let ExprKind::Identifier(name) = &property.kind else {
            return Err(RuntimeError::type_error(
                "expected a property name",
                property.span,
            ));
        };
        self.resolve_property(&receiver, name, property.span)
    }

    /// Own object keys first, then the kind's builtin member table.
    fn resolve_property(
        &mut self,
        receiver: &Value,
        name: &str,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match receiver {
            // Chaining off an already-undefined value stays undefined in
            // probe mode without logging another name.
            Value::Undefined if !self.strict => return Ok(Value::Undefined),
            Value::Undefined => {
                return Err(RuntimeError::undefined_property(name, span));
            }
            Value::Null => {
                return Err(RuntimeError::type_error(
                    format!("cannot access `{name}` on none"),
                    span,
                ));
            }
            Value::Object(map) => {
                if let Some(value) = map.borrow().get(name) {
                    return Ok(value.clone());
                }
            }
            _ => {}
        }
        if let Some(value) = members::lookup(receiver, name) {
            return Ok(value);
        }
        if self.strict {
            Err(RuntimeError::undefined_property(name, span))
        } else {
            self.record_missing(name);
            Ok(Value::Undefined)
        }
    }

    fn evaluate_slice(
        &mut self,
        receiver: &Value,
        start: &Option<Box<Expr>>,
        stop: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
        env: &Rc<Environment>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let mut bound = |part: &Option<Box<Expr>>| -> Result<Option<i64>, RuntimeError> {
            match part {
                None => Ok(None),
                Some(expr) => match self.evaluate_expr(expr, env)? {
                    Value::Int(n) => Ok(Some(n)),
                    other => Err(RuntimeError::type_error(
                        format!("slice bounds must be integers, got {}", other.kind_name()),
                        expr.span,
                    )),
                },
            }
        };
        let start = bound(start)?;
        let stop = bound(stop)?;
        let step = bound(step)?.unwrap_or(1);
        if step == 0 {
            return Err(RuntimeError::type_error("slice step must not be zero", span));
        }

        match receiver {
            Value::Array(items) => {
                let items = items.borrow();
                let picked = slice_indices(items.len(), start, stop, step)
                    .into_iter()
                    .map(|i| items[i].clone())
                    .collect();
                Ok(Value::array(picked))
            }
            Value::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                let picked: String = slice_indices(chars.len(), start, stop, step)
                    .into_iter()
                    .map(|i| chars[i])
                    .collect();
                Ok(Value::from(picked))
            }
            other => Err(RuntimeError::type_error(
                format!("cannot slice a {}", other.kind_name()),
                span,
            )),
        }
    }

    fn apply_filter_expr(
        &mut self,
        value: &Value,
        filter: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let (name, name_span, args) = split_filter_spec(filter)?;
        let args = self.evaluate_args(args, env)?;
        filters::apply(name, value, &args, name_span)
    }

    fn evaluate_args(
        &mut self,
        args: &[Expr],
        env: &Rc<Environment>,
    ) -> Result<CallArgs, RuntimeError> {
        let mut call_args = CallArgs::default();
        for arg in args {
            match &arg.kind {
                ExprKind::KeywordArgument { name, value } => {
                    let value = self.evaluate_expr(value, env)?;
                    call_args.named.insert(name.to_string(), value);
                }
                ExprKind::Spread(inner) => {
                    let value = self.evaluate_expr(inner, env)?;
                    let Some(items) = value.as_array() else {
                        return Err(RuntimeError::type_error(
                            format!("can only spread an array, got {}", value.kind_name()),
                            arg.span,
                        ));
                    };
                    call_args.positional.extend(items.iter().cloned());
                }
                _ => call_args.positional.push(self.evaluate_expr(arg, env)?),
            }
        }
        Ok(call_args)
    }

    /// Invokes a macro (or a `{% call %}` body exposed as `caller`):
    /// positional arguments fill parameters in order, keywords match by
    /// name, declared defaults cover the rest.
    fn call_macro(
        &mut self,
        target: &MacroValue,
        args: CallArgs,
        caller: Option<Value>,
    ) -> Result<Value, RuntimeError> {
        let scope = Environment::child(&target.env);
        let CallArgs {
            positional,
            mut named,
        } = args;
        let mut positional = positional.into_iter();

        for param in &target.params {
            match &param.kind {
                ExprKind::Identifier(name) => {
                    let value = positional
                        .next()
                        .or_else(|| named.shift_remove(name.as_ref()))
                        .unwrap_or(Value::Undefined);
                    scope.bind(name.as_ref(), value);
                }
                ExprKind::KeywordArgument { name, value } => {
                    let bound = match positional.next() {
                        Some(given) => given,
                        None => match named.shift_remove(name.as_ref()) {
                            Some(given) => given,
                            None => self.evaluate_expr(value, &scope)?,
                        },
                    };
                    scope.bind(name.as_ref(), bound);
                }
                _ => {
                    return Err(RuntimeError::type_error(
                        "macro parameters must be names or `name=default`",
                        param.span,
                    ));
                }
            }
        }
        if let Some(caller) = caller {
            scope.bind("caller", caller);
        }

        match self.evaluate_statements(&target.body, &scope) {
            Ok(rendered) => Ok(Value::from(rendered)),
            Err(ControlFlow::Error(error)) => Err(error),
            Err(_) => Err(RuntimeError::type_error(
                "`break` and `continue` are only allowed inside a loop",
                Span::dummy(),
            )),
        }
    }
}

/// Pulls the name and argument list out of a filter or test position
/// (`name` or `name(args)`).
fn split_filter_spec(spec: &Expr) -> Result<(&str, Span, &[Expr]), RuntimeError> {
    match &spec.kind {
        ExprKind::Identifier(name) => Ok((name.as_ref(), spec.span, &[])),
        ExprKind::Call { callee, args } => match &callee.kind {
            ExprKind::Identifier(name) => Ok((name.as_ref(), callee.span, args)),
            _ => Err(RuntimeError::type_error(
                "expected a filter name",
                callee.span,
            )),
        },
        _ => Err(RuntimeError::type_error("expected a filter name", spec.span)),
    }
}

fn index_position(len: usize, index: i64) -> Option<usize> {
    let index = if index < 0 { index + len as i64 } else { index };
    if index >= 0 && (index as usize) < len {
        Some(index as usize)
    } else {
        None
    }
}

/// Out-of-range indexing yields the undefined value rather than an
/// error; only name resolution is strict.
fn index_sequence(items: &[Value], index: i64) -> Value {
    match index_position(items.len(), index) {
        Some(i) => items[i].clone(),
        None => Value::Undefined,
    }
}

/// Python slice index arithmetic: negative bounds count from the end,
/// defaults depend on the step direction, everything clamps.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let normalize = |bound: i64| if bound < 0 { bound + len } else { bound };

    let mut indices = Vec::new();
    if step > 0 {
        let start = start.map(normalize).unwrap_or(0).clamp(0, len);
        let stop = stop.map(normalize).unwrap_or(len).clamp(0, len);
        let mut i = start;
        while i < stop {
            indices.push(i as usize);
            i += step;
        }
    } else {
        let start = start.map(normalize).unwrap_or(len - 1).clamp(-1, len - 1);
        let stop = stop.map(normalize).unwrap_or(-1).clamp(-1, len - 1);
        let mut i = start;
        while i > stop {
            indices.push(i as usize);
            i += step;
        }
    }
    indices
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_f64()?, right.as_f64()?))
}

fn int_pair(left: &Value, right: &Value) -> Option<(i64, i64)> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn arithmetic_error(op: BinaryOp, left: &Value, right: &Value, span: Span) -> RuntimeError {
    RuntimeError::type_error(
        format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            left.kind_name(),
            right.kind_name()
        ),
        span,
    )
}

fn apply_binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    span: Span,
) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        BinaryOp::Concat => {
            return Ok(Value::from(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )));
        }
        BinaryOp::In | BinaryOp::NotIn => {
            if matches!(left, Value::Undefined | Value::Null) {
                return Err(arithmetic_error(op, left, right, span));
            }
            let contained = match right {
                Value::Array(items) => items.borrow().contains(left),
                Value::String(haystack) => match left {
                    Value::String(needle) => haystack.contains(needle.as_ref()),
                    other => {
                        return Err(RuntimeError::type_error(
                            format!(
                                "`in` on a string expects a string operand, got {}",
                                other.kind_name()
                            ),
                            span,
                        ));
                    }
                },
                Value::Object(map) => match left {
                    Value::String(key) => map.borrow().contains_key(key.as_ref()),
                    other => {
                        return Err(RuntimeError::type_error(
                            format!(
                                "`in` on an object expects a string key, got {}",
                                other.kind_name()
                            ),
                            span,
                        ));
                    }
                },
                other => {
                    return Err(RuntimeError::type_error(
                        format!("`in` expects an array, string or object, got {}", other.kind_name()),
                        span,
                    ));
                }
            };
            return Ok(Value::Bool(contained != matches!(op, BinaryOp::NotIn)));
        }
        _ => {}
    }

    if matches!(left, Value::Undefined | Value::Null)
        || matches!(right, Value::Undefined | Value::Null)
    {
        return Err(arithmetic_error(op, left, right, span));
    }

    match op {
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::from(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                )));
            }
            if let (Value::Array(a), Value::Array(b)) = (left, right) {
                let mut merged = a.borrow().clone();
                merged.extend(b.borrow().iter().cloned());
                return Ok(Value::array(merged));
            }
            if let Some((a, b)) = int_pair(left, right) {
                return Ok(Value::Int(a + b));
            }
            match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Float(a + b)),
                None => Err(arithmetic_error(op, left, right, span)),
            }
        }
        BinaryOp::Sub => {
            if let Some((a, b)) = int_pair(left, right) {
                return Ok(Value::Int(a - b));
            }
            match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Float(a - b)),
                None => Err(arithmetic_error(op, left, right, span)),
            }
        }
        BinaryOp::Mul => {
            if let Some((a, b)) = int_pair(left, right) {
                return Ok(Value::Int(a * b));
            }
            match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Float(a * b)),
                None => Err(arithmetic_error(op, left, right, span)),
            }
        }
        BinaryOp::Div => match numeric_pair(left, right) {
            Some((_, b)) if b == 0.0 => Err(RuntimeError::DivisionByZero { span }),
            Some((a, b)) => Ok(Value::Float(a / b)),
            None => Err(arithmetic_error(op, left, right, span)),
        },
        BinaryOp::Mod => {
            if let Some((a, b)) = int_pair(left, right) {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero { span });
                }
                return Ok(Value::Int(a.rem_euclid(b)));
            }
            match numeric_pair(left, right) {
                Some((_, b)) if b == 0.0 => Err(RuntimeError::DivisionByZero { span }),
                Some((a, b)) => Ok(Value::Float(a.rem_euclid(b))),
                None => Err(arithmetic_error(op, left, right, span)),
            }
        }
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Bool(match op {
                    BinaryOp::Less => a < b,
                    BinaryOp::LessEq => a <= b,
                    BinaryOp::Greater => a > b,
                    _ => a >= b,
                })),
                None => Err(arithmetic_error(op, left, right, span)),
            }
        }
        // Eq, NotEq, Concat, In, NotIn handled above; And, Or
        // short-circuit before operand evaluation.
        _ => Err(arithmetic_error(op, left, right, span)),
    }
}
