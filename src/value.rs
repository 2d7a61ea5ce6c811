use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Expr, Stmt};
use crate::interpreter::environment::Environment;
use crate::interpreter::error::RuntimeError;

/// A runtime value. Arrays and objects are shared mutably so that
/// `set ns.attr = v` through a namespace is visible everywhere the
/// object is bound.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<NativeFunction>),
    Macro(Rc<MacroValue>),
}

/// Evaluated arguments for a callable: positionals in order, keywords
/// by name.
#[derive(Default, Clone)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: IndexMap::new(),
        }
    }

    pub fn get(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or(Value::Undefined)
    }

    pub fn get_named(&self, name: &str) -> Value {
        self.named.get(name).cloned().unwrap_or(Value::Undefined)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

type NativeFn = dyn Fn(CallArgs, &Rc<Environment>) -> Result<Value, RuntimeError>;

/// A host-provided callable registered in the context, or one of the
/// engine globals (`range`, `namespace`, ...).
pub struct NativeFunction {
    pub name: Rc<str>,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(CallArgs, &Rc<Environment>) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn call(&self, args: CallArgs, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        (self.func)(args, env)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A `{% macro %}` closure: parameter expressions (identifiers or
/// `name=default` keywords) plus the body and the defining scope.
#[derive(Debug)]
pub struct MacroValue {
    pub name: Rc<str>,
    pub params: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub env: Rc<Environment>,
}

impl Value {
    pub fn string(value: impl Into<Rc<str>>) -> Self {
        Value::String(value.into())
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn object(map: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "none",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Macro(_) => "macro",
        }
    }

    /// Collections are truthy iff non-empty; zero and the empty string
    /// are falsy; callables are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Object(o) => !o.borrow().is_empty(),
            Value::Function(_) | Value::Macro(_) => true,
        }
    }

    pub fn as_array(&self) -> Option<Ref<'_, Vec<Value>>> {
        match self {
            Value::Array(array) => Some(array.borrow()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Ref<'_, IndexMap<String, Value>>> {
        match self {
            Value::Object(object) => Some(object.borrow()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The textual form used when a value reaches the output stream or a
    /// string operation. Rust's float `Display` already drops a `.0`
    /// fraction, which matches the expected numeric output.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Null => "none".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => s.to_string(),
            Value::Array(_) | Value::Object(_) => self.repr(),
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Macro(m) => format!("<macro {}>", m.name),
        }
    }

    /// A literal-like rendering, with strings quoted; used for
    /// collections and error messages.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Array(array) => {
                let parts: Vec<String> = array.borrow().iter().map(|v| v.repr()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(object) => {
                let parts: Vec<String> = object
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            _ => self.to_display_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Equality is strict per kind; only the two numeric kinds compare
/// across each other, by numeric value. `1 == true` is false.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Object(a), Value::Object(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value.as_str()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::array(values)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::object(map)
    }
}
