pub mod ast;
pub mod cli;
pub mod convert;
pub mod diagnostic;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

use std::rc::Rc;

use ast::Program;
use diagnostic::Diagnostic;
use interpreter::{declare_globals, Environment, Interpreter, RuntimeError};
use lexer::LexError;
use parser::{ParseError, TokenParser};

pub use ast::{Expr, ExprKind, Stmt};
pub use lexer::Options;
pub use token::Token;
pub use value::Value;

/// Any failure from the lex, parse, or render stage.
#[derive(Debug, Clone)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl Error {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Lex(e) => e.to_diagnostic(),
            Error::Parse(e) => e.to_diagnostic(),
            Error::Runtime(e) => e.to_diagnostic(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "{}", e),
            Error::Parse(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

/// A parsed template, ready to render or reformat any number of times.
pub struct Template {
    program: Program,
}

impl Template {
    pub fn new(source: &str) -> Result<Template, Error> {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: &str, options: Options) -> Result<Template, Error> {
        let tokens = lexer::tokenize(source, options)?;
        let program = TokenParser::new(tokens).parse()?;
        Ok(Template { program })
    }

    /// Renders with the given context object. Unresolved names are errors;
    /// guard optional ones with `is defined`.
    pub fn render(&self, context: &serde_json::Value) -> Result<String, Error> {
        let env = build_env(context)?;
        let output = Interpreter::new().run(&self.program, &env)?;
        Ok(output)
    }

    /// Renders on a caller-assembled environment. The environment is used
    /// as-is; globals like `range` must already be declared on it.
    pub fn render_with_env(&self, env: Rc<Environment>) -> Result<String, Error> {
        let output = Interpreter::new().run(&self.program, &env)?;
        Ok(output)
    }

    /// Renders leniently and reports which names the context failed to
    /// supply, in first-use order. Unresolved values render as empty.
    pub fn missing_variables(
        &self,
        context: &serde_json::Value,
    ) -> Result<(String, Vec<String>), Error> {
        let env = build_env(context)?;
        let mut interpreter = Interpreter::probe();
        let output = interpreter.run(&self.program, &env)?;
        Ok((output, interpreter.missing_names().to_vec()))
    }

    pub fn format(&self, indent: usize) -> String {
        format::format(&self.program, indent)
    }
}

fn build_env(context: &serde_json::Value) -> Result<Rc<Environment>, Error> {
    let root = Environment::new();
    declare_globals(&root)?;

    // Context bindings live in a child scope so names like `true` can be
    // overridden without tripping the redeclare check on the globals.
    let env = Environment::child(&root);
    match context {
        serde_json::Value::Object(map) => {
            for (name, json) in map {
                env.declare(name.as_str(), convert::to_value(json))?;
            }
        }
        serde_json::Value::Null => {}
        other => {
            return Err(Error::Runtime(RuntimeError::type_error(
                format!("context must be a JSON object, got {}", json_kind(other)),
                diagnostic::Span::dummy(),
            )));
        }
    }
    Ok(env)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// One-shot render with default options.
pub fn render(source: &str, context: &serde_json::Value) -> Result<String, Error> {
    Template::new(source)?.render(context)
}

/// One-shot reformat to the canonical style.
pub fn format(source: &str, indent: usize) -> Result<String, Error> {
    Ok(Template::new(source)?.format(indent))
}
