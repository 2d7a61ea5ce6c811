use std::fmt;

use crate::diagnostic::{Diagnostic, Label, Span};

#[derive(Debug, Clone)]
pub enum RuntimeError {
    UndefinedVariable { name: String, span: Span },
    UndefinedProperty { name: String, span: Span },
    TypeError { message: String, span: Span },
    UnknownFilter { name: String, span: Span },
    UnknownTest { name: String, span: Span },
    NotCallable { kind: &'static str, span: Span },
    DivisionByZero { span: Span },
    Redeclared { name: String },
    /// `raise_exception(...)` called from the template.
    Raised { message: String, span: Span },
}

impl RuntimeError {
    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            span,
        }
    }

    pub fn undefined_property(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedProperty {
            name: name.into(),
            span,
        }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn unknown_filter(name: impl Into<String>, span: Span) -> Self {
        Self::UnknownFilter {
            name: name.into(),
            span,
        }
    }

    pub fn unknown_test(name: impl Into<String>, span: Span) -> Self {
        Self::UnknownTest {
            name: name.into(),
            span,
        }
    }

    pub fn redeclared(name: impl Into<String>) -> Self {
        Self::Redeclared { name: name.into() }
    }

    /// True for the error class the `defined`/`undefined` tests and the
    /// missing-variable probe are allowed to swallow.
    pub fn is_unresolved_name(&self) -> bool {
        matches!(
            self,
            Self::UndefinedVariable { .. } | Self::UndefinedProperty { .. }
        )
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::UndefinedProperty { span, .. }
            | Self::TypeError { span, .. }
            | Self::UnknownFilter { span, .. }
            | Self::UnknownTest { span, .. }
            | Self::NotCallable { span, .. }
            | Self::DivisionByZero { span }
            | Self::Raised { span, .. } => *span,
            Self::Redeclared { .. } => Span::dummy(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::UndefinedVariable { .. } => "E0201",
            Self::UndefinedProperty { .. } => "E0202",
            Self::TypeError { .. } => "E0203",
            Self::UnknownFilter { .. } => "E0204",
            Self::UnknownTest { .. } => "E0205",
            Self::NotCallable { .. } => "E0206",
            Self::DivisionByZero { .. } => "E0207",
            Self::Redeclared { .. } => "E0208",
            Self::Raised { .. } => "E0209",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
            .with_code(self.code())
            .with_label(Label::primary(self.span(), ""))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable { name, .. } => {
                write!(f, "undefined variable `{name}`")
            }
            Self::UndefinedProperty { name, .. } => {
                write!(f, "no property `{name}` on this value")
            }
            Self::TypeError { message, .. } => write!(f, "{message}"),
            Self::UnknownFilter { name, .. } => write!(f, "unknown filter `{name}`"),
            Self::UnknownTest { name, .. } => write!(f, "unknown test `{name}`"),
            Self::NotCallable { kind, .. } => {
                write!(f, "a value of type {kind} is not callable")
            }
            Self::DivisionByZero { .. } => write!(f, "division by zero"),
            Self::Redeclared { name } => {
                write!(f, "variable `{name}` is already declared")
            }
            Self::Raised { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Loop control escapes the statement walk on the `Err` side so that
/// `?` unwinds nested blocks until the enclosing `for` catches it.
#[derive(Debug)]
pub enum ControlFlow {
    Error(RuntimeError),
    Break,
    Continue,
}

impl From<RuntimeError> for ControlFlow {
    fn from(error: RuntimeError) -> Self {
        ControlFlow::Error(error)
    }
}
