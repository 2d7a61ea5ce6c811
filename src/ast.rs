use std::rc::Rc;

use crate::diagnostic::Span;

/// Binary operators carry their source spelling so the formatter can
/// reprint them; precedence lives in the parser and formatter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    NotIn,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "~",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(Rc<str>),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    ArrayLiteral(Vec<Expr>),
    TupleLiteral(Vec<Expr>),
    /// Keys are full expressions; identifier keys evaluate to their name.
    ObjectLiteral(Vec<(Expr, Expr)>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
    },
    /// `value if condition` with no `else`: inline filtering.
    Select {
        value: Box<Expr>,
        condition: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `operand | filter`, where the filter side is an identifier or a
    /// call expression with arguments.
    Filter {
        operand: Box<Expr>,
        filter: Box<Expr>,
    },
    Test {
        operand: Box<Expr>,
        negate: bool,
        test: Box<Expr>,
    },
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    /// `name=value` inside an argument list.
    KeywordArgument {
        name: Rc<str>,
        value: Box<Expr>,
    },
    /// `*expr` inside an argument list.
    Spread(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Literal text between tags.
    Text(String),
    /// `{{ expr }}` output region.
    Expression(Expr),
    Comment(String),
    If {
        test: Expr,
        body: Vec<Stmt>,
        /// `elif` chains are nested single-statement `If` alternates.
        alternate: Vec<Stmt>,
    },
    For {
        loopvar: Expr,
        iterable: Expr,
        body: Vec<Stmt>,
        /// `{% else %}` body, rendered when the iterable is empty.
        else_body: Vec<Stmt>,
    },
    /// `{% set target = value %}`, or a `{% set target %}...{% endset %}`
    /// capture block when `value` is `None`.
    Set {
        target: Expr,
        value: Option<Expr>,
        body: Vec<Stmt>,
    },
    Macro {
        name: Rc<str>,
        params: Vec<Expr>,
        body: Vec<Stmt>,
    },
    /// `{% call [(params)] callee(args) %}...{% endcall %}`.
    Call {
        caller_params: Vec<Expr>,
        call: Expr,
        body: Vec<Stmt>,
    },
    /// `{% filter spec %}...{% endfilter %}`.
    Filter {
        filter: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}
