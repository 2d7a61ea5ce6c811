use crate::diagnostic::Span;

/// The lexical category of a token.
///
/// Keywords (`if`, `for`, `and`, ...) are not distinguished here: any bare
/// word lexes as `Identifier` and is told apart by its `value` in the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Raw text between statements and expressions.
    Text,

    NumericLiteral,
    StringLiteral,
    Identifier,

    /// `{%`
    OpenStatement,
    /// `%}`
    CloseStatement,
    /// `{{`
    OpenExpression,
    /// `}}`
    CloseExpression,
    OpenParen,
    CloseParen,
    OpenSquareBracket,
    CloseSquareBracket,
    OpenCurlyBracket,
    CloseCurlyBracket,
    Comma,
    Dot,
    Colon,
    Pipe,

    /// `+` `-` `~`
    AdditiveBinaryOperator,
    /// `*` `/` `%`
    MultiplicativeBinaryOperator,
    /// `<` `>` `<=` `>=` `==` `!=`
    ComparisonBinaryOperator,
    /// `-` or `+` in prefix position
    UnaryOperator,
    /// `=`
    Equals,

    /// `{# ... #}`, value holds the comment body.
    Comment,
}

/// A single token, carrying the raw value as it appeared in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(value: impl Into<String>, kind: TokenKind, span: Span) -> Self {
        Self {
            value: value.into(),
            kind,
            span,
        }
    }
}
