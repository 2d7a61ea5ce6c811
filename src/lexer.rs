use std::fmt;

use crate::diagnostic::{Diagnostic, Label, Span};
use crate::token::{Token, TokenKind};

/// Whitespace handling applied before tokenization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Remove the newline that directly follows a block tag.
    pub trim_blocks: bool,
    /// Strip indentation from the start of a line up to a block tag.
    pub lstrip_blocks: bool,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(&self.message)
            .with_code("E0101")
            .with_label(Label::primary(self.span, ""))
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexError {}

/// Operator and punctuation table, longest match first within each
/// overlapping family.
const SYMBOL_MAP: &[(&str, TokenKind)] = &[
    ("{%", TokenKind::OpenStatement),
    ("%}", TokenKind::CloseStatement),
    ("{{", TokenKind::OpenExpression),
    ("}}", TokenKind::CloseExpression),
    ("(", TokenKind::OpenParen),
    (")", TokenKind::CloseParen),
    ("{", TokenKind::OpenCurlyBracket),
    ("}", TokenKind::CloseCurlyBracket),
    ("[", TokenKind::OpenSquareBracket),
    ("]", TokenKind::CloseSquareBracket),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    (":", TokenKind::Colon),
    ("|", TokenKind::Pipe),
    ("<=", TokenKind::ComparisonBinaryOperator),
    (">=", TokenKind::ComparisonBinaryOperator),
    ("==", TokenKind::ComparisonBinaryOperator),
    ("!=", TokenKind::ComparisonBinaryOperator),
    ("<", TokenKind::ComparisonBinaryOperator),
    (">", TokenKind::ComparisonBinaryOperator),
    ("+", TokenKind::AdditiveBinaryOperator),
    ("-", TokenKind::AdditiveBinaryOperator),
    ("~", TokenKind::AdditiveBinaryOperator),
    ("*", TokenKind::MultiplicativeBinaryOperator),
    ("/", TokenKind::MultiplicativeBinaryOperator),
    ("%", TokenKind::MultiplicativeBinaryOperator),
    ("=", TokenKind::Equals),
];

fn escape_char(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'b' => Some('\u{0008}'),
        'f' => Some('\u{000C}'),
        'v' => Some('\u{000B}'),
        '\'' => Some('\''),
        '"' => Some('"'),
        '\\' => Some('\\'),
        _ => None,
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Rewrites the template before tokenization: trailing-newline removal,
/// `lstrip_blocks`/`trim_blocks`, explicit `-` whitespace markers, and
/// `{% generation %}` markers, in that order.
pub fn preprocess(template: &str, options: Options) -> String {
    let mut out = template.strip_suffix('\n').unwrap_or(template).to_string();

    if options.lstrip_blocks {
        out = out
            .split('\n')
            .map(|line| {
                let stripped = line.trim_start_matches([' ', '\t']);
                if stripped.starts_with("{%") || stripped.starts_with("{#") {
                    stripped
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    if options.trim_blocks {
        out = out.replace("%}\n", "%}").replace("#}\n", "#}");
    }

    out = apply_whitespace_markers(&out);
    strip_generation_markers(&out)
}

/// Handles `{%-`, `{{-`, `{#-` and `-%}`, `-}}`, `-#}` in one pass over
/// the source.
fn apply_whitespace_markers(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{'
            && i + 2 < chars.len()
            && matches!(chars[i + 1], '%' | '{' | '#')
            && chars[i + 2] == '-'
        {
            while out.ends_with([' ', '\t', '\n', '\r']) {
                out.pop();
            }
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 3;
        } else if chars[i] == '-'
            && i + 2 < chars.len()
            && matches!(chars[i + 1], '%' | '}' | '#')
            && chars[i + 2] == '}'
        {
            out.push(chars[i + 1]);
            out.push(chars[i + 2]);
            i += 3;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Removes `{% generation %}` and `{% endgeneration %}` tags, which only
/// mark assistant spans for training-time masking and have no effect on
/// rendering.
fn strip_generation_markers(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' && i + 1 < chars.len() && chars[i + 1] == '%' {
            let mut j = i + 2;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let word_start = j;
            while j < chars.len() && is_word_char(chars[j]) {
                j += 1;
            }
            let word: String = chars[word_start..j].iter().collect();
            if word == "generation" || word == "endgeneration" {
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j + 1 < chars.len() && chars[j] == '%' && chars[j + 1] == '}' {
                    i = j + 2;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

struct Lexer {
    src: Vec<char>,
    cursor: usize,
    tokens: Vec<Token>,
    /// Open `{` brackets inside the current `{{ ... }}` region; while
    /// positive, `}}` closes two object literals instead of the region.
    curly_depth: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            src: source.chars().collect(),
            cursor: 0,
            tokens: Vec::new(),
            curly_depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.cursor).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, ch)| self.src.get(self.cursor + i) == Some(&ch))
    }

    fn in_text_mode(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| t.kind),
            None | Some(TokenKind::Text)
                | Some(TokenKind::CloseStatement)
                | Some(TokenKind::CloseExpression)
                | Some(TokenKind::Comment)
        )
    }

    fn consume_text(&mut self) {
        let start = self.cursor;
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '{' && matches!(self.src.get(self.cursor + 1), Some('%' | '{' | '#')) {
                break;
            }
            text.push(ch);
            self.cursor += 1;
        }
        if !text.is_empty() {
            self.tokens
                .push(Token::new(text, TokenKind::Text, Span::new(start, self.cursor)));
        }
    }

    fn consume_comment(&mut self) -> Result<(), LexError> {
        let start = self.cursor;
        self.cursor += 2;
        let body_start = self.cursor;
        while !self.starts_with("#}") {
            if self.cursor >= self.src.len() {
                return Err(LexError::new(
                    "missing end of comment tag",
                    Span::new(start, self.src.len()),
                ));
            }
            self.cursor += 1;
        }
        let body: String = self.src[body_start..self.cursor].iter().collect();
        self.cursor += 2;
        self.tokens
            .push(Token::new(body, TokenKind::Comment, Span::new(start, self.cursor)));
        Ok(())
    }

    fn consume_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError::new(
                        "unterminated string literal",
                        Span::new(start, self.src.len()),
                    ));
                }
                Some('\\') => {
                    self.cursor += 1;
                    let escaped = self.peek().ok_or_else(|| {
                        LexError::new(
                            "unterminated string literal",
                            Span::new(start, self.src.len()),
                        )
                    })?;
                    match escape_char(escaped) {
                        Some(ch) => value.push(ch),
                        None => {
                            return Err(LexError::new(
                                format!("invalid escape sequence `\\{escaped}`"),
                                Span::new(self.cursor - 1, self.cursor + 1),
                            ));
                        }
                    }
                    self.cursor += 1;
                }
                Some(ch) if ch == quote => {
                    self.cursor += 1;
                    break;
                }
                Some(ch) => {
                    value.push(ch);
                    self.cursor += 1;
                }
            }
        }
        self.tokens.push(Token::new(
            value,
            TokenKind::StringLiteral,
            Span::new(start, self.cursor),
        ));
        Ok(())
    }

    fn consume_digits(&mut self) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.cursor += 1;
        }
        digits
    }

    fn consume_number(&mut self) {
        let start = self.cursor;
        let mut value = self.consume_digits();
        if self.peek() == Some('.')
            && self
                .src
                .get(self.cursor + 1)
                .is_some_and(|ch| ch.is_ascii_digit())
        {
            value.push('.');
            self.cursor += 1;
            value.push_str(&self.consume_digits());
        }
        self.tokens.push(Token::new(
            value,
            TokenKind::NumericLiteral,
            Span::new(start, self.cursor),
        ));
    }

    /// A `-` or `+` right after a value closes is arithmetic; anywhere
    /// else it signs the number (or stands alone as unary minus).
    fn sign_is_binary(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| t.kind),
            Some(
                TokenKind::Identifier
                    | TokenKind::NumericLiteral
                    | TokenKind::StringLiteral
                    | TokenKind::CloseParen
                    | TokenKind::CloseSquareBracket
            )
        )
    }

    fn consume_signed_number(&mut self, sign: char) -> Result<(), LexError> {
        let start = self.cursor;
        self.cursor += 1;
        let digits = self.consume_digits();
        if digits.is_empty() {
            if sign == '+' {
                return Err(LexError::new(
                    "unexpected character `+`",
                    Span::new(start, start + 1),
                ));
            }
            self.tokens.push(Token::new(
                "-",
                TokenKind::UnaryOperator,
                Span::new(start, self.cursor),
            ));
        } else {
            let mut value = String::new();
            value.push(sign);
            value.push_str(&digits);
            if self.peek() == Some('.')
                && self
                    .src
                    .get(self.cursor + 1)
                    .is_some_and(|ch| ch.is_ascii_digit())
            {
                value.push('.');
                self.cursor += 1;
                value.push_str(&self.consume_digits());
            }
            self.tokens.push(Token::new(
                value,
                TokenKind::NumericLiteral,
                Span::new(start, self.cursor),
            ));
        }
        Ok(())
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while self.cursor < self.src.len() {
            if self.in_text_mode() {
                if self.starts_with("{#") {
                    self.consume_comment()?;
                    continue;
                }
                // At a tag opener the text run is empty; fall through to
                // tag tokenization instead of looping on zero progress.
                if !self.starts_with("{{") && !self.starts_with("{%") {
                    self.consume_text();
                    continue;
                }
            }

            while self.peek().is_some_and(|ch| ch.is_whitespace()) {
                self.cursor += 1;
            }
            let Some(ch) = self.peek() else { break };

            if (ch == '-' || ch == '+') && !self.sign_is_binary() {
                self.consume_signed_number(ch)?;
                continue;
            }

            let mut matched = false;
            for (symbol, kind) in SYMBOL_MAP {
                if *kind == TokenKind::CloseExpression && self.curly_depth > 0 {
                    continue;
                }
                if self.starts_with(symbol) {
                    match kind {
                        TokenKind::OpenExpression => self.curly_depth = 0,
                        TokenKind::OpenCurlyBracket => self.curly_depth += 1,
                        TokenKind::CloseCurlyBracket => {
                            self.curly_depth = self.curly_depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    let start = self.cursor;
                    self.cursor += symbol.len();
                    self.tokens
                        .push(Token::new(*symbol, *kind, Span::new(start, self.cursor)));
                    matched = true;
                    break;
                }
            }
            if matched {
                continue;
            }

            if ch == '\'' || ch == '"' {
                self.consume_string(ch)?;
            } else if ch.is_ascii_digit() {
                self.consume_number();
            } else if is_word_char(ch) {
                let start = self.cursor;
                let mut word = String::new();
                while let Some(ch) = self.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    self.cursor += 1;
                }
                self.tokens.push(Token::new(
                    word,
                    TokenKind::Identifier,
                    Span::new(start, self.cursor),
                ));
            } else {
                return Err(LexError::new(
                    format!("unexpected character `{ch}`"),
                    Span::new(self.cursor, self.cursor + 1),
                ));
            }
        }
        Ok(self.tokens)
    }
}

/// Preprocesses and tokenizes a template into a flat token stream.
pub fn tokenize(template: &str, options: Options) -> Result<Vec<Token>, LexError> {
    Lexer::new(&preprocess(template, options)).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(template: &str) -> Vec<TokenKind> {
        tokenize(template, Options::default())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn plain_text_is_one_token() {
        let tokens = tokenize("hello world", Options::default()).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].value, "hello world");
    }

    #[test]
    fn template_starting_with_a_tag_terminates() {
        assert_eq!(
            kinds("{{ x }}"),
            vec![
                TokenKind::OpenExpression,
                TokenKind::Identifier,
                TokenKind::CloseExpression,
            ]
        );
        assert_eq!(kinds("{% if x %}a{% endif %}").first(), Some(&TokenKind::OpenStatement));
        assert_eq!(kinds("{{- a -}}").len(), 3);
    }

    #[test]
    fn text_then_tag_then_text() {
        assert_eq!(
            kinds("a{{ x }}b{% if y %}c"),
            vec![
                TokenKind::Text,
                TokenKind::OpenExpression,
                TokenKind::Identifier,
                TokenKind::CloseExpression,
                TokenKind::Text,
                TokenKind::OpenStatement,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::CloseStatement,
                TokenKind::Text,
            ]
        );
    }

    #[test]
    fn expression_region_tokens() {
        assert_eq!(
            kinds("{{ user.name }}"),
            vec![
                TokenKind::OpenExpression,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::CloseExpression,
            ]
        );
    }

    #[test]
    fn keywords_lex_as_identifiers() {
        let tokens = tokenize("{% for x in items %}", Options::default()).unwrap();
        let words: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(words, vec!["for", "x", "in", "items"]);
    }

    #[test]
    fn string_escapes_decode() {
        let tokens = tokenize(r#"{{ "a\n\t\"b\\" }}"#, Options::default()).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].value, "a\n\t\"b\\");
    }

    #[test]
    fn invalid_escape_is_an_error() {
        let err = tokenize(r#"{{ "\q" }}"#, Options::default()).unwrap_err();
        assert!(err.message.contains("invalid escape"));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("{{ 'abc }}", Options::default()).unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let err = tokenize("{# never closed", Options::default()).unwrap_err();
        assert!(err.message.contains("end of comment"));
    }

    #[test]
    fn signed_number_after_operator() {
        let tokens = tokenize("{{ 5 - -3 }}", Options::default()).unwrap();
        let values: Vec<&str> = tokens[1..4].iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["5", "-", "-3"]);
        assert_eq!(tokens[1].kind, TokenKind::NumericLiteral);
        assert_eq!(tokens[2].kind, TokenKind::AdditiveBinaryOperator);
        assert_eq!(tokens[3].kind, TokenKind::NumericLiteral);
    }

    #[test]
    fn unary_minus_before_identifier() {
        let tokens = tokenize("{{ -x }}", Options::default()).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::UnaryOperator);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn float_literal() {
        let tokens = tokenize("{{ 3.14 }}", Options::default()).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::NumericLiteral);
        assert_eq!(tokens[1].value, "3.14");
    }

    #[test]
    fn object_literal_close_is_not_region_close() {
        let tokens = tokenize("{{ {'a': 1} }}", Options::default()).unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenExpression,
                TokenKind::OpenCurlyBracket,
                TokenKind::StringLiteral,
                TokenKind::Colon,
                TokenKind::NumericLiteral,
                TokenKind::CloseCurlyBracket,
                TokenKind::CloseExpression,
            ]
        );
    }

    #[test]
    fn nested_object_literals_close_in_order() {
        let tokens = tokenize("{{ {'a': {'b': 1}} }}", Options::default()).unwrap();
        let curlies = tokens
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    TokenKind::OpenCurlyBracket | TokenKind::CloseCurlyBracket
                )
            })
            .count();
        assert_eq!(curlies, 4);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::CloseExpression);
    }

    #[test]
    fn comment_token_keeps_body() {
        let tokens = tokenize("a{# note #}b", Options::default()).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].value, " note ");
    }

    #[test]
    fn preprocess_strips_one_trailing_newline() {
        assert_eq!(preprocess("hello\n", Options::default()), "hello");
        assert_eq!(preprocess("hello\n\n", Options::default()), "hello\n");
    }

    #[test]
    fn preprocess_trim_blocks() {
        let options = Options {
            trim_blocks: true,
            lstrip_blocks: false,
        };
        assert_eq!(preprocess("{% if x %}\na", options), "{% if x %}a");
    }

    #[test]
    fn preprocess_lstrip_blocks() {
        let options = Options {
            trim_blocks: false,
            lstrip_blocks: true,
        };
        assert_eq!(preprocess("a\n    {% if x %}", options), "a\n{% if x %}");
        // Output regions keep their indentation.
        assert_eq!(preprocess("a\n    {{ x }}", options), "a\n    {{ x }}");
    }

    #[test]
    fn whitespace_markers_trim_around_tags() {
        assert_eq!(
            preprocess("a   {%- if x -%}   b", Options::default()),
            "a{% if x %}b"
        );
        assert_eq!(preprocess("a\n{{- x -}}\nb", Options::default()), "a{{ x }}b");
    }

    #[test]
    fn generation_markers_are_removed() {
        assert_eq!(
            preprocess("a{% generation %}b{% endgeneration %}c", Options::default()),
            "abc"
        );
    }
}
