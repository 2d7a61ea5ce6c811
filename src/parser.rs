use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(&self.message)
            .with_code("E0102")
            .with_label(Label::primary(self.span, ""))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub struct TokenParser {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        let body = self.parse_statements(&[])?;
        Ok(Program { body })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => token.span,
            None => self
                .tokens
                .last()
                .map(|t| Span::new(t.span.end, t.span.end))
                .unwrap_or_else(Span::dummy),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(token) if token.kind == kind => Ok(self.advance().unwrap()),
            Some(token) => Err(ParseError::new(
                format!("expected {}, found `{}`", what, token.value),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("expected {}, found end of template", what),
                self.current_span(),
            )),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Identifier && token.value == keyword)
    }

    fn keyword_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.peek_at(offset), Some(token) if token.kind == TokenKind::Identifier && token.value == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            let found = self
                .peek()
                .map(|t| format!("`{}`", t.value))
                .unwrap_or_else(|| "end of template".to_string());
            Err(ParseError::new(
                format!("expected `{keyword}`, found {found}"),
                self.current_span(),
            ))
        }
    }

    /// Parses statements until a `{% <keyword> %}` tag whose keyword is in
    /// `until`, leaving the cursor on the `{%` token. An empty `until`
    /// parses to the end of the template.
    fn parse_statements(&mut self, until: &[&str]) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                None => {
                    if until.is_empty() {
                        return Ok(body);
                    }
                    return Err(ParseError::new(
                        format!("missing `{{% {} %}}` tag", until[until.len() - 1]),
                        self.current_span(),
                    ));
                }
                Some(TokenKind::OpenStatement) => {
                    if until.iter().any(|kw| self.keyword_at(1, kw)) {
                        return Ok(body);
                    }
                    body.push(self.parse_statement_tag()?);
                }
                _ => body.push(self.parse_one()?),
            }
        }
    }

    fn parse_one(&mut self) -> Result<Stmt, ParseError> {
        let token = self.advance().ok_or_else(|| {
            ParseError::new("unexpected end of template", self.current_span())
        })?;
        match token.kind {
            TokenKind::Text => Ok(Stmt::Text(token.value)),
            TokenKind::Comment => Ok(Stmt::Comment(token.value)),
            TokenKind::OpenExpression => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::CloseExpression, "`}}`")?;
                Ok(Stmt::Expression(expr))
            }
            _ => Err(ParseError::new(
                format!("unexpected token `{}`", token.value),
                token.span,
            )),
        }
    }

    fn parse_statement_tag(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::OpenStatement, "`{%`")?;
        let keyword = self.expect(TokenKind::Identifier, "a statement keyword")?;
        match keyword.value.as_str() {
            "set" => self.parse_set(),
            "if" => self.parse_if(),
            "for" => self.parse_for(),
            "macro" => self.parse_macro(),
            "call" => self.parse_call_statement(),
            "filter" => self.parse_filter_statement(),
            "break" => {
                self.expect(TokenKind::CloseStatement, "`%}`")?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.expect(TokenKind::CloseStatement, "`%}`")?;
                Ok(Stmt::Continue)
            }
            _ => Err(ParseError::new(
                format!("unknown statement `{}`", keyword.value),
                keyword.span,
            )),
        }
    }

    /// Consumes a matching `{% end<name> %}` tag.
    fn expect_end_tag(&mut self, name: &str) -> Result<(), ParseError> {
        self.expect(TokenKind::OpenStatement, "`{%`")?;
        self.expect_keyword(name)?;
        self.expect(TokenKind::CloseStatement, "`%}`")
            .map(|_| ())
    }

    fn parse_set(&mut self) -> Result<Stmt, ParseError> {
        let target = self.parse_expression_sequence(false)?;
        if self.eat(TokenKind::Equals) {
            if !is_assignment_target(&target) {
                return Err(ParseError::new(
                    "invalid assignment target",
                    target.span,
                ));
            }
            let value = self.parse_expression_sequence(false)?;
            self.expect(TokenKind::CloseStatement, "`%}`")?;
            Ok(Stmt::Set {
                target,
                value: Some(value),
                body: Vec::new(),
            })
        } else {
            if !matches!(target.kind, ExprKind::Identifier(_)) {
                return Err(ParseError::new(
                    "a `set` block must capture into a plain name",
                    target.span,
                ));
            }
            self.expect(TokenKind::CloseStatement, "`%}`")?;
            let body = self.parse_statements(&["endset"])?;
            self.expect_end_tag("endset")?;
            Ok(Stmt::Set {
                target,
                value: None,
                body,
            })
        }
    }

    /// Parses from after the `if`/`elif` keyword through the shared
    /// `{% endif %}`. An `elif` arm becomes a nested single-statement
    /// alternate.
    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let test = self.parse_expression()?;
        self.expect(TokenKind::CloseStatement, "`%}`")?;
        let body = self.parse_statements(&["elif", "else", "endif"])?;

        self.expect(TokenKind::OpenStatement, "`{%`")?;
        let mut alternate = Vec::new();
        if self.eat_keyword("elif") {
            alternate.push(self.parse_if()?);
        } else if self.eat_keyword("else") {
            self.expect(TokenKind::CloseStatement, "`%}`")?;
            alternate = self.parse_statements(&["endif"])?;
            self.expect_end_tag("endif")?;
        } else {
            self.expect_keyword("endif")?;
            self.expect(TokenKind::CloseStatement, "`%}`")?;
        }

        Ok(Stmt::If {
            test,
            body,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let loopvar = self.parse_expression_sequence(true)?;
        if !is_loop_variable(&loopvar) {
            return Err(ParseError::new(
                "expected a name or tuple of names to bind each item to",
                loopvar.span,
            ));
        }
        self.expect_keyword("in")?;
        let iterable = self.parse_expression()?;
        self.expect(TokenKind::CloseStatement, "`%}`")?;

        let body = self.parse_statements(&["else", "endfor"])?;
        let mut else_body = Vec::new();
        self.expect(TokenKind::OpenStatement, "`{%`")?;
        if self.eat_keyword("else") {
            self.expect(TokenKind::CloseStatement, "`%}`")?;
            else_body = self.parse_statements(&["endfor"])?;
            self.expect_end_tag("endfor")?;
        } else {
            self.expect_keyword("endfor")?;
            self.expect(TokenKind::CloseStatement, "`%}`")?;
        }

        Ok(Stmt::For {
            loopvar,
            iterable,
            body,
            else_body,
        })
    }

    fn parse_macro(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "a macro name")?;
        self.expect(TokenKind::OpenParen, "`(`")?;
        let params = self.parse_args()?;
        self.expect(TokenKind::CloseStatement, "`%}`")?;
        let body = self.parse_statements(&["endmacro"])?;
        self.expect_end_tag("endmacro")?;
        Ok(Stmt::Macro {
            name: Rc::from(name.value.as_str()),
            params,
            body,
        })
    }

    fn parse_call_statement(&mut self) -> Result<Stmt, ParseError> {
        let mut caller_params = Vec::new();
        if self.eat(TokenKind::OpenParen) {
            caller_params = self.parse_args()?;
        }
        let call = self.parse_expression()?;
        if !matches!(call.kind, ExprKind::Call { .. }) {
            return Err(ParseError::new(
                "expected a call after `{% call %}`",
                call.span,
            ));
        }
        self.expect(TokenKind::CloseStatement, "`%}`")?;
        let body = self.parse_statements(&["endcall"])?;
        self.expect_end_tag("endcall")?;
        Ok(Stmt::Call {
            caller_params,
            call,
            body,
        })
    }

    fn parse_filter_statement(&mut self) -> Result<Stmt, ParseError> {
        let filter = self.parse_filter_target()?;
        self.expect(TokenKind::CloseStatement, "`%}`")?;
        let body = self.parse_statements(&["endfilter"])?;
        self.expect_end_tag("endfilter")?;
        Ok(Stmt::Filter { filter, body })
    }

    /// A filter position accepts a bare name or a call with arguments.
    fn parse_filter_target(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect(TokenKind::Identifier, "a filter name")?;
        let identifier = Expr::new(
            ExprKind::Identifier(Rc::from(name.value.as_str())),
            name.span,
        );
        if self.eat(TokenKind::OpenParen) {
            let args = self.parse_args()?;
            let span = name.span.merge(self.prev_span());
            Ok(Expr::new(
                ExprKind::Call {
                    callee: Box::new(identifier),
                    args,
                },
                span,
            ))
        } else {
            Ok(identifier)
        }
    }

    fn prev_span(&self) -> Span {
        if self.current > 0 {
            self.tokens[self.current - 1].span
        } else {
            Span::dummy()
        }
    }

    /// Comma-separated expressions; more than one element folds into a
    /// tuple. `primary` restricts elements to postfix chains so that a
    /// following `in` keyword is left for the caller.
    fn parse_expression_sequence(&mut self, primary: bool) -> Result<Expr, ParseError> {
        let parse_element = |parser: &mut Self| {
            if primary {
                parser.parse_call_member()
            } else {
                parser.parse_expression()
            }
        };
        let first = parse_element(self)?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(TokenKind::Comma) {
            elements.push(parse_element(self)?);
        }
        let span = elements[0].span.merge(elements[elements.len() - 1].span);
        Ok(Expr::new(ExprKind::TupleLiteral(elements), span))
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    /// `a if cond else b`, or `a if cond` (inline select) with no `else`.
    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let value = self.parse_logical_or()?;
        if !self.eat_keyword("if") {
            return Ok(value);
        }
        let condition = self.parse_logical_or()?;
        if self.eat_keyword("else") {
            let false_expr = self.parse_ternary()?;
            let span = value.span.merge(false_expr.span);
            Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(condition),
                    true_expr: Box::new(value),
                    false_expr: Box::new(false_expr),
                },
                span,
            ))
        } else {
            let span = value.span.merge(condition.span);
            Ok(Expr::new(
                ExprKind::Select {
                    value: Box::new(value),
                    condition: Box::new(condition),
                },
                span,
            ))
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_logical_and()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_logical_not()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_logical_not(&mut self) -> Result<Expr, ParseError> {
        // `not in` belongs to the comparison level, not here.
        if self.at_keyword("not") && !self.keyword_at(1, "in") {
            let start = self.current_span();
            self.current += 1;
            let operand = self.parse_logical_not()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check(TokenKind::ComparisonBinaryOperator) {
                let token = self.advance().unwrap();
                match token.value.as_str() {
                    "==" => BinaryOp::Eq,
                    "!=" => BinaryOp::NotEq,
                    "<" => BinaryOp::Less,
                    "<=" => BinaryOp::LessEq,
                    ">" => BinaryOp::Greater,
                    _ => BinaryOp::GreaterEq,
                }
            } else if self.at_keyword("in") {
                self.current += 1;
                BinaryOp::In
            } else if self.at_keyword("not") && self.keyword_at(1, "in") {
                self.current += 2;
                BinaryOp::NotIn
            } else {
                break;
            };
            let right = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while self.check(TokenKind::AdditiveBinaryOperator) {
            let token = self.advance().unwrap();
            let op = match token.value.as_str() {
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                _ => BinaryOp::Concat,
            };
            let right = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_test()?;
        while self.check(TokenKind::MultiplicativeBinaryOperator) {
            let token = self.advance().unwrap();
            let op = match token.value.as_str() {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.parse_test()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_test(&mut self) -> Result<Expr, ParseError> {
        let mut operand = self.parse_filter_chain()?;
        while self.eat_keyword("is") {
            let negate = self.eat_keyword("not");
            let test = self.parse_filter_target()?;
            let span = operand.span.merge(test.span);
            operand = Expr::new(
                ExprKind::Test {
                    operand: Box::new(operand),
                    negate,
                    test: Box::new(test),
                },
                span,
            );
        }
        Ok(operand)
    }

    fn parse_filter_chain(&mut self) -> Result<Expr, ParseError> {
        let mut operand = self.parse_call_member()?;
        while self.eat(TokenKind::Pipe) {
            let filter = self.parse_filter_target()?;
            let span = operand.span.merge(filter.span);
            operand = Expr::new(
                ExprKind::Filter {
                    operand: Box::new(operand),
                    filter: Box::new(filter),
                },
                span,
            );
        }
        Ok(operand)
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let mut operand = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::Dot) {
                let property = self.expect(TokenKind::Identifier, "a property name")?;
                let span = operand.span.merge(property.span);
                let property = Expr::new(
                    ExprKind::Identifier(Rc::from(property.value.as_str())),
                    property.span,
                );
                operand = Expr::new(
                    ExprKind::Member {
                        object: Box::new(operand),
                        property: Box::new(property),
                        computed: false,
                    },
                    span,
                );
            } else if self.eat(TokenKind::OpenSquareBracket) {
                let index = self.parse_slice_or_index()?;
                let close = self.expect(TokenKind::CloseSquareBracket, "`]`")?;
                let span = operand.span.merge(close.span);
                operand = Expr::new(
                    ExprKind::Member {
                        object: Box::new(operand),
                        property: Box::new(index),
                        computed: true,
                    },
                    span,
                );
            } else if self.eat(TokenKind::OpenParen) {
                let args = self.parse_args()?;
                let span = operand.span.merge(self.prev_span());
                operand = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(operand),
                        args,
                    },
                    span,
                );
            } else {
                break;
            }
        }
        Ok(operand)
    }

    /// Inside `[ ]`: a colon anywhere makes it a slice with up to three
    /// optional parts, otherwise it is a plain index expression.
    fn parse_slice_or_index(&mut self) -> Result<Expr, ParseError> {
        let start_span = self.current_span();
        let mut parts: Vec<Option<Expr>> = Vec::new();
        let mut sliced = false;
        loop {
            if self.check(TokenKind::Colon) || self.check(TokenKind::CloseSquareBracket) {
                parts.push(None);
            } else {
                parts.push(Some(self.parse_expression()?));
            }
            if self.eat(TokenKind::Colon) {
                sliced = true;
                if parts.len() == 3 {
                    return Err(ParseError::new(
                        "a slice takes at most three parts",
                        self.current_span(),
                    ));
                }
            } else {
                break;
            }
        }

        if !sliced {
            return match parts.into_iter().next().flatten() {
                Some(expr) => Ok(expr),
                None => Err(ParseError::new("expected an index expression", start_span)),
            };
        }

        let mut parts = parts.into_iter();
        let start = parts.next().flatten().map(Box::new);
        let stop = parts.next().flatten().map(Box::new);
        let step = parts.next().flatten().map(Box::new);
        let span = start_span.merge(self.current_span());
        Ok(Expr::new(ExprKind::Slice { start, stop, step }, span))
    }

    /// Argument lists for calls, macro parameters, and `{% call %}`
    /// caller parameters, already past the `(`. Supports plain values,
    /// `name=value` keywords, and `*expr` spreads.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.check(TokenKind::CloseParen) {
            if self.peek().is_none() {
                return Err(ParseError::new(
                    "expected `)`, found end of template",
                    self.current_span(),
                ));
            }
            if matches!(self.peek(), Some(t) if t.kind == TokenKind::MultiplicativeBinaryOperator && t.value == "*")
            {
                let star = self.advance().unwrap();
                let value = self.parse_expression()?;
                let span = star.span.merge(value.span);
                args.push(Expr::new(ExprKind::Spread(Box::new(value)), span));
            } else {
                let expr = self.parse_expression()?;
                if self.check(TokenKind::Equals) {
                    let name = match &expr.kind {
                        ExprKind::Identifier(name) => Rc::clone(name),
                        _ => {
                            return Err(ParseError::new(
                                "keyword argument names must be plain identifiers",
                                expr.span,
                            ));
                        }
                    };
                    self.advance();
                    let value = self.parse_expression()?;
                    let span = expr.span.merge(value.span);
                    args.push(Expr::new(
                        ExprKind::KeywordArgument {
                            name,
                            value: Box::new(value),
                        },
                        span,
                    ));
                } else {
                    args.push(expr);
                }
            }
            if !self.check(TokenKind::CloseParen) {
                self.expect(TokenKind::Comma, "`,` or `)`")?;
            }
        }
        self.expect(TokenKind::CloseParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance().ok_or_else(|| {
            ParseError::new("unexpected end of expression", self.current_span())
        })?;
        match token.kind {
            TokenKind::NumericLiteral => {
                if token.value.contains('.') {
                    let number: f64 = token.value.parse().map_err(|_| {
                        ParseError::new(
                            format!("invalid number `{}`", token.value),
                            token.span,
                        )
                    })?;
                    Ok(Expr::new(ExprKind::FloatLiteral(number), token.span))
                } else {
                    let number: i64 = token.value.parse().map_err(|_| {
                        ParseError::new(
                            format!("invalid number `{}`", token.value),
                            token.span,
                        )
                    })?;
                    Ok(Expr::new(ExprKind::IntegerLiteral(number), token.span))
                }
            }
            TokenKind::StringLiteral => {
                // Adjacent string literals concatenate.
                let mut value = token.value;
                let mut span = token.span;
                while self.check(TokenKind::StringLiteral) {
                    let next = self.advance().unwrap();
                    value.push_str(&next.value);
                    span = span.merge(next.span);
                }
                Ok(Expr::new(ExprKind::StringLiteral(value), span))
            }
            TokenKind::Identifier => Ok(Expr::new(
                ExprKind::Identifier(Rc::from(token.value.as_str())),
                token.span,
            )),
            TokenKind::OpenParen => {
                let expr = self.parse_expression_sequence(false)?;
                let close = self.expect(TokenKind::CloseParen, "`)`")?;
                // A parenthesized sequence is already a tuple; a single
                // expression keeps its own node, precedence is restored
                // by the tree shape.
                let span = token.span.merge(close.span);
                Ok(Expr::new(expr.kind, span))
            }
            TokenKind::OpenSquareBracket => {
                let mut elements = Vec::new();
                while !self.check(TokenKind::CloseSquareBracket) {
                    elements.push(self.parse_expression()?);
                    if !self.check(TokenKind::CloseSquareBracket) {
                        self.expect(TokenKind::Comma, "`,` or `]`")?;
                    }
                }
                let close = self.expect(TokenKind::CloseSquareBracket, "`]`")?;
                Ok(Expr::new(
                    ExprKind::ArrayLiteral(elements),
                    token.span.merge(close.span),
                ))
            }
            TokenKind::OpenCurlyBracket => {
                let mut entries = Vec::new();
                while !self.check(TokenKind::CloseCurlyBracket) {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon, "`:`")?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if !self.check(TokenKind::CloseCurlyBracket) {
                        self.expect(TokenKind::Comma, "`,` or `}`")?;
                    }
                }
                let close = self.expect(TokenKind::CloseCurlyBracket, "`}`")?;
                Ok(Expr::new(
                    ExprKind::ObjectLiteral(entries),
                    token.span.merge(close.span),
                ))
            }
            TokenKind::UnaryOperator => {
                let operand = self.parse_call_member()?;
                let span = token.span.merge(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            _ => Err(ParseError::new(
                format!("unexpected token `{}`", token.value),
                token.span,
            )),
        }
    }
}

fn is_assignment_target(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier(_) => true,
        ExprKind::Member { computed, .. } => !computed,
        ExprKind::TupleLiteral(elements) => elements.iter().all(is_assignment_target),
        _ => false,
    }
}

fn is_loop_variable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier(_) => true,
        ExprKind::TupleLiteral(elements) => elements
            .iter()
            .all(|e| matches!(e.kind, ExprKind::Identifier(_))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Options;

    fn parse_ok(template: &str) -> Program {
        let tokens = crate::lexer::tokenize(template, Options::default()).unwrap();
        TokenParser::new(tokens).parse().unwrap()
    }

    fn parse_err(template: &str) -> ParseError {
        let tokens = crate::lexer::tokenize(template, Options::default()).unwrap();
        TokenParser::new(tokens).parse().unwrap_err()
    }

    fn single_expression(template: &str) -> Expr {
        let program = parse_ok(template);
        match program.body.into_iter().next() {
            Some(Stmt::Expression(expr)) => expr,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn elif_nests_in_alternate() {
        let program = parse_ok("{% if a %}1{% elif b %}2{% else %}3{% endif %}");
        let Stmt::If { alternate, .. } = &program.body[0] else {
            panic!("expected if");
        };
        assert_eq!(alternate.len(), 1);
        let Stmt::If {
            alternate: inner, ..
        } = &alternate[0]
        else {
            panic!("expected nested if for elif");
        };
        assert_eq!(inner.len(), 1);
        assert!(matches!(&inner[0], Stmt::Text(t) if t == "3"));
    }

    #[test]
    fn test_binds_tighter_than_multiplication() {
        let expr = single_expression("{{ 4 * 4 is divisibleby(2) }}");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(right.kind, ExprKind::Test { .. }));
    }

    #[test]
    fn filter_binds_tighter_than_test() {
        let expr = single_expression("{{ x | length is odd }}");
        let ExprKind::Test { operand, .. } = expr.kind else {
            panic!("expected test");
        };
        assert!(matches!(operand.kind, ExprKind::Filter { .. }));
    }

    #[test]
    fn select_without_else() {
        let expr = single_expression("{{ x if cond }}");
        assert!(matches!(expr.kind, ExprKind::Select { .. }));
    }

    #[test]
    fn ternary_with_else() {
        let expr = single_expression("{{ x if cond else y }}");
        assert!(matches!(expr.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn for_loop_tuple_destructuring() {
        let program = parse_ok("{% for k, v in items %}{{ k }}{% endfor %}");
        let Stmt::For { loopvar, .. } = &program.body[0] else {
            panic!("expected for");
        };
        assert!(matches!(&loopvar.kind, ExprKind::TupleLiteral(parts) if parts.len() == 2));
    }

    #[test]
    fn slice_with_all_parts() {
        let expr = single_expression("{{ seq[1:8:3] }}");
        let ExprKind::Member { property, .. } = expr.kind else {
            panic!("expected member");
        };
        let ExprKind::Slice { start, stop, step } = property.kind else {
            panic!("expected slice");
        };
        assert!(start.is_some() && stop.is_some() && step.is_some());
    }

    #[test]
    fn slice_with_only_step() {
        let expr = single_expression("{{ seq[::-1] }}");
        let ExprKind::Member { property, .. } = expr.kind else {
            panic!("expected member");
        };
        let ExprKind::Slice { start, stop, step } = property.kind else {
            panic!("expected slice");
        };
        assert!(start.is_none() && stop.is_none() && step.is_some());
    }

    #[test]
    fn keyword_and_spread_arguments() {
        let expr = single_expression("{{ f(1, x=2, *rest) }}");
        let ExprKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
        assert!(matches!(args[1].kind, ExprKind::KeywordArgument { .. }));
        assert!(matches!(args[2].kind, ExprKind::Spread(_)));
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let expr = single_expression(r#"{{ "a" "b" }}"#);
        assert!(matches!(expr.kind, ExprKind::StringLiteral(s) if s == "ab"));
    }

    #[test]
    fn not_in_is_one_operator() {
        let expr = single_expression("{{ x not in items }}");
        let ExprKind::Binary { op, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::NotIn);
    }

    #[test]
    fn stacked_not() {
        let expr = single_expression("{{ not not x }}");
        let ExprKind::Unary { op, operand } = expr.kind else {
            panic!("expected unary");
        };
        assert_eq!(op, UnaryOp::Not);
        assert!(matches!(operand.kind, ExprKind::Unary { .. }));
    }

    #[test]
    fn missing_endfor_is_an_error() {
        let err = parse_err("{% for x in items %}{{ x }}");
        assert!(err.message.contains("endfor"));
    }

    #[test]
    fn mismatched_end_tag_is_an_error() {
        let err = parse_err("{% if a %}x{% endfor %}{% endif %}");
        assert!(err.message.contains("endfor"));
    }

    #[test]
    fn set_capture_block() {
        let program = parse_ok("{% set greeting %}hello{% endset %}{{ greeting }}");
        let Stmt::Set { value, body, .. } = &program.body[0] else {
            panic!("expected set");
        };
        assert!(value.is_none());
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn set_namespace_member_target() {
        let program = parse_ok("{% set ns.total = 1 %}");
        let Stmt::Set { target, .. } = &program.body[0] else {
            panic!("expected set");
        };
        assert!(matches!(target.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn object_literal_inside_expression_region() {
        let expr = single_expression("{{ {'a': 1, 'b': [2, 3]} }}");
        let ExprKind::ObjectLiteral(entries) = expr.kind else {
            panic!("expected object literal");
        };
        assert_eq!(entries.len(), 2);
    }
}
