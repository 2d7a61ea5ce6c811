//! Re-serializes a parsed template into canonical source. Every tag is
//! emitted in its whitespace-trimming form and literal text is emitted
//! as a quoted output expression, so the printed layout (newlines and
//! indentation) never leaks into the rendered output.

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp};

const OPEN_STATEMENT: &str = "{%- ";
const CLOSE_STATEMENT: &str = " -%}";

/// Highest precedence; operands of unary, filter, and test expressions
/// use it to force parentheses around any binary expression.
const TIGHT: i32 = i32::MAX;

pub fn format(program: &Program, indent: usize) -> String {
    let unit = " ".repeat(indent);
    let body = format_statements(&program.body, 0, &unit);
    body.strip_suffix('\n').unwrap_or(&body).to_string()
}

fn statement(parts: &[&str]) -> String {
    format!("{}{}{}", OPEN_STATEMENT, parts.join(" "), CLOSE_STATEMENT)
}

fn format_statements(statements: &[Stmt], depth: usize, unit: &str) -> String {
    statements
        .iter()
        .map(|stmt| format_statement(stmt, depth, unit))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_statement(node: &Stmt, depth: usize, unit: &str) -> String {
    let pad = unit.repeat(depth);
    match node {
        Stmt::Text(text) => format!("{}{{{{- {} -}}}}", pad, quote(text)),
        Stmt::Expression(expr) => {
            format!("{}{{{{- {} -}}}}", pad, format_expression(expr, -1))
        }
        Stmt::Comment(text) => format!("{pad}{{# {text} #}}"),
        Stmt::If { .. } => format_if(node, depth, unit),
        Stmt::For {
            loopvar,
            iterable,
            body,
            else_body,
        } => {
            // `for x in items if cond` keeps its inline filter form.
            let iterable_text = match &iterable.kind {
                ExprKind::Select { value, condition } => format!(
                    "{} if {}",
                    format_expression(value, -1),
                    format_expression(condition, -1)
                ),
                _ => format_expression(iterable, -1),
            };
            let mut out = format!(
                "{}{}\n{}",
                pad,
                statement(&[
                    "for",
                    &format_expression(loopvar, -1),
                    "in",
                    &iterable_text
                ]),
                format_statements(body, depth + 1, unit)
            );
            if !else_body.is_empty() {
                out.push_str(&format!(
                    "\n{}{}\n{}",
                    pad,
                    statement(&["else"]),
                    format_statements(else_body, depth + 1, unit)
                ));
            }
            out.push_str(&format!("\n{}{}", pad, statement(&["endfor"])));
            out
        }
        Stmt::Set {
            target,
            value,
            body,
        } => {
            let assignment = match value {
                Some(value) => format!(
                    "{} = {}",
                    format_expression(target, -1),
                    format_expression(value, -1)
                ),
                None => format_expression(target, -1),
            };
            let opening = format!("{}{}", pad, statement(&["set", &assignment]));
            if body.is_empty() {
                opening
            } else {
                format!(
                    "{}\n{}\n{}{}",
                    opening,
                    format_statements(body, depth + 1, unit),
                    pad,
                    statement(&["endset"])
                )
            }
        }
        Stmt::Macro { name, params, body } => {
            let params = params
                .iter()
                .map(|p| format_expression(p, -1))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{}{}\n{}\n{}{}",
                pad,
                statement(&["macro", &format!("{name}({params})")]),
                format_statements(body, depth + 1, unit),
                pad,
                statement(&["endmacro"])
            )
        }
        Stmt::Call {
            caller_params,
            call,
            body,
        } => {
            let keyword = if caller_params.is_empty() {
                "call".to_string()
            } else {
                let params = caller_params
                    .iter()
                    .map(|p| format_expression(p, -1))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("call({params})")
            };
            format!(
                "{}{}\n{}\n{}{}",
                pad,
                statement(&[&keyword, &format_expression(call, -1)]),
                format_statements(body, depth + 1, unit),
                pad,
                statement(&["endcall"])
            )
        }
        Stmt::Filter { filter, body } => format!(
            "{}{}\n{}\n{}{}",
            pad,
            statement(&["filter", &format_expression(filter, -1)]),
            format_statements(body, depth + 1, unit),
            pad,
            statement(&["endfilter"])
        ),
        Stmt::Break => format!("{}{}", pad, statement(&["break"])),
        Stmt::Continue => format!("{}{}", pad, statement(&["continue"])),
    }
}

/// `elif` chains are stored as nested single-statement alternates;
/// flatten them back into one `if`/`elif`/`else` ladder.
fn format_if(node: &Stmt, depth: usize, unit: &str) -> String {
    let pad = unit.repeat(depth);

    let mut clauses: Vec<(&Expr, &[Stmt])> = Vec::new();
    let mut current = node;
    loop {
        let Stmt::If {
            test,
            body,
            alternate,
        } = current
        else {
            break;
        };
        clauses.push((test, body));
        match alternate.as_slice() {
            [only @ Stmt::If { .. }] => current = only,
            _ => break,
        }
    }

    let mut out = String::new();
    for (i, (test, body)) in clauses.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "elif" };
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "{}{}\n{}",
            pad,
            statement(&[keyword, &format_expression(test, -1)]),
            format_statements(body, depth + 1, unit)
        ));
    }

    if let Stmt::If { alternate, .. } = current {
        if !alternate.is_empty() {
            out.push_str(&format!(
                "\n{}{}\n{}",
                pad,
                statement(&["else"]),
                format_statements(alternate, depth + 1, unit)
            ));
        }
    }

    out.push_str(&format!("\n{}{}", pad, statement(&["endif"])));
    out
}

/// The same precedence ladder the parser climbs, so printed output
/// re-parses to the tree it came from; ternaries sit below `or`.
fn precedence(op: BinaryOp) -> i32 {
    match op {
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 4,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 3,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Less
        | BinaryOp::LessEq
        | BinaryOp::Greater
        | BinaryOp::GreaterEq
        | BinaryOp::In
        | BinaryOp::NotIn => 2,
        BinaryOp::And => 1,
        BinaryOp::Or => 0,
    }
}

fn format_expression(node: &Expr, parent_prec: i32) -> String {
    match &node.kind {
        ExprKind::Identifier(name) => name.to_string(),
        ExprKind::IntegerLiteral(n) => n.to_string(),
        // A whole float keeps its decimal point so it re-parses as a
        // float, not an integer.
        ExprKind::FloatLiteral(n) if n.fract() == 0.0 => format!("{n:.1}"),
        ExprKind::FloatLiteral(n) => n.to_string(),
        ExprKind::StringLiteral(s) => quote(s),
        ExprKind::ArrayLiteral(elements) => {
            let parts: Vec<String> = elements.iter().map(|e| format_expression(e, -1)).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::TupleLiteral(elements) => {
            let parts: Vec<String> = elements.iter().map(|e| format_expression(e, -1)).collect();
            format!("({})", parts.join(", "))
        }
        ExprKind::ObjectLiteral(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!("{}: {}", format_expression(k, -1), format_expression(v, -1))
                })
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        ExprKind::Binary { op, left, right } => {
            let this_prec = precedence(*op);
            let left = format_expression(left, this_prec);
            let right = format_expression(right, this_prec + 1);
            let text = format!("{} {} {}", left, op.symbol(), right);
            if this_prec < parent_prec {
                format!("({text})")
            } else {
                text
            }
        }
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Not => format!("not {}", format_expression(operand, TIGHT)),
            UnaryOp::Neg => format!("-{}", format_expression(operand, TIGHT)),
        },
        ExprKind::Ternary {
            condition,
            true_expr,
            false_expr,
        } => {
            let text = format!(
                "{} if {} else {}",
                format_expression(true_expr, -1),
                format_expression(condition, -1),
                format_expression(false_expr, -1)
            );
            if parent_prec > -1 {
                format!("({text})")
            } else {
                text
            }
        }
        ExprKind::Select { value, condition } => format!(
            "{} if {}",
            format_expression(value, -1),
            format_expression(condition, -1)
        ),
        ExprKind::Member {
            object,
            property,
            computed,
        } => {
            let mut receiver = format_expression(object, -1);
            // Only literal receivers need wrapping; chains read as-is.
            if !matches!(
                object.kind,
                ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Call { .. }
            ) {
                receiver = format!("({receiver})");
            }
            if *computed {
                format!("{}[{}]", receiver, format_expression(property, -1))
            } else {
                format!("{}.{}", receiver, format_expression(property, -1))
            }
        }
        ExprKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(|a| format_expression(a, -1)).collect();
            format!("{}({})", format_expression(callee, -1), args.join(", "))
        }
        ExprKind::Filter { operand, filter } => format!(
            "{} | {}",
            format_expression(operand, TIGHT),
            format_expression(filter, -1)
        ),
        ExprKind::Test {
            operand,
            negate,
            test,
        } => format!(
            "{} is{} {}",
            // `is` binds tighter than any binary operator.
            format_expression(operand, TIGHT),
            if *negate { " not" } else { "" },
            format_expression(test, -1)
        ),
        ExprKind::Slice { start, stop, step } => {
            let part = |p: &Option<Box<Expr>>| {
                p.as_ref()
                    .map(|e| format_expression(e, -1))
                    .unwrap_or_default()
            };
            let mut text = format!("{}:{}", part(start), part(stop));
            if let Some(step) = step {
                text.push(':');
                text.push_str(&format_expression(step, -1));
            }
            text
        }
        ExprKind::KeywordArgument { name, value } => {
            format!("{}={}", name, format_expression(value, -1))
        }
        ExprKind::Spread(inner) => format!("*{}", format_expression(inner, -1)),
    }
}

/// Double-quoted canonical string form, using the same escapes the
/// lexer understands.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000B}' => out.push_str("\\v"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
