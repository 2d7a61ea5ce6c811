mod common;

use common::{render, render_err};
use jinjet::diagnostic::DiagnosticRenderer;
use jinjet::Error;
use serde_json::json;

// ============================================================================
// Lexical errors
// ============================================================================

#[test]
fn test_unterminated_string() {
    let err = render_err("{{ 'abc }}", json!({}));
    assert!(matches!(err, Error::Lex(_)));
    assert!(err.to_string().contains("unterminated string"));
}

#[test]
fn test_unexpected_character() {
    let err = render_err("{{ a ? b }}", json!({}));
    assert!(matches!(err, Error::Lex(_)));
    assert!(err.to_string().contains("unexpected character"));
}

// ============================================================================
// Syntax errors
// ============================================================================

#[test]
fn test_missing_end_tag() {
    let err = render_err("{% if x %}body", json!({ "x": true }));
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().contains("endif"));
}

#[test]
fn test_unknown_statement() {
    let err = render_err("{% frobnicate %}", json!({}));
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().contains("unknown statement"));
}

#[test]
fn test_unclosed_expression_region() {
    let err = render_err("{{ x", json!({ "x": 1 }));
    assert!(matches!(err, Error::Parse(_)));
}

// ============================================================================
// Runtime errors
// ============================================================================

#[test]
fn test_undefined_variable_is_an_error_not_empty_output() {
    let err = render_err("{{ undefined_name }}", json!({}));
    assert!(matches!(err, Error::Runtime(_)));
    assert!(err.to_string().contains("undefined variable `undefined_name`"));
}

#[test]
fn test_missing_property_is_an_error() {
    let err = render_err("{{ obj.nope }}", json!({ "obj": { "a": 1 } }));
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_defined_test_guards_unresolved_names() {
    assert_eq!(render("{{ missing is defined }}"), "false");
    assert_eq!(render("{% if missing is defined %}{{ missing }}{% endif %}"), "");
    assert_eq!(render("{{ missing is undefined }}"), "true");
}

#[test]
fn test_division_by_zero() {
    assert!(render_err("{{ 1 / 0 }}", json!({}))
        .to_string()
        .contains("division by zero"));
    assert!(render_err("{{ 1 % 0 }}", json!({}))
        .to_string()
        .contains("division by zero"));
}

#[test]
fn test_unknown_filter_and_wrong_kind() {
    let err = render_err("{{ 1 | nosuch }}", json!({}));
    assert!(err.to_string().contains("unknown filter `nosuch`"));
    let err = render_err("{{ 1 | upper }}", json!({}));
    assert!(err.to_string().contains("cannot apply filter `upper`"));
}

#[test]
fn test_unknown_test() {
    let err = render_err("{{ 1 is nosuch }}", json!({}));
    assert!(err.to_string().contains("unknown test `nosuch`"));
}

#[test]
fn test_calling_a_non_callable() {
    let err = render_err("{{ x() }}", json!({ "x": "text" }));
    assert!(err.to_string().contains("not callable"));
}

#[test]
fn test_break_outside_a_loop() {
    let err = render_err("{% break %}", json!({}));
    assert!(err.to_string().contains("only allowed inside a loop"));
}

#[test]
fn test_iterating_a_non_sequence() {
    let err = render_err("{% for x in 5 %}{{ x }}{% endfor %}", json!({}));
    assert!(err.to_string().contains("cannot iterate"));
}

#[test]
fn test_slice_step_of_zero() {
    let err = render_err("{{ [1, 2][::0] }}", json!({}));
    assert!(err.to_string().contains("step must not be zero"));
}

#[test]
fn test_raise_exception() {
    let err = render_err("{{ raise_exception('boom') }}", json!({}));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn test_membership_rejects_undefined_operand() {
    let err = render_err("{{ seq[99] in seq }}", common::number_sequence());
    assert!(err.to_string().contains("cannot apply `in`"));
    let err = render_err("{{ none in seq }}", common::number_sequence());
    assert!(err.to_string().contains("cannot apply `in`"));
}

#[test]
fn test_arithmetic_on_incompatible_kinds() {
    let err = render_err("{{ 1 + none }}", json!({}));
    assert!(err.to_string().contains("cannot apply `+`"));
    let err = render_err("{{ [1] - 1 }}", json!({}));
    assert!(err.to_string().contains("cannot apply `-`"));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_diagnostic_points_at_the_failing_span() {
    let source = "line one\n{{ missing }}";
    let err = jinjet::render(source, &json!({})).unwrap_err();
    let rendered = DiagnosticRenderer::new(source, "template", false).render(&err.to_diagnostic());
    assert!(rendered.contains("error[E0201]"), "{rendered}");
    assert!(rendered.contains("--> template:2:4"), "{rendered}");
    assert!(rendered.contains("{{ missing }}"), "{rendered}");
    assert!(rendered.contains("^^^^^^^"), "{rendered}");
}

#[test]
fn test_parse_diagnostic_code() {
    let err = render_err("{% if x %}", json!({ "x": 1 }));
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code.as_deref(), Some("E0102"));
}
