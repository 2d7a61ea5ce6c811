mod common;

use common::{assert_round_trip, chat_context, reformat};
use serde_json::json;

// ============================================================================
// Style guide
// ============================================================================

#[test]
fn test_expressions_print_in_trimming_tags() {
    assert_eq!(reformat("{{x}}"), "{{- x -}}");
    assert_eq!(reformat("{{ user.name }}"), "{{- user.name -}}");
}

#[test]
fn test_text_prints_as_a_quoted_expression() {
    assert_eq!(
        reformat("Hello {{ name }}!"),
        "{{- \"Hello \" -}}\n{{- name -}}\n{{- \"!\" -}}"
    );
    assert_eq!(reformat("a\nb"), "{{- \"a\\nb\" -}}");
}

#[test]
fn test_if_else_layout() {
    assert_eq!(
        reformat("{% if x %}a{% else %}b{% endif %}"),
        "{%- if x -%}\n    {{- \"a\" -}}\n{%- else -%}\n    {{- \"b\" -}}\n{%- endif -%}"
    );
}

#[test]
fn test_elif_chains_flatten() {
    assert_eq!(
        reformat("{% if a %}1{% elif b %}2{% elif c %}3{% else %}4{% endif %}"),
        "{%- if a -%}\n    {{- \"1\" -}}\n{%- elif b -%}\n    {{- \"2\" -}}\n{%- elif c -%}\n    {{- \"3\" -}}\n{%- else -%}\n    {{- \"4\" -}}\n{%- endif -%}"
    );
}

#[test]
fn test_for_loop_layout() {
    assert_eq!(
        reformat("{% for x in items %}{{ x }}{% endfor %}"),
        "{%- for x in items -%}\n    {{- x -}}\n{%- endfor -%}"
    );
}

#[test]
fn test_for_keeps_its_inline_filter() {
    assert_eq!(
        reformat("{% for x in seq if x > 1 %}{{ x }}{% endfor %}"),
        "{%- for x in seq if x > 1 -%}\n    {{- x -}}\n{%- endfor -%}"
    );
}

#[test]
fn test_nested_blocks_indent_one_level_each() {
    assert_eq!(
        reformat("{% for x in items %}{% if x %}{{ x }}{% endif %}{% endfor %}"),
        "{%- for x in items -%}\n    {%- if x -%}\n        {{- x -}}\n    {%- endif -%}\n{%- endfor -%}"
    );
}

#[test]
fn test_indent_width_is_configurable() {
    assert_eq!(
        jinjet::format("{% if x %}{{ x }}{% endif %}", 2).unwrap(),
        "{%- if x -%}\n  {{- x -}}\n{%- endif -%}"
    );
}

#[test]
fn test_set_and_capture_layout() {
    assert_eq!(reformat("{% set x = 1 + 2 %}"), "{%- set x = 1 + 2 -%}");
    assert_eq!(
        reformat("{% set x %}hi{% endset %}"),
        "{%- set x -%}\n    {{- \"hi\" -}}\n{%- endset -%}"
    );
}

#[test]
fn test_macro_layout() {
    assert_eq!(
        reformat("{% macro f(a, b=1) %}{{ a }}{% endmacro %}"),
        "{%- macro f(a, b=1) -%}\n    {{- a -}}\n{%- endmacro -%}"
    );
}

#[test]
fn test_comment_layout() {
    assert_eq!(reformat("{#x#}"), "{# x #}");
}

// ============================================================================
// Re-parenthesization
// ============================================================================

#[test]
fn test_needed_parentheses_are_kept() {
    assert_eq!(reformat("{{ (1 + 2) * 3 }}"), "{{- (1 + 2) * 3 -}}");
    assert_eq!(reformat("{{ 2 * (3 + 4) * 5 }}"), "{{- 2 * (3 + 4) * 5 -}}");
}

#[test]
fn test_redundant_parentheses_are_dropped() {
    assert_eq!(reformat("{{ 1 + (2 * 3) }}"), "{{- 1 + 2 * 3 -}}");
    assert_eq!(reformat("{{ (a) }}"), "{{- a -}}");
}

#[test]
fn test_filter_and_unary_operands_wrap_binary_expressions() {
    assert_eq!(reformat("{{ (1 + 2) | abs }}"), "{{- (1 + 2) | abs -}}");
    assert_eq!(reformat("{{ not (a and b) }}"), "{{- not (a and b) -}}");
    assert_eq!(reformat("{{ -x + 2 }}"), "{{- -x + 2 -}}");
}

#[test]
fn test_logical_and_comparison_levels_stay_distinct() {
    assert_eq!(reformat("{{ (a and b) == c }}"), "{{- (a and b) == c -}}");
    assert_eq!(reformat("{{ a and b == c }}"), "{{- a and b == c -}}");
    assert_eq!(reformat("{{ (a or b) and c }}"), "{{- (a or b) and c -}}");
    // `in` and `==` share a left-associative level, so these parens
    // are redundant.
    assert_eq!(reformat("{{ (x in xs) == y }}"), "{{- x in xs == y -}}");
}

#[test]
fn test_is_operands_wrap_binary_expressions() {
    assert_eq!(reformat("{{ (1 + 2) is odd }}"), "{{- (1 + 2) is odd -}}");
    assert_eq!(
        reformat("{{ (4 * 4) is divisibleby(2) }}"),
        "{{- (4 * 4) is divisibleby(2) -}}"
    );
    assert_eq!(reformat("{{ n is odd }}"), "{{- n is odd -}}");
}

#[test]
fn test_whole_floats_keep_their_decimal_point() {
    assert_eq!(reformat("{{ 3.0 }}"), "{{- 3.0 -}}");
    assert_eq!(reformat("{{ 3.5 }}"), "{{- 3.5 -}}");
    assert_eq!(reformat("{{ 3.0 is integer }}"), "{{- 3.0 is integer -}}");
}

#[test]
fn test_member_receiver_wraps_non_chain_expressions() {
    assert_eq!(reformat("{{ a.b.c }}"), "{{- a.b.c -}}");
    assert_eq!(
        reformat("{{ ('x' ~ 'y').length }}"),
        "{{- (\"x\" ~ \"y\").length -}}"
    );
}

#[test]
fn test_literals_and_slices() {
    assert_eq!(reformat("{{ {'a': 1} }}"), "{{- { \"a\": 1 } -}}");
    assert_eq!(reformat("{{ [1, 'b'] }}"), "{{- [1, \"b\"] -}}");
    assert_eq!(reformat("{{ seq[1:8:3] }}"), "{{- seq[1:8:3] -}}");
    assert_eq!(reformat("{{ seq[::-1] }}"), "{{- seq[::-1] -}}");
}

#[test]
fn test_ternary_layout() {
    assert_eq!(reformat("{{ a if c else b }}"), "{{- a if c else b -}}");
}

// ============================================================================
// Round-trip property
// ============================================================================

#[test]
fn test_round_trip_plain_interpolation() {
    assert_round_trip("Hello {{ name }}!", json!({ "name": "Ada" }));
}

#[test]
fn test_round_trip_whitespace_heavy_markup() {
    assert_round_trip(
        "<div>\n  {% if x %} yay {% endif %}\n</div>",
        json!({ "x": true }),
    );
}

#[test]
fn test_round_trip_loops_and_metadata() {
    assert_round_trip(
        "{% for m in items %}{{ loop.index }}:{{ m }}{% if not loop.last %}, {% endif %}{% endfor %}",
        json!({ "items": ["a", "b", "c"] }),
    );
}

#[test]
fn test_round_trip_chat_template() {
    let template = "{% for message in messages %}<|im_start|>{{ message.role }}\n{{ message.content }}<|im_end|>\n{% endfor %}{% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";
    assert_round_trip(template, chat_context());
}

#[test]
fn test_round_trip_macros_and_set() {
    assert_round_trip(
        "{% set sep = ' | ' %}{% macro cell(v) %}[{{ v }}]{% endmacro %}{% for x in xs %}{{ cell(x) }}{{ sep if not loop.last }}{% endfor %}",
        json!({ "xs": [1, 2, 3] }),
    );
}

#[test]
fn test_round_trip_grouped_logic_and_tests() {
    assert_round_trip(
        "{{ (a and b) == c }}",
        json!({ "a": false, "b": true, "c": false }),
    );
    assert_round_trip("{{ (1 + 2) is odd }}", json!({}));
    assert_round_trip("{{ 3.0 is integer }}", json!({}));
}

#[test]
fn test_round_trip_filters_and_tests() {
    assert_round_trip(
        "{{ words | sort | join(', ') }} {{ n is divisibleby(3) }}",
        json!({ "words": ["pear", "apple"], "n": 9 }),
    );
}
