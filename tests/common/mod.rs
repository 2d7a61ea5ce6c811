#![allow(dead_code)]

use jinjet::{Options, Template};
use serde_json::json;

pub fn render(source: &str) -> String {
    jinjet::render(source, &json!({})).unwrap()
}

pub fn render_with(source: &str, context: serde_json::Value) -> String {
    jinjet::render(source, &context).unwrap()
}

pub fn render_err(source: &str, context: serde_json::Value) -> jinjet::Error {
    jinjet::render(source, &context).unwrap_err()
}

pub fn render_trimmed(source: &str, context: serde_json::Value) -> String {
    let options = Options {
        trim_blocks: true,
        lstrip_blocks: true,
    };
    Template::with_options(source, options)
        .unwrap()
        .render(&context)
        .unwrap()
}

pub fn reformat(source: &str) -> String {
    jinjet::format(source, 4).unwrap()
}

/// Renders a template twice, once as written and once after a format
/// pass, and checks both produce the same output.
pub fn assert_round_trip(source: &str, context: serde_json::Value) {
    let direct = jinjet::render(source, &context).unwrap();
    let formatted = jinjet::format(source, 4).unwrap();
    let replayed = jinjet::render(&formatted, &context).unwrap();
    assert_eq!(direct, replayed, "formatted source:\n{formatted}");
}

pub fn chat_context() -> serde_json::Value {
    json!({
        "messages": [
            { "role": "system", "content": "You are helpful." },
            { "role": "user", "content": "Hi there" },
            { "role": "assistant", "content": "Hello!" },
        ],
        "bos_token": "<s>",
        "eos_token": "</s>",
        "add_generation_prompt": true,
    })
}

pub fn number_sequence() -> serde_json::Value {
    json!({ "seq": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9] })
}
