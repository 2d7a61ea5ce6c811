mod common;

use std::rc::Rc;

use common::{chat_context, render, render_with};
use jinjet::interpreter::{declare_globals, Environment};
use jinjet::value::NativeFunction;
use jinjet::{Template, Value};
use serde_json::json;

#[test]
fn test_plain_text_passes_through() {
    assert_eq!(render("Hello, world!"), "Hello, world!");
    assert_eq!(render(""), "");
}

#[test]
fn test_interpolation() {
    let ctx = json!({ "name": "Ada", "age": 36 });
    assert_eq!(
        render_with("{{ name }} is {{ age }} years old.", ctx),
        "Ada is 36 years old."
    );
}

#[test]
fn test_nested_context_access() {
    let ctx = json!({ "user": { "profile": { "name": "Ada" } } });
    assert_eq!(render_with("{{ user.profile.name }}", ctx.clone()), "Ada");
    assert_eq!(render_with("{{ user['profile']['name'] }}", ctx), "Ada");
}

#[test]
fn test_chatml_style_template() {
    let template = "{% for message in messages %}<|im_start|>{{ message.role }}\n{{ message.content }}<|im_end|>\n{% endfor %}{% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";
    assert_eq!(
        render_with(template, chat_context()),
        "<|im_start|>system\nYou are helpful.<|im_end|>\n\
         <|im_start|>user\nHi there<|im_end|>\n\
         <|im_start|>assistant\nHello!<|im_end|>\n\
         <|im_start|>assistant\n"
    );
}

#[test]
fn test_instruct_style_template() {
    let template = "{{ bos_token }}{% for message in messages %}{% if message.role == 'user' %}[INST] {{ message.content }} [/INST]{% elif message.role == 'assistant' %}{{ message.content }}{{ eos_token }}{% else %}{{ message.content }}{% endif %}{% endfor %}";
    assert_eq!(
        render_with(template, chat_context()),
        "<s>You are helpful.[INST] Hi there [/INST]Hello!</s>"
    );
}

#[test]
fn test_system_message_hoisting() {
    // The first message is folded into the first user turn, a common
    // chat-template pattern.
    let template = "{% if messages[0].role == 'system' %}{% set system_message = messages[0].content %}{% endif %}{% for message in messages %}{% if message.role == 'user' %}[INST] {% if loop.first or (loop.index == 2 and system_message is defined) %}{{ system_message }} {% endif %}{{ message.content }} [/INST]{% endif %}{% endfor %}";
    let rendered = render_with(template, chat_context());
    assert_eq!(rendered, "[INST] You are helpful. Hi there [/INST]");
}

#[test]
fn test_roles_must_alternate_guard() {
    let template = "{% for message in messages %}{% if loop.index0 % 2 == 0 and message.role != 'user' %}{{ raise_exception('Conversation roles must alternate') }}{% endif %}{{ message.content }}{% endfor %}";
    let ctx = json!({ "messages": [{ "role": "assistant", "content": "x" }] });
    let err = jinjet::render(template, &ctx).unwrap_err();
    assert!(err.to_string().contains("must alternate"));
}

#[test]
fn test_template_reuse_across_contexts() {
    let template = Template::new("{{ greeting }}, {{ name }}!").unwrap();
    assert_eq!(
        template
            .render(&json!({ "greeting": "Hello", "name": "Ada" }))
            .unwrap(),
        "Hello, Ada!"
    );
    assert_eq!(
        template
            .render(&json!({ "greeting": "Hej", "name": "Bo" }))
            .unwrap(),
        "Hej, Bo!"
    );
}

#[test]
fn test_render_with_caller_environment() {
    let root = Environment::new();
    declare_globals(&root).unwrap();
    let env = Environment::child(&root);
    env.declare(
        "shout",
        Value::Function(Rc::new(NativeFunction::new("shout", |args, _env| {
            let text = match args.get(0) {
                Value::String(s) => s.to_uppercase(),
                other => other.to_display_string().to_uppercase(),
            };
            Ok(Value::from(text))
        }))),
    )
    .unwrap();

    let template = Template::new("{{ shout('hey') }}").unwrap();
    assert_eq!(template.render_with_env(env).unwrap(), "HEY");
}

#[test]
fn test_context_must_be_an_object() {
    let err = jinjet::render("x", &json!([1, 2])).unwrap_err();
    assert!(err.to_string().contains("context must be a JSON object"));
}

#[test]
fn test_null_context_behaves_like_empty() {
    assert_eq!(
        jinjet::render("{{ 1 + 1 }}", &serde_json::Value::Null).unwrap(),
        "2"
    );
}

#[test]
fn test_adjacent_string_literals_concatenate() {
    assert_eq!(render(r#"{{ "a" "b" "c" }}"#), "abc");
}

#[test]
fn test_object_and_array_literals_render_as_repr() {
    assert_eq!(render("{{ [1, 'a', none] }}"), "[1, \"a\", none]");
    assert_eq!(render("{{ {'k': [1]} }}"), "{\"k\": [1]}");
}

#[test]
fn test_boolean_globals_in_both_casings() {
    assert_eq!(render("{{ True }}|{{ true }}|{{ False }}|{{ None is none }}"), "true|true|false|true");
}
