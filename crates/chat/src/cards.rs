use serde::Serialize;
use serde_json::Value;

use switchboard_agent::turn::ToolCallRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Character budget for the inline result preview on a tool card. Longer
/// results move behind the Show Full Result button.
pub const RESULT_PREVIEW_MAX_CHARS: usize = 200;

/// Renders one executed tool call as a card: a header, the tool name and its
/// arguments as facts, the result (previewed when long), and a timestamp.
pub fn tool_call_card(record: &ToolCallRecord) -> MessageTemplate {
    let mut facts = vec![format!("*Tool Name:* {}", record.tool_name)];
    match &record.arguments {
        Value::Object(arguments) => {
            for (key, value) in arguments {
                facts.push(format!("*{key}:* {}", fact_value(value)));
            }
        }
        Value::Null => {}
        other => facts.push(format!("*Arguments:* {}", fact_value(other))),
    }

    let preview_chars = record.result.chars().count();
    let result_text = if preview_chars > RESULT_PREVIEW_MAX_CHARS {
        let preview: String = record.result.chars().take(RESULT_PREVIEW_MAX_CHARS).collect();
        format!("{preview}...")
    } else {
        record.result.clone()
    };

    let mut builder = MessageBuilder::new(format!("Tool call executed: {}", record.tool_name))
        .section("tool_call.header.v1", |section| {
            section.mrkdwn(":wrench: *Tool Call Executed*");
        })
        .section("tool_call.facts.v1", |section| {
            section.mrkdwn(facts.join("\n"));
        })
        .section("tool_call.result.v1", |section| {
            section.plain(result_text);
        });

    if preview_chars > RESULT_PREVIEW_MAX_CHARS {
        let full_result = record.result.clone();
        builder = builder.actions("tool_call.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("tool_call.show_full_result.v1", "Show Full Result")
                    .value(full_result),
            );
        });
    }

    builder
        .context("tool_call.context.v1", |context| {
            context.plain(format!("Executed at {}", record.started_at.to_rfc3339()));
        })
        .build()
}

/// Facts render scalar values without JSON quoting; anything structured is
/// serialized as-is.
fn fact_value(value: &Value) -> String {
    match value {
        Value::String(inner) => inner.clone(),
        other => other.to_string(),
    }
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("turn.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("turn.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use switchboard_agent::turn::ToolCallRecord;

    use super::{error_message, tool_call_card, Block, TextObject, RESULT_PREVIEW_MAX_CHARS};

    fn record(result: &str) -> ToolCallRecord {
        ToolCallRecord {
            tool_name: "sumNumbers".to_owned(),
            arguments: json!({ "a": 1, "b": 2 }),
            result: result.to_owned(),
            started_at: Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).single().expect("valid time"),
        }
    }

    #[test]
    fn short_result_renders_verbatim_without_expand_button() {
        let message = tool_call_card(&record("3"));

        assert!(matches!(
            &message.blocks[0],
            Block::Section { text: TextObject::Mrkdwn { text }, .. }
                if text == ":wrench: *Tool Call Executed*"
        ));
        assert!(matches!(
            &message.blocks[2],
            Block::Section { text: TextObject::Plain { text }, .. } if text == "3"
        ));
        assert!(
            !message.blocks.iter().any(|block| matches!(block, Block::Actions { .. })),
            "short results need no expand button"
        );
    }

    #[test]
    fn facts_include_tool_name_and_plain_argument_values() {
        let message = tool_call_card(&record("3"));

        let facts = match &message.blocks[1] {
            Block::Section { text: TextObject::Mrkdwn { text }, .. } => text.clone(),
            other => panic!("expected facts section, got {other:?}"),
        };
        assert!(facts.starts_with("*Tool Name:* sumNumbers"));
        assert!(facts.contains("*a:* 1"));
        assert!(facts.contains("*b:* 2"));
    }

    #[test]
    fn string_arguments_render_without_json_quotes() {
        let mut record = record("HELLO");
        record.arguments = json!({ "input": "hello" });
        let message = tool_call_card(&record);

        let facts = match &message.blocks[1] {
            Block::Section { text: TextObject::Mrkdwn { text }, .. } => text.clone(),
            other => panic!("expected facts section, got {other:?}"),
        };
        assert!(facts.contains("*input:* hello"));
        assert!(!facts.contains("\"hello\""));
    }

    #[test]
    fn long_result_is_previewed_with_show_full_result_button() {
        let long_result = "x".repeat(RESULT_PREVIEW_MAX_CHARS + 50);
        let message = tool_call_card(&record(&long_result));

        let preview = match &message.blocks[2] {
            Block::Section { text: TextObject::Plain { text }, .. } => text.clone(),
            other => panic!("expected result section, got {other:?}"),
        };
        assert_eq!(preview.chars().count(), RESULT_PREVIEW_MAX_CHARS + 3);
        assert!(preview.ends_with("..."));

        let button = message
            .blocks
            .iter()
            .find_map(|block| match block {
                Block::Actions { elements, .. } => elements.first(),
                _ => None,
            })
            .expect("expand button present");
        assert_eq!(button.action_id, "tool_call.show_full_result.v1");
        assert_eq!(button.value.as_deref(), Some(long_result.as_str()));
    }

    #[test]
    fn boundary_length_result_is_not_truncated() {
        let exact = "y".repeat(RESULT_PREVIEW_MAX_CHARS);
        let message = tool_call_card(&record(&exact));

        assert!(matches!(
            &message.blocks[2],
            Block::Section { text: TextObject::Plain { text }, .. } if *text == exact
        ));
        assert!(!message.blocks.iter().any(|block| matches!(block, Block::Actions { .. })));
    }

    #[test]
    fn error_template_carries_correlation_id() {
        let message = error_message("Sorry, I encountered an error: engine failure", "env-9");
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. }
                if matches!(elements.first(), Some(TextObject::Plain { text }) if text.contains("env-9"))
        ));
    }
}
