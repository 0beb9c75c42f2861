use serde::{Deserialize, Serialize};

/// Who produced a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One entry in a conversation history. Insertion order defines replay order
/// when the history seeds a later engine run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Role};

    #[test]
    fn constructors_tag_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hello").role, Role::Assistant);
        assert_eq!(Message::tool("3").role, Role::Tool);
    }

    #[test]
    fn role_serializes_snake_case() {
        let serialized = serde_json::to_string(&Message::assistant("ok")).expect("serialize");
        assert!(serialized.contains("\"assistant\""));
    }
}
