use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// A named, independently invocable operation with a declared parameter
/// schema. Execution always produces a string: failures are reported as
/// descriptive `Error: ...` results rather than raised, so no tool failure
/// ever crosses into the engine as an exception.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON-schema object describing the accepted arguments.
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: Value) -> String;
}

/// Flat name → tool collection consumed by agents.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Deserializes tool arguments into a typed parameter struct, mapping any
/// shape mismatch to the tool-result error convention.
pub fn parse_arguments<T>(tool_name: &str, arguments: Value) -> Result<T, String>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(arguments)
        .map_err(|err| format!("Error: invalid arguments for {tool_name}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::{parse_arguments, Tool, ToolRegistry};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echoes the provided text"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, arguments: Value) -> String {
            #[derive(Deserialize)]
            struct Params {
                text: String,
            }
            match parse_arguments::<Params>(self.name(), arguments) {
                Ok(params) => params.text,
                Err(error) => error,
            }
        }
    }

    #[tokio::test]
    async fn registry_lookups_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert_eq!(registry.len(), 1);
        let tool = registry.get("echo").expect("registered tool");
        assert_eq!(tool.execute(json!({ "text": "hi" })).await, "hi");
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_string() {
        let result = EchoTool.execute(json!({ "text": 42 })).await;
        assert!(result.starts_with("Error: invalid arguments for echo"));
    }
}
