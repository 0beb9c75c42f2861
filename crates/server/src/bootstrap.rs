use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use switchboard_agent::engine::NoopAgentEngine;
use switchboard_agent::graph::{AgentDefinition, AgentGraph, GraphError};
use switchboard_agent::memory::ConversationStore;
use switchboard_agent::tool::{Tool, ToolRegistry};
use switchboard_agent::tools::{chart, math, text};
use switchboard_agent::turn::TurnRunner;
use switchboard_chat::events::{MessageHandler, NoopChatClient};
use switchboard_chat::socket::{ChatRunner, NoopChatTransport, ReconnectPolicy};
use switchboard_core::config::{AppConfig, ConfigError, LoadOptions};
use switchboard_crm::tools::crm_toolset;
use switchboard_crm::{CrmError, CrmSession};

pub struct Application {
    pub config: AppConfig,
    pub graph: Arc<AgentGraph>,
    pub registry: ToolRegistry,
    pub crm_session: Option<Arc<CrmSession>>,
    pub chat_runner: ChatRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent graph is invalid: {0}")]
    Graph(#[from] GraphError),
    #[error("crm session setup failed: {0}")]
    Crm(#[from] CrmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    // The session is built whenever the integration is enabled; login is
    // deferred to the first CRM tool call.
    let crm_session = if config.crm.enabled {
        Some(Arc::new(CrmSession::new(config.crm.clone())?))
    } else {
        None
    };
    let crm_tools = crm_session.as_ref().map(|session| crm_toolset(Arc::clone(session)));

    let graph = Arc::new(default_agent_graph(crm_tools.clone())?);
    info!(
        event_name = "system.bootstrap.graph_validated",
        correlation_id = "bootstrap",
        agent_count = graph.len(),
        root = graph.root_name(),
        "agent handoff graph validated"
    );

    let mut registry = ToolRegistry::new();
    for agent_name in graph.agent_names() {
        if let Some(agent) = graph.agent(agent_name) {
            for tool in &agent.tools {
                registry.register(Arc::clone(tool));
            }
        }
    }
    info!(
        event_name = "system.bootstrap.tools_registered",
        correlation_id = "bootstrap",
        tool_count = registry.len(),
        "tool registry populated"
    );

    let store = Arc::new(ConversationStore::new(config.memory.max_messages));
    let turn_runner = Arc::new(TurnRunner::new(Arc::new(NoopAgentEngine), store));
    let handler = MessageHandler::new(turn_runner, Arc::new(NoopChatClient));
    let chat_runner =
        ChatRunner::new(Arc::new(NoopChatTransport), handler, ReconnectPolicy::default());

    Ok(Application { config, graph, registry, crm_session, chat_runner })
}

/// The default handoff graph: a concierge root that routes to specialists,
/// each of which hands back to the concierge when done. The CRM specialist
/// only exists when the integration is enabled, so a disabled deployment
/// never carries a dangling handoff edge.
pub fn default_agent_graph(
    crm_tools: Option<Vec<Arc<dyn Tool>>>,
) -> Result<AgentGraph, GraphError> {
    let mut concierge_handoffs = vec!["MathAgent", "StringAgent", "ChartAgent"];
    if crm_tools.is_some() {
        concierge_handoffs.push("SalesforceAgent");
    }

    let mut agents = vec![
        AgentDefinition::new(
            "ConciergeAgent",
            "A helpful assistant that can route requests to specialized agents for math \
             calculations, text manipulation, chart generation, and Salesforce operations. Can \
             also provide general assistance and information.",
            "You are a helpful concierge assistant. Route math-related requests to MathAgent, \
             text manipulation requests to StringAgent, chart generation requests to ChartAgent, \
             and Salesforce-related requests (SOQL queries, CRM operations, record management) to \
             SalesforceAgent. For general questions, you can handle them directly or use \
             available tools.",
        )
        .with_handoffs(concierge_handoffs),
        AgentDefinition::new(
            "MathAgent",
            "Performs mathematical calculations including basic arithmetic, powers, square \
             roots, and modulo operations. Always hands off back to ConciergeAgent after \
             completing the task.",
            "You are a math specialist. After completing any mathematical calculation or task, \
             always hand off back to the ConciergeAgent to continue assisting the user.",
        )
        .with_tools(vec![
            Arc::new(math::SumNumbers),
            Arc::new(math::SubtractNumbers),
            Arc::new(math::MultiplyNumbers),
            Arc::new(math::DivideNumbers),
            Arc::new(math::PowerNumbers),
            Arc::new(math::SquareRoot),
            Arc::new(math::Modulo),
        ])
        .with_handoffs(vec!["ConciergeAgent"]),
        AgentDefinition::new(
            "StringAgent",
            "Handles text manipulation including case conversion, string operations, substring \
             extraction, and text formatting. Always hands off back to ConciergeAgent after \
             completing the task.",
            "You are a text manipulation specialist. After completing any string operation or \
             text processing task, always hand off back to the ConciergeAgent to continue \
             assisting the user.",
        )
        .with_tools(vec![
            Arc::new(text::ToUpperCase),
            Arc::new(text::ToLowerCase),
            Arc::new(text::CapitalizeWords),
            Arc::new(text::GetStringLength),
            Arc::new(text::ReverseString),
            Arc::new(text::ExtractSubstring),
            Arc::new(text::ReplaceText),
            Arc::new(text::SplitString),
            Arc::new(text::TrimWhitespace),
        ])
        .with_handoffs(vec!["ConciergeAgent"]),
        AgentDefinition::new(
            "ChartAgent",
            "Generates charts using the image-charts API.",
            "You are a specialized agent for generating charts. Use the provided tool to create \
             charts based on user specifications. If you cannot fulfill the request, explain why.",
        )
        .with_tools(vec![Arc::new(chart::GenerateChart)])
        .with_handoffs(vec!["ConciergeAgent"]),
    ];

    if let Some(crm_tools) = crm_tools {
        agents.push(
            AgentDefinition::new(
                "SalesforceAgent",
                "Performs Salesforce operations including SOQL queries, CRUD operations, and \
                 API calls.",
                "You are a specialized agent for Salesforce operations. You can execute SOQL \
                 queries, perform SOSL searches across multiple objects, inspect object and \
                 field metadata, read individual records by ID, make direct REST, Tooling API, \
                 and Apex REST calls, and create, update, or delete records. Always validate \
                 object names and field names \
                 before operations, use proper SOQL syntax for queries, and handle errors \
                 gracefully with helpful messages. If you cannot fulfill a request or need \
                 clarification, explain why and suggest alternatives.",
            )
            .with_tools(crm_tools)
            .with_handoffs(vec!["ConciergeAgent"]),
        );
    }

    AgentGraph::new(agents, "ConciergeAgent")
}

#[cfg(test)]
mod tests {
    use switchboard_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use super::{bootstrap, default_agent_graph};

    fn valid_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                chat_app_token: Some("xapp-test".to_owned()),
                chat_bot_token: Some("xoxb-test".to_owned()),
                llm_provider: Some(LlmProvider::Ollama),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_chat_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::Ollama),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("chat.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_valid_overrides() {
        let app = bootstrap(valid_overrides())
            .await
            .expect("bootstrap should succeed with valid overrides");

        // CRM is disabled by default, so the specialist and its tools are absent.
        assert!(app.crm_session.is_none());
        assert_eq!(
            app.graph.agent_names(),
            vec!["ChartAgent", "ConciergeAgent", "MathAgent", "StringAgent"]
        );
        assert!(app.registry.get("sumNumbers").is_some());
        assert!(app.registry.get("generateChart").is_some());
        assert!(app.registry.get("runSoqlQuery").is_none());
    }

    #[tokio::test]
    async fn crm_enabled_bootstrap_registers_salesforce_tools() {
        let mut options = valid_overrides();
        options.overrides.crm_enabled = Some(true);

        let app = bootstrap(options).await.expect("bootstrap should succeed");

        assert!(app.crm_session.is_some());
        assert!(app.graph.agent("SalesforceAgent").is_some());
        assert!(app.registry.get("runSoqlQuery").is_some());
        assert!(app.registry.get("deleteRecord").is_some());
        assert!(app.registry.get("toolingExecute").is_some());
        assert!(app.registry.get("apexExecute").is_some());
    }

    #[test]
    fn default_graph_roots_at_the_concierge() {
        let graph = default_agent_graph(None).expect("graph validates");
        assert_eq!(graph.root_name(), "ConciergeAgent");
        assert_eq!(graph.root().handoffs, vec!["MathAgent", "StringAgent", "ChartAgent"]);
    }
}
