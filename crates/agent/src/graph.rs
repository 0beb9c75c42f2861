use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::tool::Tool;

/// A named persona with a fixed tool subset, a system prompt, and the set of
/// peers it may hand conversational control to. Constructed once at startup
/// and immutable thereafter.
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub tools: Vec<Arc<dyn Tool>>,
    pub handoffs: Vec<String>,
    pub verbose: bool,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            verbose: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<&str>) -> Self {
        self.handoffs = handoffs.into_iter().map(str::to_owned).collect();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("agent `{0}` is registered more than once")]
    DuplicateAgent(String),
    #[error("root agent `{0}` is not registered in the graph")]
    UnknownRoot(String),
    #[error("agent `{from}` declares a handoff to unregistered agent `{to}`")]
    DanglingHandoff { from: String, to: String },
}

/// Directed handoff graph over agents, validated on construction: unique
/// names, every handoff edge resolves, exactly one root.
pub struct AgentGraph {
    agents: HashMap<String, Arc<AgentDefinition>>,
    root: String,
}

impl AgentGraph {
    pub fn new(agents: Vec<AgentDefinition>, root: &str) -> Result<Self, GraphError> {
        let mut registered: HashMap<String, Arc<AgentDefinition>> = HashMap::new();
        for agent in agents {
            let name = agent.name.clone();
            if registered.insert(name.clone(), Arc::new(agent)).is_some() {
                return Err(GraphError::DuplicateAgent(name));
            }
        }

        if !registered.contains_key(root) {
            return Err(GraphError::UnknownRoot(root.to_owned()));
        }

        for agent in registered.values() {
            for target in &agent.handoffs {
                if !registered.contains_key(target) {
                    return Err(GraphError::DanglingHandoff {
                        from: agent.name.clone(),
                        to: target.clone(),
                    });
                }
            }
        }

        Ok(Self { agents: registered, root: root.to_owned() })
    }

    pub fn root(&self) -> &Arc<AgentDefinition> {
        // Validated at construction; the root key always resolves.
        &self.agents[&self.root]
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<AgentDefinition>> {
        self.agents.get(name)
    }

    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
