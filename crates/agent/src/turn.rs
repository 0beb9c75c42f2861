use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use switchboard_core::message::Message;

use crate::engine::{AgentEngine, EngineError, EventStream, RunEvent};
use crate::memory::ConversationStore;

/// A completed tool invocation, ready to be rendered as a card by the chat
/// boundary. Arguments and timestamp come from the matching start event.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub result: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chat sink failure: {0}")]
pub struct SinkError(pub String);

/// Outbound side effects of one turn. Implemented at the chat boundary;
/// the turn loop stays platform-agnostic.
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn send_typing(&self) -> Result<(), SinkError>;
    async fn stream_delta(&self, text: &str) -> Result<(), SinkError>;
    async fn send_tool_card(&self, record: &ToolCallRecord) -> Result<(), SinkError>;
    async fn send_error(&self, message: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

struct PendingCall {
    tool_name: String,
    arguments: Value,
    started_at: DateTime<Utc>,
}

/// Drives one conversation turn: seeds the engine with prior history, drains
/// the resulting event stream into streamed text and tool-call cards, and
/// persists the assembled assistant response.
///
/// All drain state is local to a single `run_turn` call, so a failed turn
/// can never leave tool-call suppression stuck for the next one.
pub struct TurnRunner {
    engine: Arc<dyn AgentEngine>,
    store: Arc<ConversationStore>,
}

impl TurnRunner {
    pub fn new(engine: Arc<dyn AgentEngine>, store: Arc<ConversationStore>) -> Self {
        Self { engine, store }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub async fn run_turn(
        &self,
        conversation_id: &str,
        utterance: &str,
        sink: &dyn TurnSink,
    ) -> Result<String, TurnError> {
        let memory = self.store.get_or_create(conversation_id).await;
        let history = memory.messages().await;

        sink.send_typing().await?;

        info!(
            event_name = "agent.turn.started",
            conversation_id,
            history_len = history.len(),
            "starting agent turn"
        );

        let mut full_response = String::new();
        let mut pending_call: Option<PendingCall> = None;
        let mut is_tool_calling = false;
        let mut cards_sent = 0usize;

        let drained: Result<(), TurnError> = async {
            let mut events = self.engine.run(utterance, &history).await?;

            while let Some(event) = events.next_event().await? {
                match event {
                    RunEvent::TextDelta { text } => {
                        if is_tool_calling {
                            // Partial "thinking" text tied to tool arguments
                            // must not leak into the visible transcript.
                            continue;
                        }
                        full_response.push_str(&text);
                        sink.stream_delta(&text).await?;
                    }
                    RunEvent::ToolStarted { tool_name, arguments } => {
                        if let Some(previous) = &pending_call {
                            warn!(
                                conversation_id,
                                replaced = %previous.tool_name,
                                started = %tool_name,
                                "tool started while another call was pending; replacing"
                            );
                        }
                        is_tool_calling = true;
                        pending_call =
                            Some(PendingCall { tool_name, arguments, started_at: Utc::now() });
                    }
                    RunEvent::ToolCompleted { tool_name, arguments: _, result } => {
                        match pending_call.take() {
                            Some(pending) if pending.tool_name == tool_name => {
                                let record = ToolCallRecord {
                                    tool_name,
                                    arguments: pending.arguments,
                                    result,
                                    started_at: pending.started_at,
                                };
                                sink.send_tool_card(&record).await?;
                                cards_sent += 1;
                                is_tool_calling = false;
                            }
                            other => {
                                // Unmatched completion: dropped, but logged so
                                // a misbehaving engine stays diagnosable.
                                warn!(
                                    conversation_id,
                                    tool_name,
                                    pending = other.as_ref().map(|call| call.tool_name.as_str()),
                                    "dropping tool completion with no matching start"
                                );
                                pending_call = other;
                            }
                        }
                    }
                    RunEvent::Handoff { from_agent, to_agent } => {
                        debug!(conversation_id, %from_agent, %to_agent, "agent handoff");
                    }
                }
            }
            Ok(())
        }
        .await;

        if let Err(error) = drained {
            warn!(conversation_id, error = %error, "agent turn failed while draining events");
            let notice = format!("Sorry, I encountered an error: {error}");
            if let Err(sink_error) = sink.send_error(&notice).await {
                warn!(conversation_id, error = %sink_error, "failed to surface turn error");
            }
            return Err(error);
        }

        memory.append(Message::assistant(full_response.clone())).await;

        info!(
            event_name = "agent.turn.completed",
            conversation_id,
            response_len = full_response.len(),
            cards_sent,
            "agent turn completed"
        );

        Ok(full_response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use switchboard_core::message::{Message, Role};

    use crate::engine::{
        AgentEngine, EngineError, EventStream, QueuedEventStream, RunEvent,
    };
    use crate::memory::ConversationStore;

    use super::{SinkError, ToolCallRecord, TurnRunner, TurnSink};

    struct ScriptedEngine {
        events: Mutex<Vec<Result<RunEvent, EngineError>>>,
    }

    impl ScriptedEngine {
        fn new(events: Vec<Result<RunEvent, EngineError>>) -> Arc<Self> {
            Arc::new(Self { events: Mutex::new(events) })
        }
    }

    #[async_trait]
    impl AgentEngine for ScriptedEngine {
        async fn run(
            &self,
            _utterance: &str,
            _history: &[Message],
        ) -> Result<Box<dyn EventStream>, EngineError> {
            let events = std::mem::take(&mut *self.events.lock().await);
            Ok(Box::new(QueuedEventStream::new(events)))
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SinkCall {
        Typing,
        Delta(String),
        Card(ToolCallRecord),
        Error(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<SinkCall>>,
    }

    impl RecordingSink {
        async fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().await.clone()
        }

        async fn deltas(&self) -> Vec<String> {
            self.calls
                .lock()
                .await
                .iter()
                .filter_map(|call| match call {
                    SinkCall::Delta(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        async fn cards(&self) -> Vec<ToolCallRecord> {
            self.calls
                .lock()
                .await
                .iter()
                .filter_map(|call| match call {
                    SinkCall::Card(record) => Some(record.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl TurnSink for RecordingSink {
        async fn send_typing(&self) -> Result<(), SinkError> {
            self.calls.lock().await.push(SinkCall::Typing);
            Ok(())
        }

        async fn stream_delta(&self, text: &str) -> Result<(), SinkError> {
            self.calls.lock().await.push(SinkCall::Delta(text.to_owned()));
            Ok(())
        }

        async fn send_tool_card(&self, record: &ToolCallRecord) -> Result<(), SinkError> {
            self.calls.lock().await.push(SinkCall::Card(record.clone()));
            Ok(())
        }

        async fn send_error(&self, message: &str) -> Result<(), SinkError> {
            self.calls.lock().await.push(SinkCall::Error(message.to_owned()));
            Ok(())
        }
    }

    fn runner(engine: Arc<ScriptedEngine>) -> TurnRunner {
        TurnRunner::new(engine, Arc::new(ConversationStore::default()))
    }

    #[tokio::test]
    async fn streams_deltas_immediately_and_accumulates_response() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::TextDelta { text: "Hello, ".to_owned() }),
            Ok(RunEvent::TextDelta { text: "world!".to_owned() }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        let response = runner.run_turn("conv-1", "hi", &sink).await.expect("turn");

        assert_eq!(response, "Hello, world!");
        assert_eq!(sink.deltas().await, vec!["Hello, ", "world!"]);
    }

    #[tokio::test]
    async fn completed_tool_call_renders_exactly_one_card() {
        let arguments = json!({ "a": 1, "b": 2 });
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::ToolStarted {
                tool_name: "sumNumbers".to_owned(),
                arguments: arguments.clone(),
            }),
            Ok(RunEvent::ToolCompleted {
                tool_name: "sumNumbers".to_owned(),
                arguments: arguments.clone(),
                result: "3".to_owned(),
            }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        runner.run_turn("conv-1", "1 + 2?", &sink).await.expect("turn");

        let cards = sink.cards().await;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].tool_name, "sumNumbers");
        assert_eq!(cards[0].arguments, arguments);
        assert_eq!(cards[0].result, "3");
    }

    #[tokio::test]
    async fn deltas_during_tool_call_are_suppressed_entirely() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::TextDelta { text: "before ".to_owned() }),
            Ok(RunEvent::ToolStarted { tool_name: "sumNumbers".to_owned(), arguments: json!({}) }),
            Ok(RunEvent::TextDelta { text: "ignored".to_owned() }),
            Ok(RunEvent::ToolCompleted {
                tool_name: "sumNumbers".to_owned(),
                arguments: json!({}),
                result: "3".to_owned(),
            }),
            Ok(RunEvent::TextDelta { text: "after".to_owned() }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        let response = runner.run_turn("conv-1", "sum", &sink).await.expect("turn");

        assert_eq!(response, "before after");
        assert_eq!(sink.deltas().await, vec!["before ", "after"]);
    }

    #[tokio::test]
    async fn unmatched_completion_is_dropped_and_suppression_persists() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::ToolStarted { tool_name: "sumNumbers".to_owned(), arguments: json!({}) }),
            Ok(RunEvent::ToolCompleted {
                tool_name: "otherTool".to_owned(),
                arguments: json!({}),
                result: "nope".to_owned(),
            }),
            Ok(RunEvent::TextDelta { text: "still suppressed".to_owned() }),
            Ok(RunEvent::ToolCompleted {
                tool_name: "sumNumbers".to_owned(),
                arguments: json!({}),
                result: "3".to_owned(),
            }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        let response = runner.run_turn("conv-1", "sum", &sink).await.expect("turn");

        assert_eq!(response, "");
        let cards = sink.cards().await;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].tool_name, "sumNumbers");
    }

    #[tokio::test]
    async fn second_start_replaces_pending_call() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::ToolStarted {
                tool_name: "sumNumbers".to_owned(),
                arguments: json!({ "a": 1 }),
            }),
            Ok(RunEvent::ToolStarted {
                tool_name: "multiplyNumbers".to_owned(),
                arguments: json!({ "a": 2 }),
            }),
            Ok(RunEvent::ToolCompleted {
                tool_name: "multiplyNumbers".to_owned(),
                arguments: json!({ "a": 2 }),
                result: "4".to_owned(),
            }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        runner.run_turn("conv-1", "math", &sink).await.expect("turn");

        let cards = sink.cards().await;
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].tool_name, "multiplyNumbers");
        assert_eq!(cards[0].arguments, json!({ "a": 2 }));
    }

    #[tokio::test]
    async fn assembled_response_is_persisted_under_assistant_role() {
        let engine = ScriptedEngine::new(vec![Ok(RunEvent::TextDelta {
            text: "final answer".to_owned(),
        })]);
        let store = Arc::new(ConversationStore::default());
        let runner = TurnRunner::new(engine, Arc::clone(&store));
        let sink = RecordingSink::default();

        runner.run_turn("conv-1", "question", &sink).await.expect("turn");

        let messages = store.get_or_create("conv-1").await.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "final answer");
    }

    #[tokio::test]
    async fn stream_failure_surfaces_one_error_and_keeps_prior_memory() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::TextDelta { text: "partial".to_owned() }),
            Err(EngineError::Stream("upstream fault".to_owned())),
        ]);
        let store = Arc::new(ConversationStore::default());
        store.get_or_create("conv-1").await.append(Message::assistant("earlier turn")).await;

        let runner = TurnRunner::new(engine, Arc::clone(&store));
        let sink = RecordingSink::default();

        let result = runner.run_turn("conv-1", "hi", &sink).await;
        assert!(result.is_err());

        let errors: Vec<_> = sink
            .calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, SinkCall::Error(_)))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            SinkCall::Error(message) if message.contains("upstream fault")
        ));

        // Only the history appended before the failed turn survives.
        let messages = store.get_or_create("conv-1").await.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "earlier turn");
    }

    #[tokio::test]
    async fn handoff_events_are_not_rendered() {
        let engine = ScriptedEngine::new(vec![
            Ok(RunEvent::Handoff {
                from_agent: "Concierge".to_owned(),
                to_agent: "Math".to_owned(),
            }),
            Ok(RunEvent::TextDelta { text: "42".to_owned() }),
        ]);
        let runner = runner(engine);
        let sink = RecordingSink::default();

        let response = runner.run_turn("conv-1", "meaning of life", &sink).await.expect("turn");

        assert_eq!(response, "42");
        assert_eq!(sink.calls().await, vec![SinkCall::Typing, SinkCall::Delta("42".to_owned())]);
    }
}
