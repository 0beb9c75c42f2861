use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use switchboard_agent::turn::{SinkError, ToolCallRecord, TurnError, TurnRunner, TurnSink};

use crate::cards::{error_message, tool_call_card, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message(_) => ChatEventType::Message,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub conversation_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chat client request failed: {0}")]
pub struct ChatClientError(pub String);

/// Outbound chat platform surface. One implementation per platform; the
/// noop variant keeps the process runnable without platform credentials.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_typing(&self, conversation_id: &str) -> Result<(), ChatClientError>;
    async fn stream_delta(&self, conversation_id: &str, text: &str)
        -> Result<(), ChatClientError>;
    async fn post_message(
        &self,
        conversation_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatClientError>;
}

#[derive(Default)]
pub struct NoopChatClient;

#[async_trait]
impl ChatClient for NoopChatClient {
    async fn send_typing(&self, _conversation_id: &str) -> Result<(), ChatClientError> {
        Ok(())
    }

    async fn stream_delta(
        &self,
        _conversation_id: &str,
        _text: &str,
    ) -> Result<(), ChatClientError> {
        Ok(())
    }

    async fn post_message(
        &self,
        _conversation_id: &str,
        _message: &MessageTemplate,
    ) -> Result<(), ChatClientError> {
        Ok(())
    }
}

/// Turn sink bound to one conversation. Renders records into cards before
/// they cross the platform boundary.
pub struct ConversationSink {
    client: Arc<dyn ChatClient>,
    conversation_id: String,
    correlation_id: String,
}

impl ConversationSink {
    pub fn new(
        client: Arc<dyn ChatClient>,
        conversation_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            conversation_id: conversation_id.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

#[async_trait]
impl TurnSink for ConversationSink {
    async fn send_typing(&self) -> Result<(), SinkError> {
        self.client
            .send_typing(&self.conversation_id)
            .await
            .map_err(|error| SinkError(error.to_string()))
    }

    async fn stream_delta(&self, text: &str) -> Result<(), SinkError> {
        self.client
            .stream_delta(&self.conversation_id, text)
            .await
            .map_err(|error| SinkError(error.to_string()))
    }

    async fn send_tool_card(&self, record: &ToolCallRecord) -> Result<(), SinkError> {
        let card = tool_call_card(record);
        self.client
            .post_message(&self.conversation_id, &card)
            .await
            .map_err(|error| SinkError(error.to_string()))
    }

    async fn send_error(&self, message: &str) -> Result<(), SinkError> {
        let card = error_message(message, &self.correlation_id);
        self.client
            .post_message(&self.conversation_id, &card)
            .await
            .map_err(|error| SinkError(error.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Turn(#[from] TurnError),
}

/// Routes inbound message events into the turn loop. Non-message envelopes
/// are ignored rather than rejected.
pub struct MessageHandler {
    runner: Arc<TurnRunner>,
    client: Arc<dyn ChatClient>,
}

impl MessageHandler {
    pub fn new(runner: Arc<TurnRunner>, client: Arc<dyn ChatClient>) -> Self {
        Self { runner, client }
    }

    pub async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let event = match &envelope.event {
            ChatEvent::Message(event) => event,
            ChatEvent::Unsupported { event_type } => {
                debug!(
                    event_name = "chat.event.ignored",
                    correlation_id = %ctx.correlation_id,
                    event_type = %event_type,
                    "ignoring unsupported chat event"
                );
                return Ok(HandlerResult::Ignored);
            }
        };

        let sink = ConversationSink::new(
            Arc::clone(&self.client),
            event.conversation_id.clone(),
            ctx.correlation_id.clone(),
        );
        let response = self
            .runner
            .run_turn(&event.conversation_id, &event.text, &sink)
            .await?;

        info!(
            event_name = "chat.turn.handled",
            correlation_id = %ctx.correlation_id,
            conversation_id = %event.conversation_id,
            user_id = %event.user_id,
            response_chars = response.chars().count(),
            "chat turn handled"
        );
        Ok(HandlerResult::Processed)
    }
}
