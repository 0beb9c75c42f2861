use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use switchboard_core::message::Message;

/// One structured event produced while the orchestration engine drives the
/// agent graph for a single user utterance.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    TextDelta { text: String },
    ToolStarted { tool_name: String, arguments: Value },
    ToolCompleted { tool_name: String, arguments: Value, result: String },
    Handoff { from_agent: String, to_agent: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine run failed to start: {0}")]
    Start(String),
    #[error("engine event stream failed: {0}")]
    Stream(String),
    #[error("engine provider failure: {0}")]
    Provider(String),
}

/// Ordered, single-pass event sequence for one run. Drained with blocking
/// iteration: the caller suspends at each pull until the next event is
/// ready. Restartable only by calling `AgentEngine::run` again.
#[async_trait]
pub trait EventStream: Send {
    async fn next_event(&mut self) -> Result<Option<RunEvent>, EngineError>;
}

/// Consumed contract of the external agent-orchestration engine. The engine
/// owns all routing decisions (which agent handles a step, which tool to
/// call, when to hand off); this crate only drains the resulting events.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    async fn run(
        &self,
        utterance: &str,
        history: &[Message],
    ) -> Result<Box<dyn EventStream>, EngineError>;
}

/// Default engine used until a real orchestration backend is wired in:
/// acknowledges the utterance with a single text delta.
#[derive(Default)]
pub struct NoopAgentEngine;

#[async_trait]
impl AgentEngine for NoopAgentEngine {
    async fn run(
        &self,
        utterance: &str,
        _history: &[Message],
    ) -> Result<Box<dyn EventStream>, EngineError> {
        Ok(Box::new(QueuedEventStream::new(vec![Ok(RunEvent::TextDelta {
            text: format!("received: {utterance}"),
        })])))
    }
}

/// Event stream backed by a pre-scripted queue. Used by the noop engine and
/// by tests exercising the turn loop.
pub struct QueuedEventStream {
    events: std::collections::VecDeque<Result<RunEvent, EngineError>>,
}

impl QueuedEventStream {
    pub fn new(events: Vec<Result<RunEvent, EngineError>>) -> Self {
        Self { events: events.into() }
    }
}

#[async_trait]
impl EventStream for QueuedEventStream {
    async fn next_event(&mut self) -> Result<Option<RunEvent>, EngineError> {
        match self.events.pop_front() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use switchboard_core::message::Message;

    use super::{AgentEngine, EngineError, EventStream, NoopAgentEngine, QueuedEventStream, RunEvent};

    #[tokio::test]
    async fn queued_stream_is_ordered_and_finite() {
        let mut stream = QueuedEventStream::new(vec![
            Ok(RunEvent::TextDelta { text: "a".to_owned() }),
            Err(EngineError::Stream("boom".to_owned())),
        ]);

        assert_eq!(
            stream.next_event().await.expect("first event"),
            Some(RunEvent::TextDelta { text: "a".to_owned() })
        );
        assert!(stream.next_event().await.is_err());
        assert_eq!(stream.next_event().await.expect("exhausted"), None);
    }

    #[tokio::test]
    async fn noop_engine_acknowledges_utterance() {
        let engine = NoopAgentEngine;
        let mut stream =
            engine.run("hello", &[Message::user("prior")]).await.expect("run starts");

        let first = stream.next_event().await.expect("event");
        assert_eq!(first, Some(RunEvent::TextDelta { text: "received: hello".to_owned() }));
        assert_eq!(stream.next_event().await.expect("end"), None);
    }
}
