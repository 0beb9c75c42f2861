//! Agent runtime - multi-agent dispatch loop and conversation state
//!
//! This crate hosts the conversation-driven core of switchboard:
//! - **Tools** (`tool`, `tools`) - named operations with a declared JSON
//!   parameter schema and a string result; failures are returned as
//!   descriptive `Error: ...` strings, never raised
//! - **Agent graph** (`graph`) - named agents with bound tool subsets and
//!   validated handoff edges, one designated root
//! - **Engine contract** (`engine`) - the consumed interface of the external
//!   orchestration engine: a finite, ordered event stream per run
//! - **Memory** (`memory`) - per-conversation ordered message history with an
//!   optional cap
//! - **Turn loop** (`turn`) - drains one run's event stream into streamed
//!   text and tool-call cards, then persists the assembled response
//!
//! # Architecture
//!
//! ```text
//! inbound message → ConversationStore → AgentEngine::run → RunEvent stream
//!                        ↑                                      ↓
//!                 append response  ←  TurnRunner  →  TurnSink (chat boundary)
//! ```
//!
//! The orchestration engine itself (LLM calls, routing decisions, tool
//! selection) is an external collaborator behind the `AgentEngine` trait.

pub mod engine;
pub mod graph;
pub mod memory;
pub mod tool;
pub mod tools;
pub mod turn;
