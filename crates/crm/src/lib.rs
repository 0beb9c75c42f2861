//! Salesforce integration: an authenticated REST session plus the tools that
//! expose it to the agent graph.
//!
//! The session is constructed once at startup and shared by `Arc`. Login is
//! idempotent, so every tool can call `connect` before its request without
//! coordinating with the others. Responses are shaped before they reach the
//! model: record lists are capped, payloads are truncated at a byte budget,
//! and field listings honor a caller-supplied field cap.

pub mod session;
pub mod tools;

pub use session::{CrmError, CrmSession};
