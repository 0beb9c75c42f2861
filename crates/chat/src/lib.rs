//! Chat platform boundary. Typed block templates, inbound event envelopes,
//! and the socket runner that pumps envelopes into the turn loop.
//!
//! Architecture:
//!
//! ```text
//!   transport ──envelope──> ChatRunner ──message──> MessageHandler
//!                                                        │
//!                                                   TurnRunner
//!                                                        │
//!                             ConversationSink <──deltas/cards──
//!                                    │
//!                               ChatClient
//! ```

pub mod cards;
pub mod events;
pub mod socket;
