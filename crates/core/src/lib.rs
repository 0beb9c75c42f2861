//! Shared foundation for the switchboard bot.
//!
//! This crate holds the pieces every other crate depends on:
//! - `config` - layered application configuration (TOML file, env overrides,
//!   programmatic overrides) with validation at load time
//! - `message` - the conversation message model shared by the memory store,
//!   the agent engine contract, and the chat boundary

pub mod config;
pub mod message;
