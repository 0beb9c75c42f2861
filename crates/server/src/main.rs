mod bootstrap;

use anyhow::Result;
use switchboard_chat::socket::ChatRunner;
use switchboard_core::config::{AppConfig, LoadOptions};
use tokio::task::JoinHandle;

fn init_logging(config: &AppConfig) {
    use switchboard_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Bootstrap with the config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    tracing::info!(
        event_name = "system.server.chat_transport_mode",
        transport_mode = "noop",
        correlation_id = "bootstrap",
        crm_enabled = app.crm_session.is_some(),
        agent_count = app.graph.len(),
        tool_count = app.registry.len(),
        "chat runner transport mode initialized"
    );

    // The chat loop runs on its own task so startup completes and ctrl-c is
    // honored while the transport is still pumping envelopes.
    let chat_task = spawn_chat_runner(app.chat_runner);

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "switchboard-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "switchboard-server stopping"
    );

    chat_task.abort();
    if let Some(session) = &app.crm_session {
        session.close().await;
    }

    Ok(())
}

fn spawn_chat_runner(runner: ChatRunner) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(error) = runner.start().await {
            tracing::error!(
                event_name = "system.server.chat_runner_failed",
                correlation_id = "chat",
                error = %error,
                "chat runner terminated with error"
            );
        }
    })
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use switchboard_agent::engine::NoopAgentEngine;
    use switchboard_agent::memory::ConversationStore;
    use switchboard_agent::turn::TurnRunner;
    use switchboard_chat::events::{ChatEnvelope, MessageHandler, NoopChatClient};
    use switchboard_chat::socket::{ChatRunner, ChatTransport, ReconnectPolicy, TransportError};

    use super::spawn_chat_runner;

    /// Connects and then waits forever, like a live transport between events.
    struct IdleTransport;

    #[async_trait]
    impl ChatTransport for IdleTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
            std::future::pending::<Result<Option<ChatEnvelope>, TransportError>>().await
        }

        async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn startup_does_not_wait_for_the_chat_loop() {
        let handler = MessageHandler::new(
            Arc::new(TurnRunner::new(
                Arc::new(NoopAgentEngine),
                Arc::new(ConversationStore::default()),
            )),
            Arc::new(NoopChatClient),
        );
        let runner =
            ChatRunner::new(Arc::new(IdleTransport), handler, ReconnectPolicy::default());

        let task = spawn_chat_runner(runner);

        // The loop is still pumping; startup already has control back.
        assert!(!task.is_finished());
        task.abort();
    }
}
