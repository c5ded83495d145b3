use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use relay_bot::{config::Config, console::ConsolePlatform, logging::init_logging};
use relay_core::{Relay, RelaySettings, UserId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging);

    tracing::info!("Starting relay");
    tracing::info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        base_url = %config.provider_config().resolved_base_url(),
        "Config loaded"
    );

    let client = config.provider_config().create_chat_client()?;
    let platform = Arc::new(ConsolePlatform::new(
        UserId(config.bot.self_id),
        UserId(config.bot.user_id),
    ));
    let relay = Arc::new(Relay::new(
        RelaySettings::from(&config),
        client,
        platform.clone(),
        platform.clone(),
    ));

    tracing::info!("Reading messages from stdin ({} starts a new thread)", relay_bot::console::NEW_THREAD);

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = platform.post_user(&line).await;
        if !relay.should_respond(&message) {
            continue;
        }

        let relay = Arc::clone(&relay);
        tasks.spawn(async move {
            let message_id = message.id;
            if let Err(e) = relay.handle_message(message).await {
                tracing::error!(%message_id, error = %e, "Failed to handle message");
            }
        });
    }

    // Let responses still streaming at end of input finish
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Message task panicked");
        }
    }

    Ok(())
}
