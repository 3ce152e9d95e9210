//! # qyun
//!
//! Command line client for the Qyun channel messaging service.
//!
//! ## Usage
//!
//! ```bash
//! qyun create <channel>
//! qyun send <channel> <message>
//! qyun stream-send <channel> <message>...
//! qyun listen <channel>
//!
//! # Point at another server
//! QYUN_ENDPOINT=example.com:8000 qyun listen news
//! ```

use anyhow::{bail, Result};
use qyun_client::{Client, ClientConfig, ListenExit};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: qyun <create|send|stream-send|listen> <channel> [message...]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qyun=info,qyun_client=info,qyun_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ClientConfig::load()?;
    let client = Client::new(&config)?;
    qyun_client::metrics::describe_metrics();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [command, channel] if command == "create" => {
            let outcome = client.create_channel(channel).await?;
            println!("{}", outcome.body);
        }
        [command, channel, message] if command == "send" => {
            let outcome = client.send_message(channel, message).await?;
            println!("{}", outcome.body);
        }
        [command, channel, messages @ ..] if command == "stream-send" && !messages.is_empty() => {
            for message in messages {
                client.send_over_stream(channel, message.as_str()).await?;
                tracing::info!(channel = %channel, "Message sent");
            }
            client.close().await;
        }
        [command, channel] if command == "listen" => {
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            match client.listen(channel, cancel).await? {
                ListenExit::Cancelled => tracing::info!("Stopped listening"),
                ListenExit::Closed | ListenExit::HandlerClosed => {
                    tracing::info!("Connection closed")
                }
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
