//! Terminal chat client: tails the active channel and sends stdin lines.
//!
//! `cove [channel-id]` — with no argument the first known channel is joined.
//! Plain lines become messages; `/attach <path> [caption]` sends a file.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use uuid::Uuid;

use cove_chat::compose::{self, Draft, FilePayload};
use cove_chat::session::ChatSession;
use cove_remote::{Gateway, RealtimeFeed, RemoteClient, RemoteConfig};
use cove_types::models::Message;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=debug".into()),
        )
        .init();

    let config = RemoteConfig::from_env().context("remote configuration")?;
    let feed = RealtimeFeed::new(&config);
    let gateway = RemoteClient::new(config);

    let mut session = ChatSession::new(gateway, feed);
    session.bootstrap().await;

    match session.gateway().session().await {
        Ok(user) => info!(
            "signed in as {}",
            user.email.unwrap_or_else(|| user.user_id.to_string())
        ),
        Err(e) => debug!("no user session: {}", e),
    }

    let channel_id = match std::env::args().nth(1) {
        Some(arg) => {
            let id = arg.parse::<Uuid>().context("channel id argument")?;
            let channel = session
                .gateway()
                .get_channel(id)
                .await
                .context("channel lookup")?;
            info!("joining #{}", channel.name);
            id
        }
        None => {
            let channels = session.channels().items().await;
            match channels.first() {
                Some(channel) => {
                    info!("joining #{}", channel.name);
                    channel.id
                }
                None => anyhow::bail!("no channels available; pass a channel id"),
            }
        }
    };

    session.set_channel(Some(channel_id)).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut printed = 0usize;
    let mut reported_drops = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let items = session.messages().items().await;
                if items.len() < printed {
                    printed = items.len();
                }
                for message in &items[printed..] {
                    print_message(message);
                }
                printed = items.len();

                let stats = session.drop_stats();
                let drops = stats.enrichment_misses() + stats.unmatched_updates();
                if drops != reported_drops {
                    debug!(
                        "feed drops: {} enrichment misses, {} unmatched updates",
                        stats.enrichment_misses(),
                        stats.unmatched_updates()
                    );
                    reported_drops = drops;
                }
            }
            line = lines.next_line() => match line? {
                Some(text) => {
                    let draft = match parse_line(text.trim()).await {
                        Some(draft) => draft,
                        None => continue,
                    };
                    if let Err(e) = compose::send_message(session.gateway(), channel_id, draft).await {
                        warn!("send failed: {}", e);
                    }
                }
                None => break, // stdin closed
            },
        }
    }

    session.gateway().sign_out().await.ok();
    Ok(())
}

async fn parse_line(line: &str) -> Option<Draft> {
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix("/attach ") else {
        return Some(Draft::text(line));
    };

    let (path, caption) = match rest.split_once(' ') {
        Some((path, caption)) => (path, caption),
        None => (rest, ""),
    };
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("cannot read {}: {}", path, e);
            return None;
        }
    };
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    Some(Draft {
        text: caption.to_string(),
        file: Some(FilePayload {
            name,
            bytes: bytes.into(),
            content_type: "application/octet-stream".into(),
        }),
    })
}

fn print_message(message: &Message) {
    let sender = message
        .sender
        .as_ref()
        .map(|p| p.full_name.as_str())
        .unwrap_or("unknown");
    let when = message.created_at.format("%H:%M");
    if message.attachments.is_empty() {
        println!("[{}] {}: {}", when, sender, message.text);
    } else {
        println!(
            "[{}] {}: {} [{} attachment(s)]",
            when,
            sender,
            message.text,
            message.attachments.len()
        );
    }
}
