//! Headless watch-party participant driven from stdin.
//!
//! Usage: `watchparty-client <room> <username>` (or `WATCHPARTY_ROOM` and
//! `WATCHPARTY_USER`). Commands: `ready`, `chat <text>`, `retry`, `quit`.

use std::{env, sync::Arc};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_stream::StreamExt;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchparty_sync::{
    config::AppConfig,
    services::{
        content_service::{ContentLoader, RestContentResolver},
        lobby_service,
        player::ClockPlayer,
        transport::WsTransport,
    },
    state::{SessionView, room::Room},
};

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Ready,
    Chat(&'a str),
    Retry,
    Quit,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        match word {
            "ready" => Some(Self::Ready),
            "chat" => Some(Self::Chat(rest)),
            "retry" => Some(Self::Retry),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = env::args().skip(1);
    let room_id = args
        .next()
        .or_else(|| env::var("WATCHPARTY_ROOM").ok())
        .context("missing room id (argument or WATCHPARTY_ROOM)")?;
    let username = args
        .next()
        .or_else(|| env::var("WATCHPARTY_USER").ok())
        .context("missing username (argument or WATCHPARTY_USER)")?;

    let config = AppConfig::load();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let resolver = RestContentResolver::new(&config.content_api_url)?;
    let loader = ContentLoader::new(Arc::new(resolver), room_id.as_str(), config.content_retry);
    let Some(room) = resolve_room(&loader, &mut lines).await? else {
        return Ok(());
    };
    println!("room {} plays {}", room.id, room.content_uri);

    let transport = WsTransport::new(config.server_url.as_str(), config.reconnect_delay)?;
    let player = ClockPlayer::new(Some(room.content_uri));
    let handle = lobby_service::join(room_id, username, config.timings, transport, player);
    let mut updates = handle.updates();
    let mut last_rendered = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Some(Command::Ready) => handle.toggle_ready()?,
                    Some(Command::Chat(text)) => {
                        if let Err(err) = handle.send_chat(text) {
                            println!("{err}");
                        }
                    }
                    Some(Command::Retry) => println!("content already loaded"),
                    Some(Command::Quit) => break,
                    None => println!("commands: ready | chat <text> | quit"),
                }
            }
            view = updates.next() => {
                let Some(view) = view else {
                    break;
                };
                let rendered = render(&view);
                if rendered != last_rendered {
                    println!("{rendered}");
                    last_rendered = rendered;
                }
            }
        }
    }

    handle.leave().await;
    Ok(())
}

/// Load the room content, waiting for `retry` or `quit` after a failure.
async fn resolve_room(
    loader: &ContentLoader,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<Option<Room>> {
    let mut result = loader.load().await;

    loop {
        match result {
            Ok(room) => return Ok(Some(room)),
            Err(err) => {
                warn!(error = %err, "content unavailable");
                println!("could not load room content: {err}");
                println!("type `retry` to try again or `quit` to exit");
            }
        }

        result = loop {
            let Some(line) = lines.next_line().await.context("reading stdin")? else {
                return Ok(None);
            };
            match Command::parse(&line) {
                Some(Command::Retry) => break loader.retry().await,
                Some(Command::Quit) => return Ok(None),
                _ => println!("content is not loaded yet: `retry` or `quit`"),
            }
        };
    }
}

fn render(view: &SessionView) -> String {
    let mut out = format!(
        "[{}] {}{} ready={} connected={}",
        view.room_id,
        view.username,
        if view.is_host { " (host)" } else { "" },
        view.local_ready,
        view.connected,
    );

    let members: Vec<String> = view
        .participants
        .iter()
        .map(|p| format!("{}{}", p.username, if p.ready { "+" } else { "-" }))
        .collect();
    if !members.is_empty() {
        out.push_str(&format!(" members: {}", members.join(" ")));
    }
    for line in [&view.countdown, &view.ready_notice, &view.sync_indicator]
        .into_iter()
        .flatten()
    {
        out.push_str(&format!("\n  {line}"));
    }
    if let Some(message) = view.chat.last() {
        out.push_str(&format!(
            "\n  <{}> {} ({})",
            message.sender, message.content, message.received_at
        ));
    }
    out
}

/// Configure tracing with `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("ready"), Some(Command::Ready));
        assert_eq!(Command::parse("chat hello there"), Some(Command::Chat("hello there")));
        assert_eq!(Command::parse(" retry "), Some(Command::Retry));
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("dance"), None);
    }
}
