//! Terminal commands sent from the control socket.

use crate::error::AppResult;
use crate::roster::IdentityContext;
use ahflip_core::format_coins;
use ahflip_feed::FeedCommand;
use chrono::Utc;
use tracing::{info, warn};

/// One terminal line, split into its keyword and the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalCommand {
    /// `chat <text>`: say something in the session.
    Chat(String),
    /// `/cofl <cmd>`, `/tpm <cmd>`, `/icymacro <cmd>`.
    Feed(FeedCommand),
    /// `/fc <text>`: feed chat.
    FeedChat(String),
    Stats,
    /// Latency probe.
    Ping,
    /// Sample alert through the alert log.
    Test,
    Unknown(String),
}

impl TerminalCommand {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.trim().splitn(2, ' ');
        let keyword = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim().to_string();
        match keyword {
            "chat" => Self::Chat(rest),
            "/cofl" | "/tpm" | "/icymacro" => Self::Feed(FeedCommand::command(&rest)),
            "/fc" => Self::FeedChat(rest),
            "/stats" => Self::Stats,
            "/ping" => Self::Ping,
            "/test" => Self::Test,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Run `command` against one identity.
pub async fn dispatch(context: &IdentityContext, command: TerminalCommand) -> AppResult<()> {
    match command {
        TerminalCommand::Chat(text) => {
            context.session.send_chat(text).await?;
        }
        TerminalCommand::Feed(command) => {
            context.feed.send(command).await?;
        }
        TerminalCommand::FeedChat(text) => {
            context
                .feed
                .send(FeedCommand::Command {
                    name: "chat".to_string(),
                    args: text,
                })
                .await?;
        }
        TerminalCommand::Stats => log_stats(context),
        TerminalCommand::Ping => {
            context.feed.send(FeedCommand::command("ping")).await?;
            info!(
                identity = %context.name,
                mode = ?context.handle.mode(),
                queued = context.handle.backlog_snapshot().len(),
                "Ping sent"
            );
        }
        TerminalCommand::Test => {
            info!(
                target: "ahflip::alert",
                identity = %context.name,
                item = "Hyperion",
                price = %format_coins(1_700_000_000),
                profit = %format_coins(50_000_000),
                finder = "Craft Cost",
                "Test notification"
            );
        }
        TerminalCommand::Unknown(keyword) => {
            warn!(identity = %context.name, %keyword, "Unknown terminal command");
        }
    }
    Ok(())
}

fn log_stats(context: &IdentityContext) {
    let stats = context.ledger.stats();
    let uptime = stats.uptime_secs(Utc::now());
    info!(
        identity = %context.name,
        uptime = %format!("{}h {}m", uptime / 3600, (uptime % 3600) / 60),
        notified = stats.notified,
        bought = stats.bought,
        sold = stats.sold,
        profit = %format_coins(stats.profit),
        mode = ?context.handle.mode(),
        "Session stats"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(
            TerminalCommand::parse("chat hello there"),
            TerminalCommand::Chat("hello there".to_string())
        );
        assert_eq!(
            TerminalCommand::parse("/tpm chat hi"),
            TerminalCommand::Feed(FeedCommand::Command {
                name: "chat".to_string(),
                args: "hi".to_string()
            })
        );
        assert_eq!(
            TerminalCommand::parse("/fc gm"),
            TerminalCommand::FeedChat("gm".to_string())
        );
        assert_eq!(TerminalCommand::parse("/stats"), TerminalCommand::Stats);
        assert_eq!(TerminalCommand::parse(" /ping "), TerminalCommand::Ping);
        assert_eq!(TerminalCommand::parse("/test"), TerminalCommand::Test);
        assert_eq!(
            TerminalCommand::parse("/warp hub"),
            TerminalCommand::Unknown("/warp".to_string())
        );
    }

    #[tokio::test]
    async fn test_dispatch_targets() {
        let (ctx, parts) = context("Alpha");

        dispatch(&ctx, TerminalCommand::parse("chat hello")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/fc gm")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/cofl flip")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/ping")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/stats")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/test")).await.unwrap();
        dispatch(&ctx, TerminalCommand::parse("/nope")).await.unwrap();

        assert_eq!(parts.session.chats(), vec!["hello".to_string()]);
        assert_eq!(
            parts.feed.sent(),
            vec![
                FeedCommand::Command {
                    name: "chat".to_string(),
                    args: "gm".to_string()
                },
                FeedCommand::command("flip"),
                FeedCommand::command("ping"),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_fails_after_session_loss() {
        let (ctx, parts) = context("Alpha");
        parts.session.drop_connection("kicked");
        assert!(dispatch(&ctx, TerminalCommand::Chat("hi".to_string()))
            .await
            .is_err());
    }
}
