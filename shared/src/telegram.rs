use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};

use crate::GithubHandle;

pub type ChatId = i64;

pub enum MessageType {
    CsvFile((String, Vec<u8>)),
    Message((String, Level)),
    Direct((ChatId, String)),
}

#[derive(Clone)]
pub struct TelegramSubscriber {
    sender: mpsc::UnboundedSender<MessageType>,
}

pub fn escape_markdown(message: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn send_message(
    client: &Client,
    bot_token: &str,
    chat_id: &str,
    message: String,
    level: Level,
) -> anyhow::Result<Response> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);

    let message = if level == Level::INFO {
        message.replace('-', "\\-")
    } else {
        format!("*{}*: `{}`", level.as_str(), escape_markdown(&message))
    };
    let params = [
        ("chat_id", chat_id),
        ("text", &message),
        ("parse_mode", "MarkdownV2"),
    ];

    Ok(client.post(&url).form(&params).send().await?)
}

async fn send_direct(
    client: &Client,
    bot_token: &str,
    chat_id: ChatId,
    message: String,
) -> anyhow::Result<Response> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);
    let chat_id = chat_id.to_string();
    let params = [("chat_id", chat_id.as_str()), ("text", message.as_str())];

    Ok(client.post(&url).form(&params).send().await?)
}

async fn send_csv_to_telegram(
    client: &Client,
    bot_token: &str,
    chat_id: &str,
    csv_content: Vec<u8>,
    filename: String,
) -> anyhow::Result<Response> {
    let url = format!("https://api.telegram.org/bot{}/sendDocument", bot_token);

    let form = multipart::Form::new()
        .text("chat_id", chat_id.to_string())
        .part(
            "document",
            multipart::Part::bytes(csv_content)
                .file_name(filename)
                .mime_str("text/csv")?,
        );

    let response = client.post(&url).multipart(form).send().await?;

    Ok(response)
}

async fn sender_task(
    mut reader: mpsc::UnboundedReceiver<MessageType>,
    client: Client,
    bot_token: String,
    chat_id: String,
) {
    while let Some(msg) = reader.recv().await {
        let result = match msg {
            MessageType::Message((message, level)) => {
                send_message(&client, &bot_token, &chat_id, message, level).await
            }
            MessageType::Direct((user_chat, message)) => {
                send_direct(&client, &bot_token, user_chat, message).await
            }
            MessageType::CsvFile((file, csv)) => {
                send_csv_to_telegram(&client, &bot_token, &chat_id, csv, file).await
            }
        };

        match result {
            Ok(response) if response.status().is_success() => {}
            // Reporting through tracing would loop back into this task
            Ok(response) => eprintln!(
                "Failed to send message: Received HTTP {}:",
                response.status()
            ),
            Err(e) => eprintln!("Failed to send message: {}", e),
        }
    }
}

impl TelegramSubscriber {
    pub async fn new(bot_token: String, chat_id: String) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(sender_task(
            receiver,
            Client::new(),
            bot_token.clone(),
            chat_id.clone(),
        ));
        Self { sender }
    }

    /// A subscriber that drops every message. Used when no bot token is configured.
    pub fn disabled() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }

    pub fn send_to_telegram(&self, message: &str, level: &Level) {
        let _ = self
            .sender
            .send(MessageType::Message((message.to_string(), *level)));
    }

    pub fn send_to_chat(&self, chat_id: ChatId, message: &str) {
        let _ = self
            .sender
            .send(MessageType::Direct((chat_id, message.to_string())));
    }

    pub fn send_csv_file_to_telegram(&self, bytes: Vec<u8>, filename: String) {
        let _ = self.sender.send(MessageType::CsvFile((filename, bytes)));
    }
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for TelegramSubscriber {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let message = format!("{}", visitor);

        // Only warnings and errors reach the admin chat
        let level = event.metadata().level();
        if level <= &Level::WARN {
            self.send_to_telegram(&message, level);
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl fmt::Display for MessageVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

/// Incoming webhook payload, only the fields the bot reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<UpdateMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Link(GithubHandle),
    Unlink,
    Status,
    Unknown(String),
}

impl BotCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let command = words.next()?.strip_prefix('/')?;
        // Group chats append the bot name: /start@vibe_bot
        let command = command.split('@').next().unwrap_or_default();

        Some(match command.to_lowercase().as_str() {
            "start" | "link" => match words.next() {
                Some(login) => Self::Link(login.trim_start_matches('@').to_string()),
                None => Self::Unknown(command.to_string()),
            },
            "stop" | "unlink" => Self::Unlink,
            "status" => Self::Status,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl Update {
    pub fn command(&self) -> Option<(ChatId, BotCommand)> {
        let message = self.message.as_ref()?;
        let command = BotCommand::parse(message.text.as_deref()?)?;
        Some((message.chat.id, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markdown_v2() {
        assert_eq!(escape_markdown("a-b.c!"), "a\\-b\\.c\\!");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn parses_bot_commands() {
        assert_eq!(
            BotCommand::parse("/start @octocat"),
            Some(BotCommand::Link("octocat".to_string()))
        );
        assert_eq!(
            BotCommand::parse("/start@vibe_bot octocat"),
            Some(BotCommand::Link("octocat".to_string()))
        );
        assert_eq!(BotCommand::parse("/stop"), Some(BotCommand::Unlink));
        assert_eq!(BotCommand::parse("/STATUS"), Some(BotCommand::Status));
        assert_eq!(
            BotCommand::parse("/start"),
            Some(BotCommand::Unknown("start".to_string()))
        );
        assert_eq!(BotCommand::parse("hello"), None);
    }

    #[test]
    fn reads_update_payload() {
        let json = r#"{"update_id": 10, "message": {"chat": {"id": 42}, "text": "/link octocat"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(
            update.command(),
            Some((42, BotCommand::Link("octocat".to_string())))
        );

        let json = r#"{"update_id": 11}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.command(), None);
    }
}
