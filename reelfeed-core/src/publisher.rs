use std::env;
use std::time::Duration;

use async_trait::async_trait;
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PublisherSection;
use crate::models::{DirectLinkResult, Listing};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("channel rejected message (status {status}): {description}")]
    Rejected { status: u16, description: String },
    #[error("bot token missing: environment variable {0} is not set")]
    MissingToken(String),
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn post(&self, message: &str) -> PublishResult<()>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramPublisher {
    client: reqwest::Client,
    endpoint: String,
    channel_id: String,
}

impl std::fmt::Debug for TelegramPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramPublisher")
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

impl TelegramPublisher {
    /// Reads the bot token from the environment variable named in `token_env`.
    pub fn new(config: &PublisherSection) -> PublishResult<Self> {
        let token = env::var(&config.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| PublishError::MissingToken(config.token_env.clone()))?;
        Self::with_token(config, &token)
    }

    pub fn with_token(config: &PublisherSection, token: &str) -> PublishResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_base.trim_end_matches('/'),
            token
        );
        Ok(Self {
            client,
            endpoint,
            channel_id: config.channel_id.clone(),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn post(&self, message: &str) -> PublishResult<()> {
        let body = SendMessage {
            chat_id: &self.channel_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let reply: Option<ApiResponse> = response.json().await.ok();
        match reply {
            Some(reply) if status.is_success() && reply.ok => {
                info!(channel = %self.channel_id, "message posted");
                Ok(())
            }
            reply => {
                let description = reply
                    .and_then(|reply| reply.description)
                    .unwrap_or_else(|| "no description".to_string());
                debug!(status = status.as_u16(), %description, "sendMessage refused");
                Err(PublishError::Rejected {
                    status: status.as_u16(),
                    description,
                })
            }
        }
    }
}

/// Renders a resolved listing as an HTML channel message.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    header: String,
}

impl MessageFormatter {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub fn format(&self, listing: &Listing, results: &[DirectLinkResult]) -> String {
        let mut message = format!(
            "<b>{}</b>\n\n<b>{}</b>\n\n<b>Download Links:</b>\n\n",
            encode_text(&self.header),
            encode_text(&listing.title)
        );
        for result in results {
            message.push_str(&format!("<b>{}</b>\n", encode_text(&result.file_name)));
            for (index, link) in result.download_links.iter().enumerate() {
                message.push_str(&format!("{}. {}\n", index + 1, encode_text(link)));
            }
            message.push('\n');
        }
        message.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(token_env: &str) -> PublisherSection {
        PublisherSection {
            api_base: "https://api.telegram.org/".into(),
            channel_id: "-100200".into(),
            token_env: token_env.into(),
            header: "Recently Posted Movie ✅".into(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn formats_header_title_and_numbered_links() {
        let formatter = MessageFormatter::new("Recently Posted Movie ✅");
        let listing = Listing::new("Movie A (2024)", "http://source/a");
        let results = vec![DirectLinkResult::new(
            "movie.a.1080p.mkv",
            vec!["https://fsl/1".into(), "https://pixel/2".into()],
        )];
        let message = formatter.format(&listing, &results);
        assert_eq!(
            message,
            "<b>Recently Posted Movie ✅</b>\n\n<b>Movie A (2024)</b>\n\n<b>Download Links:</b>\n\n\
             <b>movie.a.1080p.mkv</b>\n1. https://fsl/1\n2. https://pixel/2"
        );
    }

    #[test]
    fn escapes_markup_in_titles() {
        let formatter = MessageFormatter::new("New");
        let listing = Listing::new("Tom & Jerry <Remastered>", "http://source/t");
        let results = [
            DirectLinkResult::new("a&b", vec!["https://fsl/get?id=1&part=2".into()]),
            DirectLinkResult::new("<c>", vec![]),
        ];
        let message = formatter.format(&listing, &results);
        assert!(message.contains("<b>Tom &amp; Jerry &lt;Remastered&gt;</b>"));
        assert!(message.contains("<b>a&amp;b</b>\n1. https://fsl/get?id=1&amp;part=2\n"));
        assert!(message.ends_with("<b>&lt;c&gt;</b>"));
    }

    #[test]
    fn builds_send_message_endpoint() {
        let publisher = TelegramPublisher::with_token(&section("UNUSED"), "123:abc").unwrap();
        assert_eq!(
            publisher.endpoint,
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(publisher.channel_id(), "-100200");
    }

    #[test]
    fn missing_token_is_reported_with_variable_name() {
        let err = TelegramPublisher::new(&section("REELFEED_TEST_TOKEN_THAT_IS_NEVER_SET")).unwrap_err();
        assert!(matches!(err, PublishError::MissingToken(name) if name == "REELFEED_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }
}
