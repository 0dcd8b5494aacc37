//! HTTP client for the foreground UI chat peer's `ping`/`launch_issue_chat` surface.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ui_chat_peer::{LaunchChatResult, UiChatPeer};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct LaunchChatRequest<'a> {
    key: &'a str,
    summary: &'a str,
    prompt: &'a str,
    return_to_previous: bool,
}

#[derive(Debug, Deserialize)]
struct LaunchChatResponse {
    success: bool,
    #[serde(default)]
    chat_id: Option<String>,
}

/// HTTP-backed [`UiChatPeer`] talking to the editor extension's local
/// listener.
pub struct HttpUiChatPeer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUiChatPeer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UiChatPeer for HttpUiChatPeer {
    async fn ping(&self) -> DomainResult<bool> {
        let url = format!("{}/ping", self.base_url);
        match tokio::time::timeout(PING_TIMEOUT, self.client.get(&url).send()).await {
            Ok(Ok(response)) => Ok(response.status().is_success()),
            Ok(Err(_)) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    async fn launch_issue_chat(&self, key: &str, summary: &str, prompt: &str, return_to_previous: bool) -> DomainResult<LaunchChatResult> {
        let url = format!("{}/chats", self.base_url);
        let body = LaunchChatRequest { key, summary, prompt, return_to_previous };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::ExternalTool(format!("ui chat peer request failed: {e}")))?;

        let parsed: LaunchChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::ExternalTool(format!("ui chat peer response malformed: {e}")))?;

        Ok(LaunchChatResult {
            success: parsed.success,
            chat_id: parsed.chat_id,
        })
    }
}
