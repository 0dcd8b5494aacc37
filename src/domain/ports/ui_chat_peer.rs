//! Contract for the foreground UI chat peer: `ping()` and
//! `launch_issue_chat(key, summary, prompt, return_to_previous)`.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

#[derive(Debug, Clone)]
pub struct LaunchChatResult {
    pub success: bool,
    pub chat_id: Option<String>,
}

#[async_trait]
pub trait UiChatPeer: Send + Sync {
    async fn ping(&self) -> DomainResult<bool>;

    /// Open a new chat seeded with `prompt`, returning a chat id on
    /// success.
    async fn launch_issue_chat(
        &self,
        key: &str,
        summary: &str,
        prompt: &str,
        return_to_previous: bool,
    ) -> DomainResult<LaunchChatResult>;
}
