//! Host UI needed to recover from an expired session.

use async_trait::async_trait;

/// Message key shown in the confirmation prompt.
pub const REAUTH_MESSAGE_KEY: &str = "[[error:api.reauth-required]]";

/// Where the user is sent when no interceptor overrides it.
pub const DEFAULT_REAUTH_TARGET: &str = "login";

/// Confirmation prompt plus client-side navigation, provided by the host.
#[async_trait]
pub trait ReauthUi: Send + Sync {
    /// Show a modal prompt for `message_key`; resolve with the user's answer.
    async fn confirm(&self, message_key: &str) -> bool;

    /// Navigate the application to `url`.
    async fn navigate(&self, url: &str);
}
