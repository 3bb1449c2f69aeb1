//! Client configuration.
//!
//! The base path and CSRF token are owned by the host application and handed
//! to `ApiClient::new`; the client only reads them.

use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// Version segment of every API route.
pub const API_PREFIX: &str = "/api/v3";

const RELATIVE_PATH_VAR: &str = "FORUM_RELATIVE_PATH";
const CSRF_TOKEN_VAR: &str = "FORUM_CSRF_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Path the application is mounted under, e.g. `/forum`. Empty at root.
    #[serde(default, deserialize_with = "trimmed_path")]
    pub relative_path: String,
    pub csrf_token: String,
}

impl ClientConfig {
    pub fn new(relative_path: &str, csrf_token: &str) -> Self {
        Self {
            relative_path: relative_path.trim_end_matches('/').to_string(),
            csrf_token: csrf_token.to_string(),
        }
    }

    /// Read `FORUM_RELATIVE_PATH` (optional) and `FORUM_CSRF_TOKEN`.
    pub fn from_env() -> Result<Self, ApiError> {
        let relative_path = std::env::var(RELATIVE_PATH_VAR).unwrap_or_default();
        let csrf_token = std::env::var(CSRF_TOKEN_VAR)
            .map_err(|_| ApiError::Config(format!("{CSRF_TOKEN_VAR} is not set")))?;
        Ok(Self::new(&relative_path, &csrf_token))
    }

    pub fn api_base(&self) -> String {
        format!("{}{API_PREFIX}", self.relative_path)
    }

    /// Turn a route into an absolute path.
    ///
    /// Paths that already start with `/api` only get the base path; anything
    /// else is treated as relative to the versioned API root.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("/api") {
            format!("{}{url}", self.relative_path)
        } else {
            format!("{}{url}", self.api_base())
        }
    }
}

fn trimmed_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let path = String::deserialize(deserializer)?;
    Ok(path.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_routes_get_the_versioned_prefix() {
        let config = ClientConfig::new("/test-path", "tok");
        assert_eq!(config.resolve_url("/test-route"), "/test-path/api/v3/test-route");
    }

    #[test]
    fn api_routes_only_get_the_base_path() {
        let config = ClientConfig::new("/test-path", "tok");
        assert_eq!(config.resolve_url("/api/v3/users"), "/test-path/api/v3/users");
        assert_eq!(config.resolve_url("/api/config"), "/test-path/api/config");
    }

    #[test]
    fn root_mount_and_trailing_slash() {
        assert_eq!(ClientConfig::new("", "t").resolve_url("/ping"), "/api/v3/ping");
        assert_eq!(ClientConfig::new("/forum/", "t").api_base(), "/forum/api/v3");
    }

    #[test]
    fn deserializes_with_default_path() {
        let config: ClientConfig = serde_json::from_str(r#"{"csrf_token":"abc"}"#).unwrap();
        assert_eq!(config.relative_path, "");
        assert_eq!(config.csrf_token, "abc");

        let config: ClientConfig = serde_json::from_str(r#"{"relative_path":"/forum/","csrf_token":"t"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("/forum", "t"));
        assert_eq!(config.resolve_url("/ping"), "/forum/api/v3/ping");
    }

    // The only test touching these variables, so no other test races it.
    #[test]
    fn reads_from_env() {
        std::env::remove_var(RELATIVE_PATH_VAR);
        std::env::remove_var(CSRF_TOKEN_VAR);
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
        assert!(err.to_string().contains(CSRF_TOKEN_VAR));

        std::env::set_var(CSRF_TOKEN_VAR, "env-token");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config, ClientConfig::new("", "env-token"));

        std::env::set_var(RELATIVE_PATH_VAR, "/forum/");
        assert_eq!(ClientConfig::from_env().unwrap().api_base(), "/forum/api/v3");

        std::env::remove_var(RELATIVE_PATH_VAR);
        std::env::remove_var(CSRF_TOKEN_VAR);
    }
}
