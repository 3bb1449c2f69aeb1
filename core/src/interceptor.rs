//! Request and reauth interceptors.
//!
//! Interceptors run in the order they were added to the client. Each one sees
//! the output of the previous one, so later interceptors win when two touch
//! the same field.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::RequestOptions;

/// Middleware hook around every request.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called once per request, after the payload has been serialized and
    /// before anything goes out. Returning an error aborts the request.
    async fn on_request(&self, options: RequestOptions) -> Result<RequestOptions, ApiError> {
        Ok(options)
    }

    /// Called when the session has expired, with the redirect target chosen
    /// so far. Return the target to use instead.
    async fn on_reauth(&self, target: String) -> String {
        target
    }
}

/// Traces each outgoing request at debug level.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn on_request(&self, options: RequestOptions) -> Result<RequestOptions, ApiError> {
        tracing::debug!(target: "forum_api::http", method=%options.method, url=%options.url, has_body=options.data.is_some(), "sending request");
        Ok(options)
    }

    async fn on_reauth(&self, target: String) -> String {
        tracing::debug!(target: "forum_api::http", %target, "reauth requested");
        target
    }
}

/// Adds a fixed set of headers to every request.
#[derive(Debug, Clone, Default)]
pub struct HeaderInterceptor {
    headers: Vec<(String, String)>,
}

impl HeaderInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn on_request(&self, mut options: RequestOptions) -> Result<RequestOptions, ApiError> {
        for (name, value) in &self.headers {
            options.set_header(name, value);
        }
        Ok(options)
    }
}

/// Sends the user somewhere other than the default login page.
#[derive(Debug, Clone)]
pub struct RedirectInterceptor {
    target: String,
}

impl RedirectInterceptor {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl Interceptor for RedirectInterceptor {
    async fn on_reauth(&self, _target: String) -> String {
        self.target.clone()
    }
}
