//! Request dispatcher, transport pipeline, and verb surface.
//!
//! # Design
//! `ApiClient` holds an injected `ClientConfig`, a `Network`, an ordered
//! interceptor chain, and optionally the host's `ReauthUi`. It carries no
//! mutable state between calls. A call goes through two layers:
//!
//! - `call` resolves the route against the configured base path, runs the
//!   transport, and turns an expired session into the reauth flow.
//! - `xhr` serializes the payload, runs the request interceptors, executes the
//!   request, and decodes the response.
//!
//! `build_request` and `parse_response` are the pure halves of `xhr`, so a
//! host that performs its own I/O can use them without a `Network`.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::interceptor::Interceptor;
use crate::network::Network;
use crate::reauth::{ReauthUi, DEFAULT_REAUTH_TARGET, REAUTH_MESSAGE_KEY};
use crate::types::{ApiResponse, Payload, RequestOptions};

const NO_CONTENT: u16 = 204;

/// Async client for the versioned forum API.
///
/// Cloning is cheap; clones share the network, interceptors and UI.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    network: Arc<dyn Network>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    reauth_ui: Option<Arc<dyn ReauthUi>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, network: Arc<dyn Network>) -> Self {
        Self {
            config: Arc::new(config),
            network,
            interceptors: Vec::new(),
            reauth_ui: None,
        }
    }

    /// Append an interceptor; it runs after every interceptor added before it.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Attach the prompt used to recover from an expired session. Without
    /// one, `ApiError::Unauthenticated` is returned to the caller.
    pub fn with_reauth_ui(mut self, ui: Arc<dyn ReauthUi>) -> Self {
        self.reauth_ui = Some(ui);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn get(&self, route: &str, query: &[(&str, &str)]) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::get(route, query)).await
    }

    pub async fn head(&self, route: &str, query: &[(&str, &str)]) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::head(route, query)).await
    }

    pub async fn post(&self, route: &str, data: Option<Payload>) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::post(route, data, &self.config.csrf_token)).await
    }

    pub async fn put(&self, route: &str, data: Option<Payload>) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::put(route, data, &self.config.csrf_token)).await
    }

    pub async fn patch(&self, route: &str, data: Option<Payload>) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::patch(route, data, &self.config.csrf_token)).await
    }

    pub async fn del(&self, route: &str, data: Option<Payload>) -> Result<ApiResponse, ApiError> {
        self.call(RequestOptions::delete(route, data, &self.config.csrf_token)).await
    }

    pub fn get_with<F>(&self, route: &str, query: &[(&str, &str)], callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::get(route, query), callback)
    }

    pub fn head_with<F>(&self, route: &str, query: &[(&str, &str)], callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::head(route, query), callback)
    }

    pub fn post_with<F>(&self, route: &str, data: Option<Payload>, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::post(route, data, &self.config.csrf_token), callback)
    }

    pub fn put_with<F>(&self, route: &str, data: Option<Payload>, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::put(route, data, &self.config.csrf_token), callback)
    }

    pub fn patch_with<F>(&self, route: &str, data: Option<Payload>, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::patch(route, data, &self.config.csrf_token), callback)
    }

    pub fn del_with<F>(&self, route: &str, data: Option<Payload>, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        self.call_with(RequestOptions::delete(route, data, &self.config.csrf_token), callback)
    }

    /// Resolve the route and send the request.
    ///
    /// An expired session does not surface as an error when a `ReauthUi` is
    /// attached: the user is asked to log in again and the call resolves to
    /// `Redirected` or `Cancelled` depending on the answer.
    pub async fn call(&self, mut options: RequestOptions) -> Result<ApiResponse, ApiError> {
        options.url = self.config.resolve_url(&options.url);
        match self.xhr(options).await {
            Err(err) if err.is_unauthenticated() => match &self.reauth_ui {
                Some(ui) => Ok(self.reauthenticate(ui.as_ref()).await),
                None => Err(err),
            },
            other => other,
        }
    }

    /// Run `call` on the current Tokio runtime and hand its result to
    /// `callback`.
    ///
    /// The callback runs exactly once. Outside a runtime it is called
    /// immediately with `ApiError::Config` and no task is returned.
    pub fn call_with<F>(&self, options: RequestOptions, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ApiResponse, ApiError>) + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error=%e, "no async runtime for callback-style call");
                callback(Err(ApiError::Config(format!("no Tokio runtime: {e}"))));
                return None;
            }
        };
        let client = self.clone();
        Some(handle.spawn(async move { callback(client.call(options).await) }))
    }

    async fn reauthenticate(&self, ui: &dyn ReauthUi) -> ApiResponse {
        let mut target = DEFAULT_REAUTH_TARGET.to_string();
        for interceptor in &self.interceptors {
            target = interceptor.on_reauth(target).await;
        }
        tracing::info!(%target, "login session expired, asking user to log in again");

        if ui.confirm(REAUTH_MESSAGE_KEY).await {
            ui.navigate(&target).await;
            ApiResponse::Redirected(target)
        } else {
            tracing::info!("reauthentication declined");
            ApiResponse::Cancelled
        }
    }

    async fn xhr(&self, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(options).await?;
        let method = request.method;
        tracing::debug!(%method, url=%request.url, "dispatching request");

        let response = self.network.execute(request).await.inspect_err(|e| {
            tracing::warn!(%method, error=%e, "network failure");
        })?;
        tracing::debug!(%method, status=response.status, "response received");

        parse_response(method, response).inspect_err(|e| {
            tracing::warn!(%method, status=?e.status(), error=%e, "request failed");
        })
    }

    /// Serialize the payload, run the request interceptors, and produce the
    /// outgoing request. `options.url` must already be resolved.
    pub async fn build_request(&self, options: RequestOptions) -> Result<HttpRequest, ApiError> {
        let mut options = options.normalize_body()?;
        for interceptor in &self.interceptors {
            options = interceptor.on_request(options).await?;
        }
        options.into_request()
    }
}

/// Decode a response for a request made with `method`.
///
/// Success is decided by the 2xx flag alone. The body is JSON when the
/// `content-type` starts with `application/json`, text otherwise. Text is
/// returned verbatim, whitespace included.
pub fn parse_response(method: HttpMethod, response: HttpResponse) -> Result<ApiResponse, ApiError> {
    let is_json = response
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !response.is_success() {
        return Err(failure(response, is_json));
    }
    if method == HttpMethod::Head || response.status == NO_CONTENT {
        return Ok(ApiResponse::Empty);
    }
    if !is_json {
        return Ok(ApiResponse::Text(response.body));
    }
    if response.body.is_empty() {
        return Ok(ApiResponse::Empty);
    }

    let value: Value =
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    Ok(ApiResponse::Json(unwrap_envelope(value)))
}

/// Pick the error message for a non-2xx response.
fn failure(response: HttpResponse, is_json: bool) -> ApiError {
    let message = if is_json {
        serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|v| v.pointer("/status/message").and_then(Value::as_str).map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or(response.status_text)
    } else if response.body.is_empty() {
        response.status_text
    } else {
        response.body
    };
    ApiError::from_status(response.status, message)
}

/// `{ "status": …, "response": … }` resolves to its `response` member.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("status") => match map.remove("response") {
            Some(response) => response,
            None => Value::Object(map),
        },
        other => other,
    }
}
