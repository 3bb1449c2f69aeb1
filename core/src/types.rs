//! Caller-facing request and response records.
//!
//! # Design
//! `RequestOptions` is what callers and interceptors see. It keeps the
//! payload in `data` until the very last moment; `into_request` moves it
//! into the outgoing `HttpRequest` body so a request never carries both.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{Body, HttpMethod, HttpRequest, MultipartForm};

/// Header name used for cross-site request forgery protection.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Content type set on every JSON-serialized payload.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Request headers keyed by lower-case name.
pub type Headers = BTreeMap<String, String>;

/// Request payload as handed to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Free-form mapping, serialized to JSON text before sending.
    Json(Value),
    /// Already serialized text, sent as-is.
    Raw(String),
    /// Multipart form, passed through to the network layer untouched.
    Multipart(MultipartForm),
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    fn into_body(self) -> Result<Body, ApiError> {
        match self {
            Payload::Json(value) => serde_json::to_string(&value)
                .map(Body::Text)
                .map_err(|e| ApiError::Serialization(e.to_string())),
            Payload::Raw(text) => Ok(Body::Text(text)),
            Payload::Multipart(form) => Ok(Body::Multipart(form)),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<MultipartForm> for Payload {
    fn from(form: MultipartForm) -> Self {
        Payload::Multipart(form)
    }
}

/// Everything needed to issue one API request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub url: String,
    pub method: HttpMethod,
    pub data: Option<Payload>,
    pub headers: Headers,
}

impl RequestOptions {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method,
            ..Self::default()
        }
    }

    pub fn get(route: &str, query: &[(&str, &str)]) -> Self {
        Self::new(HttpMethod::Get, &with_query(route, query))
    }

    pub fn head(route: &str, query: &[(&str, &str)]) -> Self {
        Self::new(HttpMethod::Head, &with_query(route, query))
    }

    pub fn post(route: &str, data: Option<Payload>, csrf_token: &str) -> Self {
        Self::mutation(HttpMethod::Post, route, data, csrf_token)
    }

    pub fn put(route: &str, data: Option<Payload>, csrf_token: &str) -> Self {
        Self::mutation(HttpMethod::Put, route, data, csrf_token)
    }

    pub fn patch(route: &str, data: Option<Payload>, csrf_token: &str) -> Self {
        Self::mutation(HttpMethod::Patch, route, data, csrf_token)
    }

    pub fn delete(route: &str, data: Option<Payload>, csrf_token: &str) -> Self {
        Self::mutation(HttpMethod::Delete, route, data, csrf_token)
    }

    // The CSRF header goes out even when there is no payload.
    fn mutation(method: HttpMethod, route: &str, data: Option<Payload>, csrf_token: &str) -> Self {
        let mut options = Self::new(method, route);
        options.data = data;
        options.set_header(CSRF_HEADER, csrf_token);
        options
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Serialize a JSON payload to text and mark it as JSON.
    ///
    /// Multipart forms and raw text are left alone and get no content type.
    pub fn normalize_body(mut self) -> Result<Self, ApiError> {
        if let Some(Payload::Json(value)) = &self.data {
            let text = serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))?;
            self.data = Some(Payload::Raw(text));
            self.set_header("content-type", JSON_CONTENT_TYPE);
        }
        Ok(self)
    }

    /// Move `data` into the body slot of an outgoing request.
    ///
    /// GET and HEAD cannot carry a body; a payload attached to one (usually by
    /// an interceptor) aborts the request instead of being dropped.
    pub fn into_request(self) -> Result<HttpRequest, ApiError> {
        if self.data.is_some() && matches!(self.method, HttpMethod::Get | HttpMethod::Head) {
            return Err(ApiError::Aborted(format!("{} request cannot have a body", self.method)));
        }
        let body = self.data.map(Payload::into_body).transpose()?;
        Ok(HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers.into_iter().collect(),
            body,
        })
    }
}

/// Append `query` to `route` as a URL-encoded query string, in slice order.
pub fn with_query(route: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return route.to_string();
    }
    let params: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("{route}?{}", params.join("&"))
}

/// Decoded result of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON body; the `response` member when the API envelope was present.
    Json(Value),
    /// Non-JSON body, verbatim.
    Text(String),
    /// HEAD request, or a success with nothing in the body.
    Empty,
    /// Session expired, the user confirmed, and navigation to this target
    /// was issued.
    Redirected(String),
    /// Session expired and the user declined to log in again.
    Cancelled,
}

impl ApiResponse {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ApiResponse::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ApiResponse::Empty)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Json(value) => serde_json::from_value(value.clone())
                .map_err(|e| ApiError::Deserialization(e.to_string())),
            other => Err(ApiError::Deserialization(format!("expected a JSON response, got {other:?}"))),
        }
    }
}
