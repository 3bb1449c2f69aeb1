//! Async client for a forum's versioned JSON API.
//!
//! # Overview
//! Normalizes outgoing requests to `/api/v3`, attaches the CSRF token to
//! every state-mutating request, negotiates JSON vs. plain-text responses,
//! and recovers from an expired login session by asking the user to log in
//! again.
//!
//! # Design
//! - `ApiClient` takes its `ClientConfig` explicitly; nothing is read from
//!   global state.
//! - I/O sits behind the `Network` trait. `ReqwestNetwork` (feature `reqwest`) is
//!   the stock implementation; tests use recording doubles.
//! - Plugins hook in through an ordered `Interceptor` chain rather than named
//!   hooks.
//! - Session expiry is a structured `ApiError::Unauthenticated`, never a
//!   string comparison at the call site.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod network;
pub mod reauth;
pub mod types;

pub use client::{parse_response, ApiClient};
pub use config::ClientConfig;
pub use error::{ApiError, SESSION_EXPIRED_MESSAGE};
pub use http::{Body, FormPart, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
pub use interceptor::{HeaderInterceptor, Interceptor, LoggingInterceptor, RedirectInterceptor};
#[cfg(feature = "reqwest")]
pub use network::ReqwestNetwork;
pub use network::Network;
pub use reauth::{ReauthUi, DEFAULT_REAUTH_TARGET, REAUTH_MESSAGE_KEY};
pub use types::{ApiResponse, Headers, Payload, RequestOptions, CSRF_HEADER, JSON_CONTENT_TYPE};
