//! The I/O seam between the client and the wire.
//!
//! # Design
//! The client only ever hands a finished `HttpRequest` to a `Network` and gets
//! an `HttpResponse` back, so tests can swap in a recording double and hosts
//! can bring their own HTTP stack. `ReqwestNetwork` is the stock implementation.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP exchange.
///
/// Non-2xx statuses are returned as responses, not errors; `Err` is reserved
/// for failures where no response exists.
#[async_trait]
pub trait Network: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_network::ReqwestNetwork;

#[cfg(feature = "reqwest")]
mod reqwest_network {
    use async_trait::async_trait;
    use reqwest::multipart::{Form, Part};
    use reqwest::Method;

    use crate::error::ApiError;
    use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse, MultipartForm};

    use super::Network;

    /// `reqwest` client bound to one origin.
    #[derive(Debug, Clone)]
    pub struct ReqwestNetwork {
        origin: String,
        client: reqwest::Client,
    }

    impl ReqwestNetwork {
        /// `origin` is scheme plus authority, e.g. `http://127.0.0.1:4567`.
        pub fn new(origin: &str) -> Self {
            Self::with_client(origin, reqwest::Client::new())
        }

        /// Reuse a client the host has already configured (proxies, TLS, timeouts).
        pub fn with_client(origin: &str, client: reqwest::Client) -> Self {
            Self {
                origin: origin.trim_end_matches('/').to_string(),
                client,
            }
        }
    }

    #[async_trait]
    impl Network for ReqwestNetwork {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            let url = format!("{}{}", self.origin, request.url);
            let mut builder = self.client.request(method(request.method), url);

            let multipart = matches!(request.body, Some(Body::Multipart(_)));
            for (name, value) in &request.headers {
                // The form sets its own content-type, boundary included.
                if multipart && name.eq_ignore_ascii_case("content-type") {
                    continue;
                }
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match request.body {
                Some(Body::Text(text)) => builder.body(text),
                Some(Body::Multipart(form)) => builder.multipart(to_form(form)?),
                None => builder,
            };

            let response = builder.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect();
            let body = if request.method == HttpMethod::Head {
                String::new()
            } else {
                response.text().await.map_err(|e| ApiError::Network(e.to_string()))?
            };

            Ok(HttpResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            })
        }
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Hand the parts to `reqwest`, which frames them and escapes names and
    /// filenames in the `Content-Disposition` header.
    fn to_form(form: MultipartForm) -> Result<Form, ApiError> {
        let mut out = Form::new();
        for part in form.into_parts() {
            let mut file = Part::bytes(part.data);
            if let Some(filename) = part.filename {
                file = file.file_name(filename);
            }
            if let Some(content_type) = part.content_type {
                file = file
                    .mime_str(&content_type)
                    .map_err(|e| ApiError::Serialization(format!("invalid part content-type: {e}")))?;
            }
            out = out.part(part.name, file);
        }
        Ok(out)
    }

}
