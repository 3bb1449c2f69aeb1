//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, mounted under a relative path,
//! then drives `ApiClient` over real HTTP through `ReqwestNetwork`. Validates URL
//! resolution, CSRF injection, body encoding and error mapping against an
//! actual server rather than a recording double.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forum_api::{
    ApiClient, ApiError, ApiResponse, ClientConfig, HeaderInterceptor, MultipartForm, Payload, ReauthUi,
    ReqwestNetwork, REAUTH_MESSAGE_KEY, SESSION_EXPIRED_MESSAGE,
};
use mock_server::Settings;
use serde_json::json;

const RELATIVE_PATH: &str = "/forum";
const CSRF: &str = "integration-token";

/// Start the mock server on its own runtime and return its origin.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            let settings = Settings {
                relative_path: RELATIVE_PATH.to_string(),
                csrf_token: CSRF.to_string(),
            };
            mock_server::run(listener, settings).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(origin: &str, csrf_token: &str) -> ApiClient {
    ApiClient::new(
        ClientConfig::new(RELATIVE_PATH, csrf_token),
        Arc::new(ReqwestNetwork::new(origin)),
    )
}

#[derive(Default)]
struct AlwaysConfirm {
    prompts: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
}

#[async_trait]
impl ReauthUi for AlwaysConfirm {
    async fn confirm(&self, message_key: &str) -> bool {
        self.prompts.lock().unwrap().push(message_key.to_string());
        true
    }

    async fn navigate(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn verbs_against_live_server() {
    let origin = start_server();
    let api = client(&origin, CSRF);

    // Step 1: envelope is unwrapped.
    let pong = api.get("/ping", &[]).await.unwrap();
    assert_eq!(pong, ApiResponse::Json(json!({"pong": true})));

    // Step 2: query string arrives in order.
    let echo = api.get("/echo", &[("key", "value"), ("page", "2")]).await.unwrap();
    let echo = echo.json().unwrap();
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["query"], "key=value&page=2");
    assert_eq!(echo["csrf"], serde_json::Value::Null);

    // Step 3: mutating echo carries JSON body and CSRF.
    let echo = api.patch("/echo", Some(json!({"key": "value"}).into())).await.unwrap();
    let echo = echo.json().unwrap();
    assert_eq!(echo["method"], "PATCH");
    assert_eq!(echo["csrf"], CSRF);
    assert_eq!(echo["content_type"], "application/json; charset=utf-8");
    assert_eq!(echo["body"], r#"{"key":"value"}"#);

    // Step 4: /api-prefixed route skips the version segment.
    let config = api.get("/api/config", &[]).await.unwrap();
    assert_eq!(config.json().unwrap()["relative_path"], RELATIVE_PATH);

    // Step 5: plain text success and failure.
    assert_eq!(api.get("/plain", &[]).await.unwrap().text(), Some("test-response"));
    let err = api.get("/plain-error", &[]).await.unwrap_err();
    assert_eq!(err, ApiError::Http { status: 500, message: "Something went wrong".to_string() });
}

#[tokio::test(flavor = "multi_thread")]
async fn post_lifecycle() {
    let origin = start_server();
    let api = client(&origin, CSRF);

    // create
    let created = api
        .post("/posts", Some(Payload::json(&json!({"title": "Hello", "content": "First"})).unwrap()))
        .await
        .unwrap();
    let pid = created.json().unwrap()["pid"].as_u64().unwrap();

    // head: resolves with no content
    let head = api.head(&format!("/posts/{pid}"), &[]).await.unwrap();
    assert!(head.is_empty());

    // update
    let updated = api
        .put(&format!("/posts/{pid}"), Some(json!({"content": "Edited"}).into()))
        .await
        .unwrap();
    assert_eq!(updated.json().unwrap()["content"], "Edited");
    assert_eq!(updated.json().unwrap()["title"], "Hello");

    // delete, without a payload
    api.del(&format!("/posts/{pid}"), None).await.unwrap();

    // get after delete: JSON error message surfaces
    let err = api.get(&format!("/posts/{pid}"), &[]).await.unwrap_err();
    assert_eq!(err.to_string(), mock_server::NO_POST);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_csrf_is_rejected() {
    let origin = start_server();
    let err = client(&origin, "stale").post("/posts", Some(json!({"content": "x"}).into())).await.unwrap_err();
    assert_eq!(err.to_string(), mock_server::INVALID_CSRF);
    assert_eq!(err.status(), Some(403));
}

#[tokio::test(flavor = "multi_thread")]
async fn multipart_upload() {
    let origin = start_server();
    let form = MultipartForm::new()
        .text("cid", "3")
        .file("files[]", "a.txt", "text/plain", b"hello".to_vec());
    let result = client(&origin, CSRF).post("/upload", Some(form.into())).await.unwrap();

    let fields = result.json().unwrap()["fields"].as_array().unwrap().clone();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1]["filename"], "a.txt");
    assert_eq!(fields[1]["size"], 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn hostile_filenames_cannot_forge_fields() {
    let origin = start_server();
    let form = MultipartForm::new()
        .text("cid", "3")
        .file("files[]", "evil\"; name=\"cid", "text/plain", b"hello".to_vec())
        .file("files[]", "a.txt\r\nContent-Type: text/html", "text/plain", b"hi".to_vec());
    let result = client(&origin, CSRF).post("/upload", Some(form.into())).await.unwrap();

    let fields = result.json().unwrap()["fields"].as_array().unwrap().clone();
    let names: Vec<&str> = fields.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["cid", "files[]", "files[]"]);
    assert_eq!(fields[1]["size"], 5);
    assert_eq!(fields[2]["size"], 2);
    assert_ne!(fields[1]["filename"], "evil");
}

#[tokio::test(flavor = "multi_thread")]
async fn interceptor_headers_reach_the_server() {
    let origin = start_server();
    let api = client(&origin, CSRF).with_interceptor(Arc::new(HeaderInterceptor::new().header("x-plugin", "on")));
    let echo = api.get("/echo", &[]).await.unwrap();
    assert_eq!(echo.json().unwrap()["plugin"], "on");
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_session_flow() {
    let origin = start_server();

    // headless: the tagged error comes back
    let err = client(&origin, CSRF).get("/expired", &[]).await.unwrap_err();
    assert!(err.is_unauthenticated());
    assert_eq!(err.message(), SESSION_EXPIRED_MESSAGE);

    // with a UI: prompt, then redirect
    let ui = Arc::new(AlwaysConfirm::default());
    let result = client(&origin, CSRF).with_reauth_ui(ui.clone()).get("/expired", &[]).await.unwrap();
    assert_eq!(result, ApiResponse::Redirected("login".to_string()));
    assert_eq!(*ui.prompts.lock().unwrap(), [REAUTH_MESSAGE_KEY]);
    assert_eq!(*ui.navigations.lock().unwrap(), ["login"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_is_a_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = client(&format!("http://127.0.0.1:{port}"), CSRF).get("/ping", &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
}
