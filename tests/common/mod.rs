//! Shared fixtures: a local stand-in for the diagnostic service and a
//! cookie-carrying driver for the portal router.

#![allow(dead_code)]

use aoc_portal::app::{AppState, router};
use aoc_portal::api::HttpBackend;
use aoc_portal::{Config, SessionState};
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Multipart, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const API_KEY: &str = "test-key";
pub const TOKEN: &str = "tok-123";
pub const PDF_BYTES: &[u8] = b"%PDF-1.4 mock report";

/// Cost value that makes the mock diagnostic endpoint fail
pub const FAILING_COST: &str = "999";

#[derive(Default)]
pub struct MockCounters {
    pub diagnose_calls: AtomicUsize,
    pub pdf_calls: AtomicUsize,
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub counters: Arc<MockCounters>,
}

impl MockApi {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    pub fn config_with(&self, extra: &[(&str, &str)]) -> Config {
        let api_url = self.url("/upload");
        let api_url_pdf = self.url("/pdf");
        let extra: Vec<(String, String)> = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(move |name: &str| {
            if let Some((_, v)) = extra.iter().find(|(k, _)| k == name) {
                return Some(v.clone());
            }
            match name {
                "API_URL" => Some(api_url.clone()),
                "API_KEY" => Some(API_KEY.to_string()),
                "API_URL_PDF" => Some(api_url_pdf.clone()),
                "PAYMENTS_HOST" => Some("https://pay.test".to_string()),
                _ => None,
            }
        })
        .expect("mock config")
    }
}

/// Start the mock service on an ephemeral port
pub async fn spawn_mock_api() -> MockApi {
    let counters = Arc::new(MockCounters::default());

    let app = Router::new()
        .route("/upload", post(mock_diagnose))
        .route("/slow", post(mock_slow))
        .route("/upload-delayed", post(mock_delayed_diagnose))
        .route("/garbled", post(|| async { "not json" }))
        .route("/pdf", post(mock_pdf))
        .route("/auth/login", post(mock_login))
        .route("/auth/register", post(mock_register))
        .route("/api/my-reports", get(mock_reports))
        .with_state(counters.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });

    MockApi { addr, counters }
}

async fn upload_fields(mut multipart: Multipart) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let text = field.text().await.unwrap_or_default();
        if let Some(file_name) = file_name {
            fields.push((format!("{}:filename", name), file_name));
        }
        fields.push((name, text));
    }
    fields
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

async fn mock_diagnose(
    State(counters): State<Arc<MockCounters>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    counters.diagnose_calls.fetch_add(1, Ordering::SeqCst);

    let fields = upload_fields(multipart).await;
    if field(&fields, "file:filename") != Some("data.csv") || field(&fields, "upload_id").is_none()
    {
        return (StatusCode::BAD_REQUEST, "malformed upload").into_response();
    }
    if field(&fields, "cost_per_trade") == Some(FAILING_COST) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "engine exploded").into_response();
    }

    Json(json!({
        "structural_activity": "Moderate",
        "system_status": "Stable",
        "efficiency_band": 82,
        "diagnostic_scope": "test"
    }))
    .into_response()
}

/// Answers like `/upload`, but only after the portal could act in between
async fn mock_delayed_diagnose(State(counters): State<Arc<MockCounters>>) -> Response {
    counters.diagnose_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;

    Json(json!({
        "structural_activity": "Moderate",
        "system_status": "Stable",
        "efficiency_band": 82,
        "diagnostic_scope": "test"
    }))
    .into_response()
}

async fn mock_slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn mock_pdf(State(counters): State<Arc<MockCounters>>, headers: HeaderMap) -> Response {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    counters.pdf_calls.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/pdf")], PDF_BYTES).into_response()
}

async fn mock_login(Json(body): Json<serde_json::Value>) -> Response {
    if body["password"] == "secret" && body["email"] == "ana@example.com" {
        Json(json!({ "token": TOKEN })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "nope").into_response()
    }
}

async fn mock_register(Json(body): Json<serde_json::Value>) -> StatusCode {
    if body["email"] == "taken@example.com" {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

async fn mock_reports(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {}", TOKEN);
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        { "created_at": "2024-05-01 10:00", "amount": 49, "url": "https://files.test/r1.pdf" },
        { "created_at": "2024-06-12 18:30", "amount": 19.5, "url": null }
    ]))
    .into_response()
}

/// Drives the portal router like a browser tab: one cookie, sequential requests
///
/// Cloning gives a second tab on the same session.
#[derive(Clone)]
pub struct Browser {
    pub state: Arc<AppState>,
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    pub fn new(config: Config) -> Self {
        let backend = HttpBackend::new(&config).expect("backend");
        let state = Arc::new(AppState::new(config, Arc::new(backend)).expect("state"));
        Self {
            app: router(state.clone()),
            state,
            cookie: None,
        }
    }

    pub async fn send(&mut self, mut req: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().expect("cookie header"));
        }

        let resp = self.app.clone().oneshot(req).await.expect("router");

        if let Some(set) = resp.headers().get(header::SET_COOKIE) {
            let pair = set
                .to_str()
                .expect("set-cookie")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            self.cookie = Some(pair);
        }
        resp
    }

    pub async fn get(&mut self, path: &str) -> Response {
        let req = Request::get(path).body(Body::empty()).expect("request");
        self.send(req).await
    }

    pub async fn page(&mut self, path: &str) -> String {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), StatusCode::OK, "GET {}", path);
        body_text(resp).await
    }

    pub async fn post_form(&mut self, path: &str, form: &str) -> Response {
        let req = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request");
        self.send(req).await
    }

    pub async fn upload(&mut self, csv: &str) -> Response {
        let boundary = "portal-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"trades.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = boundary,
            csv = csv
        );
        let req = Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(req).await
    }

    pub fn session_id(&self) -> String {
        self.cookie
            .as_deref()
            .and_then(|c| c.strip_prefix("session="))
            .expect("session cookie")
            .to_string()
    }

    pub fn session(&self) -> SessionState {
        self.state.sessions.snapshot(&self.session_id())
    }
}

/// Wait until the mock has received `count` diagnose calls
pub async fn wait_for_diagnose_calls(counters: &MockCounters, count: usize) {
    for _ in 0..500 {
        if counters.diagnose_calls.load(Ordering::SeqCst) >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("diagnose call never reached the mock");
}

pub async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    String::from_utf8_lossy(&bytes).to_string()
}

pub fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
