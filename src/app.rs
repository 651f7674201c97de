#![cfg(feature = "web")]
use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::api::{DiagnosticBackend, HttpBackend, normalize_email};
use crate::config::{Config, parse_cost_per_trade};
use crate::error::{AuthError, PortalError};
use crate::graph::{GraphOptions, render_trajectory};
use crate::loader::load_trajectory;
use crate::render::{LoginView, PortalView, ReportsView, Templates};
use crate::session::{FlashKind, SESSION_COOKIE, SessionStore};

/// Uploaded CSVs larger than this are refused by the router
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub backend: Arc<dyn DiagnosticBackend>,
    pub templates: Templates,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn DiagnosticBackend>) -> Result<Self, PortalError> {
        Ok(Self {
            sessions: SessionStore::new(config.default_cost_per_trade),
            templates: Templates::new()?,
            config,
            backend,
        })
    }
}

#[derive(Deserialize)]
struct DiagnoseForm {
    #[serde(default)]
    cost_per_trade: String,
}

#[derive(Deserialize)]
struct TermsForm {
    #[serde(default)]
    accept: Option<String>,
}

#[derive(Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Build the portal router around shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_portal))
        .route("/upload", post(upload_file))
        .route("/diagnose", post(run_diagnosis))
        .route("/terms", post(accept_terms))
        .route("/reset", post(reset_session))
        .route("/chart.png", get(serve_chart))
        .route("/report.pdf", get(download_report))
        .route("/login", get(serve_login).post(handle_login))
        .route("/register", post(handle_register))
        .route("/logout", post(handle_logout))
        .route("/reports", get(serve_reports))
        .route("/health", get(|| async { "ok" }))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), PortalError> {
    let backend = HttpBackend::new(&config)?;
    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(backend))?);

    let listener = TcpListener::bind(addr.as_str()).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Resolve the caller's session, issuing a cookie when there is none
fn session_id(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.contains(cookie.value()) {
            let id = cookie.value().to_string();
            return (jar, id);
        }
    }

    let id = state.sessions.create();
    let mut cookie = Cookie::new(SESSION_COOKIE, id.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

fn render_page(page: Result<String, PortalError>) -> Response {
    match page {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Rendering error").into_response()
        }
    }
}

async fn serve_portal(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    let view = state.sessions.with_session(&sid, |s| {
        let flash = s.take_flash();
        PortalView::from_session(s, flash, &state.config.payments_host)
    });

    (jar, render_page(state.templates.portal(&view)))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);

    let outcome = read_file_field(multipart).await.and_then(|bytes| {
        load_trajectory(&bytes)
            .map(|trajectory| (bytes, trajectory))
            .map_err(|e| e.to_string())
    });

    state.sessions.with_session(&sid, |s| match outcome {
        Ok((bytes, trajectory)) => {
            let (size, rows, column) = (bytes.len(), trajectory.len(), trajectory.column.clone());
            let upload_id = s.load_file(bytes, trajectory).to_string();
            info!(
                "upload {}: {} bytes, {} rows, column '{}'",
                upload_id, size, rows, column
            );
            s.set_flash(FlashKind::Success, format!("Archivo cargado ({} filas).", rows));
        }
        Err(message) => {
            warn!("upload rejected: {}", message);
            s.set_flash(FlashKind::Error, format!("Error al leer el archivo: {}", message));
        }
    });

    (jar, Redirect::to("/"))
}

/// Pull the `file` field out of a multipart body
async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|e| e.to_string())?;
            return Ok(bytes.to_vec());
        }
    }

    Err("no se recibió ningún archivo".to_string())
}

async fn run_diagnosis(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<DiagnoseForm>,
) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    let snapshot = state.sessions.snapshot(&sid);

    let cost = match parse_cost_per_trade(&form.cost_per_trade, snapshot.cost_per_trade) {
        Ok(cost) => cost,
        Err(e) => {
            state
                .sessions
                .with_session(&sid, |s| s.set_flash(FlashKind::Error, e.to_string()));
            return (jar, Redirect::to("/"));
        }
    };

    let (Some(bytes), Some(upload_id)) = (snapshot.file_bytes, snapshot.upload_id) else {
        state.sessions.with_session(&sid, |s| {
            s.set_flash(FlashKind::Error, "Suba un archivo CSV antes de ejecutar el diagnóstico.")
        });
        return (jar, Redirect::to("/"));
    };

    let outcome = state.backend.diagnose(bytes, cost, &upload_id).await;

    state.sessions.with_session(&sid, |s| {
        s.cost_per_trade = cost;

        // A new upload or a reset may have landed while the call was in flight
        if s.upload_id.as_deref() != Some(upload_id.as_str()) {
            return;
        }

        match outcome {
            Ok(result) => {
                s.record_diagnosis(result);
                info!("diagnosis {} ready, run {}", upload_id, s.run_count);
            }
            Err(e) => {
                warn!("diagnosis {} failed: {}", upload_id, e);
                s.set_flash(FlashKind::Error, format!("Error en API: {}", e));
            }
        }
    });

    (jar, Redirect::to("/"))
}

async fn accept_terms(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<TermsForm>,
) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    state
        .sessions
        .with_session(&sid, |s| s.accept_terms(form.accept.is_some()));

    (jar, Redirect::to("/"))
}

async fn reset_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    state.sessions.with_session(&sid, |s| s.reset());

    (jar, Redirect::to("/"))
}

async fn serve_chart(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(&state, jar);
    let snapshot = state.sessions.snapshot(&sid);

    let values = match (&snapshot.trajectory, snapshot.visible_result()) {
        (Some(t), Some(_)) if snapshot.exposure().shows_chart() => t.values.clone(),
        _ => return (jar, StatusCode::NOT_FOUND).into_response(),
    };

    let rendered =
        tokio::task::spawn_blocking(move || render_trajectory(&values, &GraphOptions::default()))
            .await;

    match rendered {
        Ok(Ok(png)) => (
            jar,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            png,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!("chart rendering failed: {}", e);
            (jar, StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
        Err(e) => {
            error!("chart task failed: {}", e);
            (jar, StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

async fn download_report(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(&state, jar);
    let snapshot = state.sessions.snapshot(&sid);

    if !snapshot.is_authenticated() {
        state.sessions.with_session(&sid, |s| {
            s.set_flash(FlashKind::Info, "Inicia sesión para descargar tu reporte.")
        });
        return (jar, Redirect::to("/login")).into_response();
    }

    let ready = snapshot.visible_result().is_some();
    let (Some(bytes), Some(upload_id), true) = (snapshot.file_bytes, snapshot.upload_id, ready)
    else {
        state.sessions.with_session(&sid, |s| {
            s.set_flash(FlashKind::Error, "No hay un diagnóstico listo para este reporte.")
        });
        return (jar, Redirect::to("/")).into_response();
    };

    match state
        .backend
        .fetch_pdf(bytes, snapshot.cost_per_trade, &upload_id)
        .await
    {
        Ok(pdf) => {
            let disposition = format!("attachment; filename=\"aoc_report_{}.pdf\"", upload_id);
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(header::CONTENT_DISPOSITION, disposition)
                .body(Body::from(pdf));

            match response {
                Ok(response) => (jar, response).into_response(),
                Err(e) => {
                    error!("pdf response failed: {}", e);
                    (jar, StatusCode::INTERNAL_SERVER_ERROR).into_response()
                }
            }
        }
        Err(e) => {
            warn!("pdf {} failed: {}", upload_id, e);
            state.sessions.with_session(&sid, |s| {
                s.set_flash(FlashKind::Error, format!("Error al generar el PDF: {}", e))
            });
            (jar, Redirect::to("/")).into_response()
        }
    }
}

async fn serve_login(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    let view = state.sessions.with_session(&sid, |s| {
        let flash = s.take_flash();
        LoginView::new(s, flash)
    });

    (jar, render_page(state.templates.login(&view)))
}

async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    let email = normalize_email(&form.email);

    let outcome = if email.is_empty() || form.password.is_empty() {
        Err(AuthError::MissingFields)
    } else {
        state.backend.login(&email, &form.password).await
    };

    let target = state.sessions.with_session(&sid, |s| match outcome {
        Ok(token) => {
            info!("login ok for session {}", sid);
            s.log_in(token, email);
            s.set_flash(FlashKind::Success, "¡Sesión iniciada!");
            "/"
        }
        Err(e) => {
            warn!("login failed: {}", e);
            s.set_flash(FlashKind::Error, e.to_string());
            "/login"
        }
    });

    (jar, Redirect::to(target))
}

async fn handle_register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    let email = normalize_email(&form.email);

    let outcome = if email.is_empty() || form.password.is_empty() {
        Err(AuthError::MissingFields)
    } else {
        state.backend.register(&email, &form.password).await
    };

    state.sessions.with_session(&sid, |s| match outcome {
        Ok(()) => s.set_flash(
            FlashKind::Success,
            "¡Cuenta creada! Por favor inicia sesión.",
        ),
        Err(e) => {
            warn!("registration failed: {}", e);
            s.set_flash(FlashKind::Error, e.to_string());
        }
    });

    (jar, Redirect::to("/login"))
}

async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, sid) = session_id(&state, jar);
    state.sessions.with_session(&sid, |s| s.log_out());

    (jar, Redirect::to("/"))
}

async fn serve_reports(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let (jar, sid) = session_id(&state, jar);
    let snapshot = state.sessions.snapshot(&sid);

    let Some(token) = snapshot.token.as_deref() else {
        state.sessions.with_session(&sid, |s| {
            s.set_flash(
                FlashKind::Info,
                "⚠️ Por favor, inicia sesión para ver tus reportes guardados.",
            )
        });
        return (jar, Redirect::to("/login")).into_response();
    };

    let (reports, failed) = match state.backend.my_reports(token).await {
        Ok(reports) => (reports, false),
        Err(e) => {
            warn!("my-reports failed: {}", e);
            state.sessions.with_session(&sid, |s| {
                s.set_flash(FlashKind::Error, format!("Error al obtener reportes: {}", e))
            });
            (Vec::new(), true)
        }
    };

    let view = state.sessions.with_session(&sid, |s| {
        let flash = s.take_flash();
        ReportsView::new(s, flash, reports, failed)
    });

    (jar, render_page(state.templates.reports(&view))).into_response()
}
