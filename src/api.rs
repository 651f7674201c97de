#![cfg(feature = "web")]
//! Clients for the remote diagnostic service
//!
//! Every call is a single request bounded by the configured timeout. There
//! is no retry: a failure is reported to the user, who re-triggers the
//! action by hand.

use crate::config::Config;
use crate::diagnosis::{DiagnosticResult, PurchasedReport};
use crate::error::{ApiError, AuthError};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Name the uploaded CSV is sent under
const UPLOAD_FILE_NAME: &str = "data.csv";

/// Operations the portal needs from the remote service
#[async_trait]
pub trait DiagnosticBackend: Send + Sync {
    async fn diagnose(
        &self,
        file: Vec<u8>,
        cost_per_trade: f64,
        upload_id: &str,
    ) -> Result<DiagnosticResult, ApiError>;

    async fn fetch_pdf(
        &self,
        file: Vec<u8>,
        cost_per_trade: f64,
        upload_id: &str,
    ) -> Result<Vec<u8>, ApiError>;

    /// Returns the bearer token on success
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError>;

    async fn register(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn my_reports(&self, token: &str) -> Result<Vec<PurchasedReport>, ApiError>;
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// `reqwest` implementation of [`DiagnosticBackend`]
pub struct HttpBackend {
    client: Client,
    api_url: String,
    api_url_pdf: String,
    api_base: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_url_pdf: cfg.api_url_pdf.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn upload_form(file: Vec<u8>, cost_per_trade: f64, upload_id: &str) -> Result<Form, ApiError> {
        let part = Part::bytes(file)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("text/csv")
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Form::new()
            .part("file", part)
            .text("cost_per_trade", cost_per_trade.to_string())
            .text("upload_id", upload_id.to_string()))
    }

    async fn post_upload(&self, url: &str, form: Form, what: &str) -> Result<Response, ApiError> {
        let started = Instant::now();
        let resp = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        log_call(what, resp.status(), started.elapsed());
        expect_status(resp, StatusCode::OK).await
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/{}", self.api_base, path)
    }
}

#[async_trait]
impl DiagnosticBackend for HttpBackend {
    async fn diagnose(
        &self,
        file: Vec<u8>,
        cost_per_trade: f64,
        upload_id: &str,
    ) -> Result<DiagnosticResult, ApiError> {
        let form = Self::upload_form(file, cost_per_trade, upload_id)?;
        let resp = self.post_upload(&self.api_url, form, "diagnose").await?;

        resp.json::<DiagnosticResult>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn fetch_pdf(
        &self,
        file: Vec<u8>,
        cost_per_trade: f64,
        upload_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let form = Self::upload_form(file, cost_per_trade, upload_id)?;
        let resp = self.post_upload(&self.api_url_pdf, form, "pdf").await?;

        let bytes = resp.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let started = Instant::now();
        let resp = self
            .client
            .post(self.auth_url("login"))
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(transport_error)?;
        log_call("login", resp.status(), started.elapsed());

        if resp.status() != StatusCode::OK {
            return Err(AuthError::InvalidCredentials);
        }

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(body.token)
    }

    async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let started = Instant::now();
        let resp = self
            .client
            .post(self.auth_url("register"))
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(transport_error)?;
        log_call("register", resp.status(), started.elapsed());

        if resp.status() == StatusCode::CREATED {
            Ok(())
        } else {
            Err(AuthError::RegistrationRejected)
        }
    }

    async fn my_reports(&self, token: &str) -> Result<Vec<PurchasedReport>, ApiError> {
        let started = Instant::now();
        let resp = self
            .client
            .get(format!("{}/api/my-reports", self.api_base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        log_call("my-reports", resp.status(), started.elapsed());

        expect_status(resp, StatusCode::OK)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Trim and lowercase an email before it leaves the portal
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e.to_string())
    }
}

async fn expect_status(resp: Response, expected: StatusCode) -> Result<Response, ApiError> {
    let status = resp.status();
    if status == expected {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

fn log_call(what: &str, status: StatusCode, elapsed: Duration) {
    if status.is_success() {
        info!("{} -> {} in {} ms", what, status.as_u16(), elapsed.as_millis());
    } else {
        warn!("{} -> {} in {} ms", what, status.as_u16(), elapsed.as_millis());
    }
}
