//! Automation Session collaborator: one live browser-driven interaction with
//! an ATS page. The engine never touches pages directly; adapters drive this
//! interface and the production implementation relays each call to a
//! browser-automation sidecar over HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::models::Platform;

#[derive(Debug)]
pub enum SessionError {
    Timeout(String),
    Network(String),
    StaleElement(String),
    /// The posting no longer accepts applications.
    PostingClosed,
    /// The platform rejected the submission as a duplicate.
    DuplicateApplication,
    /// The platform demands an applicant account the user does not have.
    AccountRequired,
    Protocol(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Timeout(msg) => write!(f, "session timeout: {msg}"),
            SessionError::Network(msg) => write!(f, "session network error: {msg}"),
            SessionError::StaleElement(sel) => write!(f, "stale element: {sel}"),
            SessionError::PostingClosed => write!(f, "job posting is closed"),
            SessionError::DuplicateApplication => {
                write!(f, "platform rejected duplicate application")
            }
            SessionError::AccountRequired => write!(f, "platform requires an applicant account"),
            SessionError::Protocol(msg) => write!(f, "session protocol error: {msg}"),
        }
    }
}

#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;
    async fn fill_field(&self, selector: &str, value: &str) -> Result<(), SessionError>;
    async fn submit(&self) -> Result<(), SessionError>;
    /// Returns a blob reference to the captured screenshot.
    async fn screenshot(&self) -> Result<String, SessionError>;
    async fn detect_captcha(&self) -> Result<bool, SessionError>;
    /// Best-effort teardown; errors are ignored by callers.
    async fn close(&self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, platform: Platform) -> Result<Box<dyn AutomationSession>, SessionError>;
}

// ── HTTP sidecar implementation ─────────────────────────────────

pub struct HttpSessionFactory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSessionFactory {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build reqwest client"),
        }
    }
}

#[derive(Deserialize)]
struct OpenResponse {
    id: String,
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self, platform: Platform) -> Result<Box<dyn AutomationSession>, SessionError> {
        let resp = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&json!({ "platform": platform.as_str() }))
            .send()
            .await
            .map_err(net_err)?;

        if !resp.status().is_success() {
            return Err(SessionError::Protocol(format!(
                "sidecar refused session: {}",
                resp.status()
            )));
        }

        let open: OpenResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Protocol(format!("bad open response: {e}")))?;

        Ok(Box::new(HttpSession {
            url: format!("{}/sessions/{}", self.base_url, open.id),
            client: self.client.clone(),
        }))
    }
}

struct HttpSession {
    url: String,
    client: reqwest::Client,
}

impl HttpSession {
    async fn post(
        &self,
        op: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, SessionError> {
        let resp = self
            .client
            .post(format!("{}/{op}", self.url))
            .json(&body)
            .send()
            .await
            .map_err(net_err)?;
        match resp.status().as_u16() {
            200..=299 => Ok(resp),
            404 | 410 => Err(SessionError::PostingClosed),
            408 | 504 => Err(SessionError::Timeout(op.to_string())),
            422 => Err(SessionError::StaleElement(op.to_string())),
            status => Err(SessionError::Protocol(format!("{op} returned {status}"))),
        }
    }
}

#[async_trait]
impl AutomationSession for HttpSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.post("navigate", json!({ "url": url })).await?;
        Ok(())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<(), SessionError> {
        self.post("fill", json!({ "selector": selector, "value": value }))
            .await?;
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        #[derive(Deserialize)]
        struct SubmitResponse {
            result: String,
        }

        let resp = self.post("submit", json!({})).await?;
        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Protocol(format!("bad submit response: {e}")))?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "duplicate" => Err(SessionError::DuplicateApplication),
            "account_required" => Err(SessionError::AccountRequired),
            "closed" => Err(SessionError::PostingClosed),
            other => Err(SessionError::Protocol(format!("submit result '{other}'"))),
        }
    }

    async fn screenshot(&self) -> Result<String, SessionError> {
        #[derive(Deserialize)]
        struct ScreenshotResponse {
            blob_ref: String,
        }

        let resp = self.post("screenshot", json!({})).await?;
        let body: ScreenshotResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Protocol(format!("bad screenshot response: {e}")))?;
        Ok(body.blob_ref)
    }

    async fn detect_captcha(&self) -> Result<bool, SessionError> {
        #[derive(Deserialize)]
        struct CaptchaResponse {
            present: bool,
        }

        let resp = self.post("captcha", json!({})).await?;
        let body: CaptchaResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Protocol(format!("bad captcha response: {e}")))?;
        Ok(body.present)
    }

    async fn close(&self) {
        let _ = self.client.delete(&self.url).send().await;
    }
}

fn net_err(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Timeout(e.to_string())
    } else {
        SessionError::Network(e.to_string())
    }
}

/// Used when no sidecar is configured: every open fails as a transient
/// network error, so tasks back off instead of failing permanently.
pub struct DisconnectedSessionFactory;

#[async_trait]
impl SessionFactory for DisconnectedSessionFactory {
    async fn open(&self, _platform: Platform) -> Result<Box<dyn AutomationSession>, SessionError> {
        Err(SessionError::Network(
            "AUTOAPPLY_SESSION_URL is not configured".to_string(),
        ))
    }
}
