//! HTTP client for the backend API: login/logout, current-user sync, user
//! administration and sale records. All authenticated calls attach the bearer
//! header from the session store; any 401 clears the session immediately.

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::identity::{Principal, Role, SessionStore};

/// Display names arrive embedded in the dashboard greeting.
static WELCOME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Welcome, (.+)!$").unwrap());

const DEFAULT_DISPLAY_NAME: &str = "User";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid credentials or session rejected")]
    Unauthorized,
    #[error("{0}")]
    Api(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    role: String,
}

/// One sale record as the backend stores it; unknown columns ride along.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleRecord {
    pub date: String,
    pub customer: String,
    pub total: f64,
    pub pay_mode: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
pub struct AuthClient {
    base: String,
    client: reqwest::Client,
    store: SessionStore,
}

impl AuthClient {
    /// `base` is the API origin the client talks to, e.g. the bridge's
    /// `http://127.0.0.1:7878/api`.
    pub fn new(base: &str, store: SessionStore) -> Result<Self> {
        Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base: base.trim_end_matches('/').to_string(), client, store })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.store.auth_header() {
            Some(value) => rb.header(AUTHORIZATION, value),
            None => rb,
        }
    }

    /// Turn a non-success response into a `ClientError`. A 401 means the
    /// session was rejected: clear it here, whichever call got the response.
    async fn reject(&self, resp: Response) -> ClientError {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            self.store.clear();
            return ClientError::Unauthorized;
        }
        let text = resp.text().await.unwrap_or_default();
        ClientError::Api(extract_error_message(status, &text))
    }

    /// Form-encoded login. On success token and token type land in the
    /// session store together; on failure nothing is stored.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api(extract_error_message(status, &text)));
        }
        let body: LoginResponse = resp.json().await?;
        self.store.store_login(&body.access_token, &body.token_type);
        let now = Utc::now().to_rfc3339();
        self.store.set_profile(Some(username), None, Some(now.as_str()));
        Ok(())
    }

    /// Who-am-I against the dashboard endpoint. A 401 clears the session and
    /// yields `None`; any other failure yields `None` without clearing.
    pub async fn current_user(&self) -> Result<Option<Principal>, ClientError> {
        let resp = self.authed(self.client.get(self.url("/dashboard/"))).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.store.clear();
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: DashboardResponse = resp.json().await?;
        let display_name = extract_display_name(&body.message);
        self.store.cache_identity(Some(&body.role), Some(&display_name));
        Ok(Some(Principal { role: Role::parse(&body.role), display_name }))
    }

    /// Local logout: drop the session. Idempotent, no network call.
    pub fn logout(&self) {
        self.store.clear();
    }

    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        role: &str,
        is_active: bool,
    ) -> Result<(), ClientError> {
        let active = if is_active { "true" } else { "false" };
        let resp = self
            .authed(self.client.post(self.url("/auth/register")).form(&[
                ("username", username),
                ("password", password),
                ("role", role),
                ("is_active", active),
            ]))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.reject(resp).await);
        }
        Ok(())
    }

    /// Dedicated change-password endpoint. The legacy client re-used the
    /// registration endpoint with a sentinel role; that path is gone.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ClientError> {
        let resp = self
            .authed(self.client.post(self.url("/auth/change-password")).form(&[
                ("old_password", old_password),
                ("new_password", new_password),
            ]))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.reject(resp).await);
        }
        Ok(())
    }

    pub async fn list_sales(&self) -> Result<Vec<SaleRecord>, ClientError> {
        let resp = self.authed(self.client.get(self.url("/sales/"))).send().await?;
        if !resp.status().is_success() {
            return Err(self.reject(resp).await);
        }
        Ok(resp.json().await?)
    }

    pub async fn create_sale(&self, record: &SaleRecord) -> Result<(), ClientError> {
        let resp = self.authed(self.client.post(self.url("/sales/")).json(record)).send().await?;
        if !resp.status().is_success() {
            return Err(self.reject(resp).await);
        }
        Ok(())
    }
}

/// Pull a human name out of the dashboard greeting; fall back to the default
/// when the greeting does not match.
fn extract_display_name(message: &str) -> String {
    WELCOME_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
}

/// Best available message from an error response: JSON `detail` or `message`
/// first, else the raw text prefixed with the status code.
fn extract_error_message(status: StatusCode, text: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(msg) = v.get("detail").and_then(|d| d.as_str()) {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }
    format!("HTTP {}: {}", status.as_u16(), text)
}
