//! HTTP transport shared by every adapter
//!
//! Thin wrapper over `reqwest` that applies a per-request timeout and
//! authentication, and turns non-2xx responses into
//! [`SyncError::Transport`]. No retries: a failed call fails the caller.

use crate::{Result, SyncError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// OAuth scope covering Cloud Support and Cloud Storage
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// How requests authenticate
#[derive(Clone, Default)]
pub enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
    /// Short-lived OAuth tokens minted per request (cached by the provider)
    Google(Arc<dyn gcp_auth::TokenProvider>),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print credentials
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { username, .. } => write!(f, "Basic({})", username),
            Auth::Bearer(_) => f.write_str("Bearer(..)"),
            Auth::Google(_) => f.write_str("Google(..)"),
        }
    }
}

/// JSON-over-HTTP client with timeout and error translation
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    auth: Auth,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            timeout,
            auth: Auth::None,
        })
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a request with the timeout applied; auth is added on send
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json")
    }

    /// Attach credentials to a request
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.auth {
            Auth::None => request,
            Auth::Basic {
                ref username,
                ref password,
            } => request.basic_auth(username, Some(password)),
            Auth::Bearer(ref token) => request.bearer_auth(token),
            Auth::Google(ref provider) => {
                let token = provider.token(&[CLOUD_PLATFORM_SCOPE]).await?;
                request.bearer_auth(token.as_str())
            }
        })
    }

    /// Send a request, mapping timeouts and non-2xx statuses to errors
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = self.authorize(request).await?;
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Error response");
        Err(parse_error(status.as_u16(), content_type.as_deref(), &body))
    }

    /// Send a request and decode a JSON body; 204 and empty bodies yield `None`
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = self.execute(request).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await.map_err(map_send_error)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<Option<T>> {
        self.send_json(self.request(Method::GET, url).query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Option<T>> {
        self.send_json(self.request(Method::POST, url).json(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<Option<T>> {
        self.send_json(self.request(Method::PUT, url).query(query).json(body))
            .await
    }
}

fn map_send_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::timeout()
    } else {
        SyncError::Http(err)
    }
}

/// Static message for a status when the body says nothing useful
pub fn status_message(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        408 => "Request timed out",
        500 => "Internal server error",
        502 => "Bad gateway",
        _ => "Unknown error",
    }
}

/// Build a transport error from a failed response
///
/// JSON bodies are searched for `errorMessages[0]`, then `message`, then
/// `error.message`; anything else falls back to [`status_message`].
pub fn parse_error(status: u16, content_type: Option<&str>, body: &str) -> SyncError {
    let fallback = status_message(status);
    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));

    let message = if is_json {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| extract_message(&json))
            .unwrap_or_else(|| fallback.to_string())
    } else {
        fallback.to_string()
    };

    SyncError::Transport { status, message }
}

fn extract_message(json: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    json.get("errorMessages")
        .and_then(|m| m.get(0))
        .and_then(non_empty)
        .or_else(|| json.get("message").and_then(non_empty))
        .or_else(|| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(non_empty)
        })
}
