//! HTTP transport for Redmine REST API calls

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Render a JSON value as a query/path parameter
pub(crate) fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(param_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Flatten a parameter map into query pairs
pub(crate) fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), param_string(v)))
        .collect()
}

/// Raw response handed back by a [`Transport`]
///
/// Non-2xx statuses are data here, not errors; the resource layer decides what
/// a status means for the operation it issued.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, `None` for empty or non-JSON bodies
    pub body: Option<Value>,
    pub text: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        let text = body.as_ref().map(Value::to_string).unwrap_or_default();
        Self { status, body, text }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn from_text(status: u16, text: String) -> Self {
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };
        Self { status, body, text }
    }
}

/// The collaborator that performs HTTP calls for the resource engine
///
/// Paths are relative to the Redmine base URL, e.g. `/projects.json`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse>;
    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse>;
    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse>;
    async fn delete(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse>;
    /// POST raw file content (used for `/uploads.json`)
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<ApiResponse>;
}

/// Credentials sent with every request
#[derive(Debug, Clone, Default)]
pub enum Auth {
    #[default]
    Anonymous,
    ApiKey(String),
    Basic { username: String, password: String },
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    auth: Auth,
}

impl HttpTransport {
    /// Create a new HTTP transport for the Redmine instance at `base_url`
    pub fn new(base_url: &str, auth: Auth, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        let mut builder = Client::builder().user_agent(concat!("rmine/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        match &self.auth {
            Auth::Anonymous => request,
            Auth::ApiKey(key) => request.header("X-Redmine-API-Key", key),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error bodies
            tracing::warn!("API error: {} - {}", status, sanitize_for_log(&text));
        }

        Ok(ApiResponse::from_text(status.as_u16(), text))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    async fn delete(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        self.send(self.request(Method::DELETE, path).query(query)).await
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<ApiResponse> {
        let request = self
            .request(Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content);
        self.send(request).await
    }
}

/// Map an invalid base URL into the crate error (kept separate for the CLI)
pub fn validate_base_url(url: &str) -> Result<()> {
    Url::parse(url).map(|_| ()).map_err(Error::from)
}
