//! Redmine Client
//!
//! Main entry point: owns the session (transport + connected server version)
//! and hands out resource managers by resource-type name.

use super::http::{Auth, HttpTransport, Transport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resource::{ApiVersion, ResourceManager};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Shared state behind a client; resources hold it weakly
pub(crate) struct Session {
    pub transport: Arc<dyn Transport>,
    pub version: Option<ApiVersion>,
}

impl Session {
    /// Read a file and POST it to `/uploads.json`, returning the upload token
    pub async fn upload(&self, path: &Path) -> Result<String> {
        let shown = path.display().to_string();
        let content = tokio::fs::read(path).await.map_err(|source| Error::Upload {
            path: shown.clone(),
            source,
        })?;

        tracing::info!("Uploading {} ({} bytes)", shown, content.len());
        let response = self.transport.upload("/uploads.json", content).await?;

        if !response.is_success() {
            return Err(Error::Http {
                resource: "upload".to_string(),
                status: response.status,
            });
        }

        response
            .body
            .as_ref()
            .and_then(|b| b.get("upload"))
            .and_then(|u| u.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse {
                resource: "upload".to_string(),
                reason: "upload response has no token".to_string(),
            })
    }
}

/// Main Redmine client
#[derive(Clone)]
pub struct Redmine {
    session: Arc<Session>,
}

impl Redmine {
    /// Create a client talking HTTP to the Redmine instance at `url`
    pub fn new(url: &str, auth: Auth) -> Result<Self> {
        let transport = HttpTransport::new(url, auth, None)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Create a client from persisted configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = config
            .effective_url()
            .ok_or_else(|| Error::Config("no Redmine URL configured".to_string()))?;

        let transport = HttpTransport::new(&url, config.auth(), config.timeout())?;
        let mut client = Self::with_transport(Arc::new(transport));
        if let Some(version) = config.version.as_deref() {
            client = client.with_version(version.parse()?);
        }
        Ok(client)
    }

    /// Create a client over any transport
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            session: Arc::new(Session {
                transport,
                version: None,
            }),
        }
    }

    /// Declare the connected server's version; managers for newer resource
    /// types are refused afterwards
    pub fn with_version(self, version: ApiVersion) -> Self {
        Self {
            session: Arc::new(Session {
                transport: Arc::clone(&self.session.transport),
                version: Some(version),
            }),
        }
    }

    pub fn version(&self) -> Option<&ApiVersion> {
        self.session.version.as_ref()
    }

    /// Get the manager for a resource type, e.g. `client.manager("project")`
    pub fn manager(&self, resource: &str) -> Result<ResourceManager> {
        ResourceManager::open(Arc::clone(&self.session), resource)
    }

    /// Upload a file and return its token for use in an `uploads` field
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<String> {
        self.session.upload(path.as_ref()).await
    }
}
