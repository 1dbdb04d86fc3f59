//! reqwest-backed request wrapper for the analysis service.

use async_trait::async_trait;
use dealflow_core::ArtifactMetadata;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactSource;
use crate::config::ClientConfig;
use crate::transport::{AnalysisTransport, Endpoint, HttpError, Method};

/// HTTP client for the analysis service's REST endpoints.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new client for the given base URL.
    ///
    /// `base_url` should be like `http://localhost:8000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send one request and decode the JSON response body.
    ///
    /// Non-2xx responses become [`HttpError::Server`] with the body kept
    /// verbatim, since backends report key problems there.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        let url = self.url(path);
        info!(%method, url = %url, "sending request to analysis service");

        let builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%method, url = %url, status = status.as_u16(), "analysis service returned an error");
            return Err(HttpError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        debug!(url = %url, bytes = text.len(), "response received");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Check that the analysis service is up.
    pub async fn health(&self) -> Result<Value, HttpError> {
        self.request(Method::Get, "/health", None).await
    }
}

#[async_trait]
impl AnalysisTransport for HttpClient {
    async fn send(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, HttpError> {
        let body = match endpoint.method {
            Method::Get => None,
            Method::Post => Some(payload),
        };
        self.request(endpoint.method, &endpoint.path, body).await
    }
}

#[async_trait]
impl ArtifactSource for HttpClient {
    async fn pitch_deck_metadata(
        &self,
        subject_id: &str,
    ) -> Result<Option<ArtifactMetadata>, HttpError> {
        let path = encoded_path(&["subjects", subject_id, "pitch-deck"])?;
        match self.request(Method::Get, &path, None).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Join `segments` into an absolute path, percent-encoding each one.
fn encoded_path(segments: &[&str]) -> Result<String, HttpError> {
    let mut url = reqwest::Url::parse("http://localhost/")
        .map_err(|e| HttpError::Other(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| HttpError::Other("url cannot carry a path".into()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}
