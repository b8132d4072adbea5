//! Artifact store - key/value object storage over HTTP
//!
//! Screenshots, diffs, the HTML report, and the run log live under
//! `<version>/<relative-path>` keys. Reads are anonymous; writes carry
//! a bearer token, which doubles as the "can this environment upload"
//! capability check.

use std::path::Path;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

#[derive(Clone)]
pub struct ArtifactStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ArtifactStore {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Whether this environment holds write credentials.
    pub fn can_upload(&self) -> bool {
        self.token.is_some()
    }

    /// Public URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Fetch an object; `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> HarnessResult<Option<Vec<u8>>> {
        let url = self.public_url(key);
        debug!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(HarnessError::Store(format!(
                "GET {} returned {}",
                key,
                resp.status()
            )));
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    /// Store bytes under a key.
    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> HarnessResult<()> {
        let token = self.token.as_ref().ok_or(HarnessError::MissingCredentials)?;
        let url = self.public_url(key);
        debug!("PUT {} ({} bytes)", url, bytes.len());

        let resp = self
            .client
            .put(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(HarnessError::Store(format!(
                "PUT {} returned {}",
                key,
                resp.status()
            )));
        }
        Ok(())
    }

    /// Store a local file under a key, guessing the content type from
    /// its extension.
    pub async fn put_file(&self, key: &str, path: &Path) -> HarnessResult<()> {
        let bytes = std::fs::read(path)?;
        self.put(key, bytes, content_type_for(path)).await
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("html") => "text/html",
        Some("log") | Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
