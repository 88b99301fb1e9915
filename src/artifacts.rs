use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;

// Where sync payloads come from: the generation origin's context api. Full-sync
// runs ask for the manifest; explicit runs fetch named files directly.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn manifest(&self) -> Result<Vec<String>, StoreError>;
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

#[derive(Deserialize)]
struct ContextManifest {
    files: Vec<String>,
}

pub struct HttpArtifactSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtifactSource {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| StoreError::new(format!("GET {url} failed: {err}")))?;
        if !response.status().is_success() {
            return Err(StoreError::new(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn manifest(&self) -> Result<Vec<String>, StoreError> {
        let manifest: ContextManifest = self
            .get("/api/context")
            .await?
            .json()
            .await
            .map_err(|err| StoreError::new(format!("invalid context manifest: {err}")))?;
        Ok(manifest.files)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let bytes = self
            .get(&format!("/api/context/{name}"))
            .await?
            .bytes()
            .await
            .map_err(|err| StoreError::new(format!("reading {name} failed: {err}")))?;
        Ok(bytes.to_vec())
    }
}
