//! Circuit artifact loading for offline verification

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::CircuitArtifact;
use crate::infra::{Result, VerificationError};

/// Where the compiled circuit comes from
#[derive(Debug, Clone)]
pub enum CircuitRef {
    /// Published artifact JSON, fetched once and cached
    Remote(Url),
    /// Artifact already in memory
    Inline(Arc<CircuitArtifact>),
}

impl CircuitRef {
    pub fn remote(url: &str) -> std::result::Result<Self, String> {
        Url::parse(url)
            .map(CircuitRef::Remote)
            .map_err(|e| format!("invalid circuit url {}: {}", url, e))
    }
}

/// Fetches and caches circuit artifacts by URL
pub struct CircuitLoader {
    client: Client,
    cache: RwLock<HashMap<Url, Arc<CircuitArtifact>>>,
}

impl Default for CircuitLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl CircuitLoader {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self, circuit: &CircuitRef) -> Result<Arc<CircuitArtifact>> {
        let url = match circuit {
            CircuitRef::Inline(artifact) => return Ok(Arc::clone(artifact)),
            CircuitRef::Remote(url) => url,
        };

        if let Some(cached) = self.cache.read().await.get(url) {
            debug!(%url, "Circuit artifact cache hit");
            return Ok(Arc::clone(cached));
        }

        let artifact = Arc::new(self.fetch(url).await?);
        info!(%url, noir_version = ?artifact.noir_version, "Loaded circuit artifact");

        self.cache
            .write()
            .await
            .insert(url.clone(), Arc::clone(&artifact));
        Ok(artifact)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn fetch(&self, url: &Url) -> Result<CircuitArtifact> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerificationError::CircuitUnavailable(format!("{}: {}", url, e)))?;

        response
            .json::<CircuitArtifact>()
            .await
            .map_err(|e| VerificationError::CircuitUnavailable(format!("invalid artifact: {}", e)))
    }
}
