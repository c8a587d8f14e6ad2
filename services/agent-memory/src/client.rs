//! Journal server memory API client

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::memory::AgentMemory;

/// The shared replica a local one syncs against
#[async_trait::async_trait]
pub trait MemoryRemote: Send + Sync {
    /// Push a local replica; the remote merges, persists and returns the result.
    async fn push(&self, memory: &AgentMemory) -> anyhow::Result<AgentMemory>;
}

/// HTTP client for `/v1/memory` on the journal server
pub struct MemorySyncClient {
    client: Client,
    base_url: String,
}

impl MemorySyncClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the shared replica without contributing to it
    pub async fn fetch(&self) -> anyhow::Result<AgentMemory> {
        let url = format!("{}/v1/memory", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(anyhow::anyhow!("Memory fetch failed: {} - {}", status, text))
        }
    }
}

#[async_trait::async_trait]
impl MemoryRemote for MemorySyncClient {
    async fn push(&self, memory: &AgentMemory) -> anyhow::Result<AgentMemory> {
        let url = format!("{}/v1/memory/sync", self.base_url);
        debug!("Pushing agent memory (level {}) to {}", memory.level, url);

        let response = self.client.post(&url).json(memory).send().await?;

        if response.status().is_success() {
            let merged: AgentMemory = response.json().await?;
            Ok(merged.normalized())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(anyhow::anyhow!("Memory sync failed: {} - {}", status, text))
        }
    }
}
