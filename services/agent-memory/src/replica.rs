//! Local replica persisted as a JSON state file

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::memory::{merge, AgentMemory, Lesson};

/// Errors from the local replica
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid memory JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The client-side copy of the agent memory.
///
/// Mutations apply immediately and are written through to `path`; a later
/// sync reconciles them with the shared replica.
pub struct LocalReplica {
    path: PathBuf,
    memory: Mutex<AgentMemory>,
}

impl LocalReplica {
    /// Load the replica from `path`, seeding a fresh one if the file is absent.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let memory = match fs::read_to_string(&path).await {
            Ok(json) => {
                let memory: AgentMemory = serde_json::from_str(&json)?;
                debug!("Loaded agent memory from {:?}", path);
                memory.normalized()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No agent memory at {:?}, seeding a new replica", path);
                let seed = AgentMemory::seed();
                write_state(&path, &seed).await?;
                seed
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            memory: Mutex::new(memory),
        })
    }

    pub async fn snapshot(&self) -> AgentMemory {
        self.memory.lock().await.clone()
    }

    pub async fn add_experience(&self, amount: u64) -> Result<AgentMemory, MemoryError> {
        let mut memory = self.memory.lock().await;
        let gained = memory.add_experience(amount);
        if gained > 0 {
            info!(level = memory.level, brain = %memory.brain_version, "Agent levelled up");
        }
        write_state(&self.path, &memory).await?;
        Ok(memory.clone())
    }

    pub async fn add_lesson(&self, insight: &str, trend_context: &str) -> Result<Lesson, MemoryError> {
        let mut memory = self.memory.lock().await;
        let lesson = memory.add_lesson(insight, trend_context);
        write_state(&self.path, &memory).await?;
        Ok(lesson)
    }

    /// Fold a replica returned by the shared copy into the local one.
    pub async fn absorb(&self, remote: &AgentMemory) -> Result<AgentMemory, MemoryError> {
        let mut memory = self.memory.lock().await;
        let merged = merge(&memory, remote);
        write_state(&self.path, &merged).await?;
        *memory = merged.clone();
        Ok(merged)
    }
}

async fn write_state(path: &Path, memory: &AgentMemory) -> Result<(), MemoryError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).await?;
        }
    }
    let json = serde_json::to_string_pretty(memory)?;
    fs::write(path, json).await?;
    debug!("Wrote agent memory to {:?}", path);
    Ok(())
}
