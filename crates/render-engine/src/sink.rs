//! Where finished containers go.

use std::path::{Path, PathBuf};

use lumagrade_common::error::LumaResult;

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// File extension without the dot.
    pub extension: &'static str,
}

/// Receives the container bytes of a completed export.
///
/// Never called for a cancelled or failed job.
#[async_trait::async_trait]
pub trait ArtifactSink: Send {
    async fn save(&mut self, artifact: Artifact) -> LumaResult<()>;
}

/// Writes the artifact to a file, creating parent directories.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ArtifactSink for FileSink {
    async fn save(&mut self, artifact: Artifact) -> LumaResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, &artifact.bytes).await?;
        tracing::info!(
            path = %self.path.display(),
            bytes = artifact.bytes.len(),
            "Export saved"
        );
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub artifacts: Vec<Artifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn save(&mut self, artifact: Artifact) -> LumaResult<()> {
        self.artifacts.push(artifact);
        Ok(())
    }
}
