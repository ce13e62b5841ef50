//! On-disk artifact store.
//!
//! One pretty-printed JSON file per domain under the artifact directory.
//! Re-crawling a domain overwrites its file: last write wins, so the store
//! always holds at most one artifact per domain.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use freshrag_core::models::CrawlArtifact;

pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{domain}.json"))
    }

    /// Write the artifact for its domain, replacing any previous one.
    pub fn write_artifact(&self, artifact: &CrawlArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(&artifact.domain);
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Read every stored artifact, sorted by domain for deterministic
    /// downstream ordering. A missing directory is an empty store.
    pub fn read_all(&self) -> Result<Vec<CrawlArtifact>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            artifacts.push(read_artifact(&path)?);
        }
        artifacts.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(artifacts)
    }
}

fn read_artifact(path: &Path) -> Result<CrawlArtifact> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
