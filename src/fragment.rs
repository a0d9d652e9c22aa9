use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::collector::PartitionIndex;
use crate::error::ManifestError;

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

/// The HTML produced for one source chapter, plus what is needed to place
/// it in a combined document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Source file base name, e.g. `01_intro`.
    pub key: String,
    /// Display title, e.g. `01 intro`.
    pub title: String,
    pub partition: PartitionIndex,
    pub source: PathBuf,
    /// The standalone document written for this chapter.
    pub output: PathBuf,
    pub html: String,
}

/// Fragments of one run, persisted next to the HTML outputs so a later
/// `combine` does not have to parse rendered pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub fragments: Vec<Fragment>,
}

impl Manifest {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            fragments,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let data = fs::read_to_string(path).await.map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest: Manifest = serde_json::from_str(&data).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }

        debug!("Loaded manifest with {} fragments from {}", manifest.fragments.len(), path.display());
        Ok(manifest)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .await
            .map_err(|e| anyhow!("Failed to write manifest to {}: {}", path.display(), e))?;
        Ok(())
    }
}
