use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::CollectError;

/// Number of top-level source partitions, `part0` through `part6`.
pub const PARTITION_COUNT: u32 = 7;

/// Primary sort key of a source file, taken from its `partN` directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionIndex(pub u32);

impl PartitionIndex {
    /// Find the partition of `path`.
    ///
    /// The directory closest to the file that is named `part<digits>` wins,
    /// so a base directory that happens to contain `part` in its own path
    /// does not shadow the real partition.
    pub fn from_path(path: &Path) -> Result<Self, CollectError> {
        let mut malformed = None;

        let dirs = path.parent().map(|p| p.components().rev()).into_iter().flatten();
        for component in dirs {
            let segment = component.as_os_str().to_string_lossy();
            let Some(rest) = segment.strip_prefix("part") else {
                continue;
            };

            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return rest.parse::<u32>().map(PartitionIndex).map_err(|_| {
                    CollectError::InvalidPartition {
                        path: path.to_path_buf(),
                        segment: segment.to_string(),
                    }
                });
            }

            malformed.get_or_insert_with(|| segment.to_string());
        }

        Err(match malformed {
            Some(segment) => CollectError::InvalidPartition {
                path: path.to_path_buf(),
                segment,
            },
            None => CollectError::NoPartition {
                path: path.to_path_buf(),
            },
        })
    }
}

impl fmt::Display for PartitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part{}", self.0)
    }
}

/// One Markdown chapter as read from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub partition: PartitionIndex,
    pub content: String,
}

impl SourceDocument {
    pub async fn read(path: &Path) -> Result<Self> {
        let partition = PartitionIndex::from_path(path)?;
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            partition,
            content,
        })
    }
}

/// Collect every `*.{extension}` file directly inside `base/part0` ..
/// `base/part6`, ordered by partition and then by full path.
///
/// Partition directories that do not exist are skipped.
pub async fn collect_sources(base: &Path, extension: &str) -> Result<Vec<PathBuf>, CollectError> {
    if !base.is_dir() {
        return Err(CollectError::MissingSourceDir {
            path: base.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    for index in 0..PARTITION_COUNT {
        let dir = base.join(PartitionIndex(index).to_string());
        if !dir.is_dir() {
            debug!("Skipping missing partition directory {}", dir.display());
            continue;
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|source| CollectError::ReadDir {
            path: dir.clone(),
            source,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| CollectError::ReadDir {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
    }

    sort_by_partition(files)
}

/// Order paths by partition index, then lexicographically by full path.
pub fn sort_by_partition(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, CollectError> {
    let mut keyed = paths
        .into_iter()
        .map(|path| {
            let partition = PartitionIndex::from_path(&path)?;
            Ok((partition, path.to_string_lossy().into_owned(), path))
        })
        .collect::<Result<Vec<_>, CollectError>>()?;

    keyed.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    Ok(keyed.into_iter().map(|(_, _, path)| path).collect())
}
