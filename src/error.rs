use std::path::PathBuf;

/// Errors raised while discovering and ordering source files.
///
/// These are structural: a run that hits one of them cannot produce a
/// meaningful book, so the pipelines abort instead of counting a failure.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Source directory '{path}' does not exist")]
    MissingSourceDir { path: PathBuf },

    #[error("No partition segment (partN) found in path: {path}")]
    NoPartition { path: PathBuf },

    #[error("Partition segment '{segment}' in {path} is not a valid index")]
    InvalidPartition { path: PathBuf, segment: String },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No renderer available in chain '{chain}' (tried: {tried})")]
    NoProviderAvailable { chain: String, tried: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported manifest version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}
