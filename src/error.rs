/// Errors that terminate a launch.
///
/// None of these are recovered locally: whichever one surfaces first
/// aborts the launch and the sandboxed server never starts.
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The required asset is not in the cache. The cache is filled by a
    /// separate client flow; this core never fetches from origin.
    #[error("asset {key} not found in cache (run the client first to download it)")]
    AssetNotFound { key: String },

    /// The cache exists but the entry could not be read.
    #[error("failed to read asset {key} from cache: {source}")]
    CacheRead {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The cached bytes do not match the configured SHA-1 digest.
    #[error("asset {key} digest mismatch (expected {expected}, found {actual})")]
    AssetDigestMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// Writing the asset into the server's filesystem failed.
    #[error("failed to stage {path}: {reason}")]
    StagingFailed { path: String, reason: String },

    /// Startup gate or run dependency used outside its contract.
    #[error("startup gate misuse: {0}")]
    GateMisuse(String),

    /// The server entry point could not be started or crashed on startup.
    #[error("server entry point failed: {0:#}")]
    Entry(anyhow::Error),
}

impl LaunchError {
    pub fn staging(path: &str, reason: impl ToString) -> Self {
        LaunchError::StagingFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
