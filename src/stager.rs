/// Materializes an asset inside the server's filesystem.
use tracing::{debug, info};

use crate::error::LaunchError;
use crate::vfs::{self, VirtualFs};

/// Writes `bytes` at `path`, creating the parent directories first.
///
/// Overwrites any previous content, so staging the same asset twice
/// leaves the filesystem as staging it once. Every failure is
/// `StagingFailed`: a server missing required data must not start.
pub fn stage(fs: &dyn VirtualFs, path: &str, bytes: &[u8]) -> Result<(), LaunchError> {
    let parts = vfs::components(path).map_err(|e| LaunchError::staging(path, e))?;
    let Some((_, parent)) = parts.split_last() else {
        return Err(LaunchError::staging(path, "path has no file name"));
    };

    let parent = format!("/{}", parent.join("/"));
    debug!("Creating {parent} for {path}");
    fs.mkdir_tree(&parent)
        .map_err(|e| LaunchError::staging(path, format!("mkdir {parent}: {e}")))?;

    fs.write_file(path, bytes)
        .map_err(|e| LaunchError::staging(path, format!("write: {e}")))?;

    info!("Staged {path} ({} bytes)", bytes.len());
    Ok(())
}
