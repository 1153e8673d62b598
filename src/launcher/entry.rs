//! `ServerEntry` trait — the sandboxed server's entry point.
//!
//! The launcher treats the server as opaque: it gets a command line and
//! a filesystem, and reports how it ended.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::args::LaunchArguments;
use crate::vfs::VirtualFs;

/// How the server's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl ExitReport {
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Entry point of the sandboxed server.
///
/// Called exactly once, after every run dependency has been released.
#[async_trait]
pub trait ServerEntry: Send + Sync {
    /// Runs the server to completion.
    async fn run(&self, argv: &LaunchArguments, fs: &dyn VirtualFs) -> Result<ExitReport>;

    /// Human-readable description, e.g. the resolved binary path.
    fn description(&self) -> String;
}

/// Resolves files of the server build (binary, data files) against the
/// build directory.
#[derive(Debug, Clone)]
pub struct LocateFile {
    build_path: PathBuf,
}

impl LocateFile {
    pub fn new(build_path: impl Into<PathBuf>) -> Self {
        Self {
            build_path: build_path.into(),
        }
    }

    pub fn locate(&self, file: &str) -> PathBuf {
        self.build_path.join(file)
    }
}

/// Runs the dedicated server as a child process.
///
/// The child's working directory is the host root of the filesystem it
/// is run with, so staged paths are visible to it relative to where it
/// starts. Only host-backed filesystems can run a native process.
pub struct ExecEntry {
    program: PathBuf,
}

impl ExecEntry {
    pub fn new(locate: &LocateFile, binary: &str) -> Self {
        Self {
            program: locate.locate(binary),
        }
    }
}

#[async_trait]
impl ServerEntry for ExecEntry {
    async fn run(&self, argv: &LaunchArguments, fs: &dyn VirtualFs) -> Result<ExitReport> {
        // Relative program paths would be resolved against the child's
        // working directory, which is the sandbox root.
        let program = match std::fs::canonicalize(&self.program) {
            Ok(path) if path.is_file() => path,
            _ => {
                return Err(anyhow!(
                    "server binary not found at {}",
                    self.program.display()
                ))
            }
        };

        let root = fs
            .host_root()
            .ok_or_else(|| anyhow!("server filesystem has no host directory to run in"))?;
        // The root exists even when nothing was staged into it
        fs.mkdir_tree("/").context("preparing server root")?;

        info!("Starting {} {argv}", program.display());
        let mut child = Command::new(&program)
            .args(argv.as_slice())
            .current_dir(root)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", program.display()))?;

        let status = child.wait().await.context("waiting for server process")?;
        let report = ExitReport {
            code: status.code(),
        };
        if report.is_success() {
            info!("Server exited cleanly");
        } else {
            warn!("Server exited with {status}");
        }
        Ok(report)
    }

    fn description(&self) -> String {
        self.program.display().to_string()
    }
}
