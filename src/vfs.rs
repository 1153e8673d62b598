//! Filesystem namespace seen by the sandboxed server.
//!
//! Paths are virtual: absolute, `/`-separated, rooted at the server's
//! private namespace rather than the host's `/`.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Filesystem operations the stager needs from the process host.
///
/// Synchronous on purpose: staging writes are bounded and must have fully
/// completed before the server's run dependency is released.
pub trait VirtualFs: Send + Sync {
    /// Creates `path` and all missing parents. Existing directories are fine.
    fn mkdir_tree(&self, path: &str) -> io::Result<()>;

    /// Writes `bytes` at `path`, replacing any previous content.
    fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()>;

    /// Reads the file at `path`.
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Host directory backing `/`, if the namespace lives on the host.
    fn host_root(&self) -> Option<&Path> {
        None
    }
}

/// Splits a virtual path into its normal components.
///
/// `/` alone yields an empty list. Relative paths and `..` are rejected.
pub fn components(path: &str) -> io::Result<Vec<String>> {
    if !path.starts_with('/') {
        return Err(invalid(path, "path must be absolute"));
    }
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(invalid(path, "path must not escape the root")),
        }
    }
    Ok(parts)
}

fn invalid(path: &str, reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{reason}: {path:?}"))
}

/// A private directory on the host used as the server's filesystem root.
///
/// The dedicated server is started with this directory as its working
/// directory, so `/demoq3/pak0.pk3` here is `<root>/demoq3/pak0.pk3`.
pub struct HostDirFs {
    root: PathBuf,
}

impl HostDirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Host path for a virtual path.
    pub fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let mut host = self.root.clone();
        for part in components(path)? {
            host.push(part);
        }
        Ok(host)
    }
}

impl VirtualFs for HostDirFs {
    fn mkdir_tree(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.resolve(path)?)
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let target = self.resolve(path)?;
        let file_name = target
            .file_name()
            .ok_or_else(|| invalid(path, "path has no file name"))?
            .to_string_lossy()
            .into_owned();

        // Write next to the target and rename over it: the server either
        // sees the old file or the complete new one.
        let staging = target.with_file_name(format!(".{file_name}.staging"));
        std::fs::write(&staging, bytes)?;
        if let Err(e) = std::fs::rename(&staging, &target) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn host_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
pub(crate) mod memfs {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Tree {
        dirs: BTreeSet<String>,
        files: BTreeMap<String, Vec<u8>>,
    }

    /// In-memory filesystem double. Mirrors the host semantics: writing
    /// into a missing directory fails, `mkdir_tree` is idempotent.
    #[derive(Default)]
    pub struct MemFs {
        tree: Mutex<Tree>,
    }

    impl MemFs {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
            self.tree.lock().unwrap().files.clone()
        }

        pub fn dirs(&self) -> BTreeSet<String> {
            self.tree.lock().unwrap().dirs.clone()
        }
    }

    fn join(parts: &[String]) -> String {
        format!("/{}", parts.join("/"))
    }

    impl VirtualFs for MemFs {
        fn mkdir_tree(&self, path: &str) -> io::Result<()> {
            let parts = components(path)?;
            let mut tree = self.tree.lock().unwrap();
            for depth in 1..=parts.len() {
                let dir = join(&parts[..depth]);
                if tree.files.contains_key(&dir) {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{dir} is a file"),
                    ));
                }
                tree.dirs.insert(dir);
            }
            Ok(())
        }

        fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
            let parts = components(path)?;
            let Some((_, parent)) = parts.split_last() else {
                return Err(invalid(path, "path has no file name"));
            };
            let mut tree = self.tree.lock().unwrap();
            if !parent.is_empty() && !tree.dirs.contains(&join(parent)) {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent of {path} does not exist"),
                ));
            }
            let file = join(&parts);
            if tree.dirs.contains(&file) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{file} is a directory"),
                ));
            }
            tree.files.insert(file, bytes.to_vec());
            Ok(())
        }

        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            let file = join(&components(path)?);
            self.tree
                .lock()
                .unwrap()
                .files
                .get(&file)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file))
        }
    }
}
