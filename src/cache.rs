/// Read side of the durable asset cache.
///
/// The cache is populated out of band by the client; here we only look
/// assets up by key and hand back the stored bytes untouched.
///
/// All I/O in this module uses `tokio::fs` so a slow disk does not stall
/// the launcher's single thread.
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::error::LaunchError;

/// Keyed, read-only view of the asset cache.
#[async_trait]
pub trait AssetCache: Send + Sync {
    /// Returns the exact bytes stored under `key`.
    ///
    /// Fails with `AssetNotFound` when nothing is stored under the key.
    async fn read(&self, key: &str) -> Result<Vec<u8>, LaunchError>;

    /// Human-readable description, e.g. `"disk cache 'thelongestyard'"`.
    fn description(&self) -> String;
}

/// A named cache stored as a directory tree on disk.
///
/// Cache `name` under `dir` lives at `<dir>/<name>/`; the key
/// `/demoq3/pak0.pk3` is the file `<dir>/<name>/demoq3/pak0.pk3`.
pub struct DiskCache {
    name: String,
    root: PathBuf,
}

impl DiskCache {
    /// Opens the named cache. A cache that was never written is simply
    /// empty: every read reports `AssetNotFound`.
    pub fn open(dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: dir.join(name),
        }
    }
}

#[async_trait]
impl AssetCache for DiskCache {
    async fn read(&self, key: &str) -> Result<Vec<u8>, LaunchError> {
        // A key that cannot map into the cache directory was never stored
        let Some(relative) = key_to_relative_path(key) else {
            debug!("Rejecting malformed cache key {key:?}");
            return Err(LaunchError::AssetNotFound {
                key: key.to_string(),
            });
        };

        let path = self.root.join(relative);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Cache hit for {key} at {}", path.display());
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LaunchError::AssetNotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(LaunchError::CacheRead {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn description(&self) -> String {
        format!("disk cache '{}' ({})", self.name, self.root.display())
    }
}

/// Maps a cache key to a path relative to the cache root.
///
/// Keys are absolute, `/`-separated and made only of normal components.
/// Returns `None` for anything else (relative keys, `..`, empty keys).
fn key_to_relative_path(key: &str) -> Option<PathBuf> {
    let rest = key.strip_prefix('/')?;
    let mut relative = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

/// Hex-encoded SHA-1 of an asset, used for logging and integrity checks.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Reads `key` and, when `expected_sha1` is set, checks the bytes against it.
pub async fn read_verified(
    cache: &dyn AssetCache,
    key: &str,
    expected_sha1: Option<&str>,
) -> Result<Vec<u8>, LaunchError> {
    let bytes = cache.read(key).await?;
    let actual = fingerprint(&bytes);

    if let Some(expected) = expected_sha1 {
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(LaunchError::AssetDigestMismatch {
                key: key.to_string(),
                expected: expected.to_lowercase(),
                actual,
            });
        }
    }

    info!("Loaded {key} from cache ({} bytes, sha1 {actual})", bytes.len());
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn seed(dir: &Path, name: &str, key: &str, bytes: &[u8]) {
        let path = dir.join(name).join(key.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_key_to_relative_path() {
        assert_eq!(
            key_to_relative_path("/demoq3/pak0.pk3"),
            Some(PathBuf::from("demoq3/pak0.pk3"))
        );
        assert_eq!(
            key_to_relative_path("/./demoq3/pak0.pk3"),
            Some(PathBuf::from("demoq3/pak0.pk3"))
        );
        assert_eq!(key_to_relative_path("demoq3/pak0.pk3"), None);
        assert_eq!(key_to_relative_path("/../etc/passwd"), None);
        assert_eq!(key_to_relative_path("/demoq3/../../x"), None);
        assert_eq!(key_to_relative_path("/"), None);
        assert_eq!(key_to_relative_path(""), None);
    }

    #[tokio::test]
    async fn test_disk_cache_returns_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        seed(dir.path(), "thelongestyard", "/demoq3/pak0.pk3", &bytes);

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        let read = cache.read("/demoq3/pak0.pk3").await.unwrap();
        assert_eq!(read, bytes);
    }

    #[tokio::test]
    async fn test_disk_cache_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "thelongestyard", "/empty.bin", b"");

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        assert!(cache.read("/empty.bin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_cache_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "thelongestyard", "/other.pk3", b"x");

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        let err = cache.read("/demoq3/pak0.pk3").await.unwrap_err();
        assert!(matches!(err, LaunchError::AssetNotFound { ref key } if key == "/demoq3/pak0.pk3"));
    }

    #[tokio::test]
    async fn test_disk_cache_never_populated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path(), "thelongestyard");
        let err = cache.read("/demoq3/pak0.pk3").await.unwrap_err();
        assert!(matches!(err, LaunchError::AssetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_disk_cache_is_scoped_by_name() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "other-cache", "/demoq3/pak0.pk3", b"x");

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        assert!(cache.read("/demoq3/pak0.pk3").await.is_err());
    }

    #[tokio::test]
    async fn test_disk_cache_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret"), b"s").unwrap();

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        let err = cache.read("/../secret").await.unwrap_err();
        assert!(matches!(err, LaunchError::AssetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_disk_cache_directory_key_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("thelongestyard/demoq3")).unwrap();

        let cache = DiskCache::open(dir.path(), "thelongestyard");
        let err = cache.read("/demoq3").await.unwrap_err();
        assert!(matches!(err, LaunchError::CacheRead { .. }));
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(
            fingerprint(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn test_read_verified_accepts_matching_digest() {
        let cache = memory::MemoryCache::new().with("/a", b"abc");
        let bytes = read_verified(&cache, "/a", Some("A9993E364706816ABA3E25717850C26C9CD0D89D"))
            .await
            .unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test]
    async fn test_read_verified_rejects_mismatch() {
        let cache = memory::MemoryCache::new().with("/a", b"abd");
        let err = read_verified(&cache, "/a", Some("a9993e364706816aba3e25717850c26c9cd0d89d"))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::AssetDigestMismatch { ref key, .. } if key == "/a"));
    }

    #[tokio::test]
    async fn test_read_verified_without_digest() {
        let cache = memory::MemoryCache::new().with("/a", b"anything");
        assert_eq!(read_verified(&cache, "/a", None).await.unwrap(), b"anything");
    }
}
