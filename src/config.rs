use serde::Deserialize;
use std::path::PathBuf;

use crate::launcher::WorkingAsset;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    pub server: ServerConfig,
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Name of the cache the client populates
    #[serde(default = "default_cache_name")]
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            name: default_cache_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Directory holding the dedicated server build
    pub build_path: PathBuf,
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Private filesystem root of the server
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Whitespace-separated argument template, no quoting.
    /// Supports ${ENV_VAR} substitution
    #[serde(default = "default_arguments")]
    pub arguments: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Cache key, e.g. "/demoq3/pak0.pk3"
    pub key: String,
    /// Staging path in the server filesystem, defaults to the key
    pub path: Option<String>,
    #[serde(default = "default_dependency")]
    pub dependency: String,
    /// Expected SHA-1 of the cached bytes (hex)
    pub sha1: Option<String>,
}

const DEMO_PAK_KEY: &str = "/demoq3/pak0.pk3";

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}

fn default_cache_name() -> String {
    "thelongestyard".to_string()
}

fn default_binary() -> String {
    "ioq3ded.x86_64".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("./data/sandbox")
}

fn default_arguments() -> String {
    "+set fs_game demoq3\n+set net_enabled 16\n".to_string()
}

fn default_dependency() -> String {
    "setup-ioq3-filesystem".to_string()
}

fn default_assets() -> Vec<AssetConfig> {
    vec![AssetConfig {
        key: DEMO_PAK_KEY.to_string(),
        path: None,
        dependency: default_dependency(),
        sha1: None,
    }]
}

impl AssetConfig {
    pub fn to_working_asset(&self) -> WorkingAsset {
        WorkingAsset {
            key: self.key.clone(),
            path: self.path.clone().unwrap_or_else(|| self.key.clone()),
            dependency: self.dependency.clone(),
            sha1: self.sha1.clone(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // Expand environment variables like ${IOQ3_BUILD}
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    pub fn working_assets(&self) -> Vec<WorkingAsset> {
        self.assets.iter().map(AssetConfig::to_working_asset).collect()
    }
}
