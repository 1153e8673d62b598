pub mod args;
pub mod deps;
pub mod entry;

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::cache::{self, AssetCache};
use crate::error::LaunchError;
use crate::gate;
use crate::stager;
use crate::vfs::VirtualFs;

pub use args::LaunchArguments;
pub use deps::RunDependencies;
pub use entry::{ExecEntry, ExitReport, LocateFile, ServerEntry};

/// An asset the server must not start without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingAsset {
    /// Cache key, e.g. `/demoq3/pak0.pk3`.
    pub key: String,
    /// Where the asset appears in the server's filesystem.
    pub path: String,
    /// Name of the run dependency gating server start.
    pub dependency: String,
    /// Expected SHA-1 (hex) of the cached bytes, if known.
    pub sha1: Option<String>,
}

/// Everything the launcher needs to start the server once.
pub struct LaunchOptions {
    pub arguments: LaunchArguments,
    pub working_assets: Vec<WorkingAsset>,
}

/// Coordinates one server start.
///
/// Asset reads, staging and the server's own startup run concurrently on
/// the caller's task; the server entry point is only invoked after every
/// run dependency has been released.
pub struct Launcher {
    cache: Arc<dyn AssetCache>,
    fs: Arc<dyn VirtualFs>,
    deps: RunDependencies,
}

impl Launcher {
    pub fn new(cache: Arc<dyn AssetCache>, fs: Arc<dyn VirtualFs>) -> Self {
        Self {
            cache,
            fs,
            deps: RunDependencies::new(),
        }
    }

    pub fn dependencies(&self) -> &RunDependencies {
        &self.deps
    }

    /// Stages every working asset, then runs the server.
    ///
    /// The first failure aborts the whole launch: sibling reads and
    /// stagings are dropped and the entry point is never invoked.
    pub async fn launch(
        &self,
        entry: &dyn ServerEntry,
        options: LaunchOptions,
    ) -> Result<ExitReport, LaunchError> {
        info!(
            "Launching {} with {} working asset(s) from {}",
            entry.description(),
            options.working_assets.len(),
            self.cache.description()
        );

        // Every precondition is in place before anything can observe the
        // dependency count.
        for asset in &options.working_assets {
            self.deps.register(&asset.dependency)?;
        }

        let mut producers = Vec::with_capacity(options.working_assets.len());
        let mut stagers = Vec::with_capacity(options.working_assets.len());
        for asset in &options.working_assets {
            let (resolver, waiter) = gate::channel::<Vec<u8>>(&asset.key);
            producers.push(self.fetch(asset, resolver));
            stagers.push(self.stage(asset, waiter));
        }

        let server = async {
            self.deps.ready().await;
            info!("All run dependencies released, starting server");
            entry
                .run(&options.arguments, self.fs.as_ref())
                .await
                .map_err(LaunchError::Entry)
        };

        let (_, _, report) =
            tokio::try_join!(try_join_all(producers), try_join_all(stagers), server)?;
        Ok(report)
    }

    /// Reads an asset from the cache and hands it to its gate.
    async fn fetch(
        &self,
        asset: &WorkingAsset,
        resolver: gate::Resolver<Vec<u8>>,
    ) -> Result<(), LaunchError> {
        let bytes =
            cache::read_verified(self.cache.as_ref(), &asset.key, asset.sha1.as_deref()).await?;
        resolver.resolve(bytes)
    }

    /// Waits for the asset, stages it, then releases its dependency.
    async fn stage(
        &self,
        asset: &WorkingAsset,
        waiter: gate::Waiter<Vec<u8>>,
    ) -> Result<(), LaunchError> {
        let bytes = waiter.wait().await?;
        self.deps.begin_staging(&asset.dependency)?;
        debug!("Staging {} at {}", asset.key, asset.path);
        stager::stage(self.fs.as_ref(), &asset.path, &bytes)?;
        self.deps.release(&asset.dependency)
    }
}
