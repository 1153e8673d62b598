//! Run dependencies: named preconditions that hold back server start.
//!
//! Works as a countdown latch. Each registered dependency bumps a
//! counter published on a `watch` channel; [`RunDependencies::ready`]
//! resolves once the counter is back to zero.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::LaunchError;

/// Lifecycle of one dependency. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Registered,
    Staging,
    Released,
}

pub struct RunDependencies {
    states: Mutex<BTreeMap<String, DependencyState>>,
    pending: watch::Sender<usize>,
}

impl RunDependencies {
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            states: Mutex::new(BTreeMap::new()),
            pending,
        }
    }

    /// Registers a precondition. Names are unique for the whole launch.
    pub fn register(&self, name: &str) -> Result<(), LaunchError> {
        let mut states = self.lock();
        if states.contains_key(name) {
            return Err(misuse(format!("run dependency '{name}' registered twice")));
        }
        states.insert(name.to_string(), DependencyState::Registered);
        self.pending.send_modify(|n| *n += 1);
        info!("Run dependency '{name}' registered ({} pending)", self.pending());
        Ok(())
    }

    /// Marks a registered dependency as being staged.
    pub fn begin_staging(&self, name: &str) -> Result<(), LaunchError> {
        self.transition(name, DependencyState::Registered, DependencyState::Staging)?;
        debug!("Run dependency '{name}' staging");
        Ok(())
    }

    /// Releases a dependency whose staging has completed.
    ///
    /// Only a dependency in `Staging` can be released.
    pub fn release(&self, name: &str) -> Result<(), LaunchError> {
        self.transition(name, DependencyState::Staging, DependencyState::Released)?;
        self.pending.send_modify(|n| *n -= 1);
        info!("Run dependency '{name}' released ({} pending)", self.pending());
        Ok(())
    }

    /// Names of dependencies not yet released, in name order.
    pub fn unreleased(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, state)| **state != DependencyState::Released)
            .map(|(name, _)| name.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn state(&self, name: &str) -> Option<DependencyState> {
        self.lock().get(name).copied()
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once no registered dependency remains unreleased.
    pub async fn ready(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    fn transition(
        &self,
        name: &str,
        from: DependencyState,
        to: DependencyState,
    ) -> Result<(), LaunchError> {
        let mut states = self.lock();
        match states.get_mut(name) {
            Some(state) if *state == from => {
                *state = to;
                Ok(())
            }
            Some(state) => Err(misuse(format!(
                "run dependency '{name}' cannot move from {state:?} to {to:?}"
            ))),
            None => Err(misuse(format!("run dependency '{name}' was never registered"))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, DependencyState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for RunDependencies {
    fn default() -> Self {
        Self::new()
    }
}

fn misuse(message: String) -> LaunchError {
    error!("{message}");
    LaunchError::GateMisuse(message)
}
