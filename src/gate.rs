//! Single-resolution startup gate.
//!
//! Decouples "when the asset becomes available" from "when staging needs
//! it": the cache reader holds the [`Resolver`], the stager holds the
//! [`Waiter`], and the two sides meet exactly once. Either side may arrive
//! first.

use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::error;

use crate::error::LaunchError;

/// Creates a gate. The resolver and waiter are used by exactly one
/// producer and one consumer.
pub fn channel<T>(name: &str) -> (Resolver<T>, Waiter<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver {
            name: name.to_string(),
            tx: Mutex::new(Some(tx)),
        },
        Waiter {
            name: name.to_string(),
            rx,
        },
    )
}

/// Producer half of the gate.
pub struct Resolver<T> {
    name: String,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Resolver<T> {
    /// Supplies the gate's value. A second call is rejected.
    pub fn resolve(&self, value: T) -> Result<(), LaunchError> {
        let tx = match self.tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(tx) = tx else {
            error!("Gate '{}' resolved twice", self.name);
            return Err(LaunchError::GateMisuse(format!(
                "gate '{}' resolved more than once",
                self.name
            )));
        };

        // The waiter may already be gone if the launch was abandoned;
        // that is not a contract violation on this side.
        let _ = tx.send(value);
        Ok(())
    }
}

/// Consumer half of the gate. Consumed by [`Waiter::wait`].
pub struct Waiter<T> {
    name: String,
    rx: oneshot::Receiver<T>,
}

impl<T> Waiter<T> {
    /// Suspends until the gate is resolved and returns the value.
    ///
    /// Fails with `GateMisuse` if the resolver is dropped without ever
    /// resolving.
    pub async fn wait(self) -> Result<T, LaunchError> {
        self.rx.await.map_err(|_| {
            error!("Gate '{}' abandoned before resolution", self.name);
            LaunchError::GateMisuse(format!(
                "gate '{}' dropped without a value",
                self.name
            ))
        })
    }
}
