use crate::domain::{CapabilityMap, TelemetryTree};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};
use tracing::trace;

/// Latest published telemetry tree.
pub type TelemetrySnapshot = Arc<TelemetryTree>;

/// Shared session state: the telemetry tree and the capability map. Guards are only held for the
/// duration of a read or a write, never across a request to the gateway.
#[derive(Debug)]
pub struct Store {
    telemetry: RwLock<TelemetryTree>,
    capabilities: RwLock<CapabilityMap>,
    notifier_tx: WatchSender<TelemetrySnapshot>,
    notifier_rx: WatchReceiver<TelemetrySnapshot>,
}

impl Store {
    pub fn new() -> Self {
        let (notifier_tx, notifier_rx) = watch::channel::<TelemetrySnapshot>(Arc::new(TelemetryTree::default()));

        Store {
            telemetry: RwLock::new(TelemetryTree::default()),
            capabilities: RwLock::new(CapabilityMap::default()),
            notifier_tx,
            notifier_rx,
        }
    }

    pub fn notifier(&self) -> WatchReceiver<TelemetrySnapshot> {
        self.notifier_rx.clone()
    }

    pub async fn telemetry(&self) -> TelemetryTree {
        self.telemetry.read().await.clone()
    }

    pub async fn capabilities(&self) -> CapabilityMap {
        self.capabilities.read().await.clone()
    }

    /// Reads a part of the tree without cloning all of it.
    pub async fn read<T>(&self, f: impl FnOnce(&TelemetryTree) -> T) -> T {
        f(&*self.telemetry.read().await)
    }

    /// Mutates the tree and publishes the result to watchers.
    pub async fn update<T>(&self, f: impl FnOnce(&mut TelemetryTree) -> T) -> T {
        let mut tree = self.telemetry.write().await;
        let result = f(&mut tree);
        let snapshot = Arc::new(tree.clone());
        drop(tree);

        trace!("Publishing telemetry snapshot");
        self.notifier_tx.send(snapshot).unwrap_or_default();
        result
    }

    pub async fn update_capabilities<T>(&self, f: impl FnOnce(&mut CapabilityMap) -> T) -> T {
        f(&mut *self.capabilities.write().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_are_published_to_watchers() {
        let store = Store::new();
        let mut notifier = store.notifier();

        store.update(|tree| tree.grid_profile = Some("IEEE 1547".to_string())).await;

        assert!(notifier.has_changed().unwrap());
        assert_eq!(notifier.borrow_and_update().grid_profile.as_deref(), Some("IEEE 1547"));
        assert_eq!(store.read(|tree| tree.grid_profile.clone()).await.as_deref(), Some("IEEE 1547"));
    }

    #[tokio::test]
    async fn capabilities_are_updated_in_place() {
        let store = Store::new();

        store.update_capabilities(|capabilities| capabilities.home.prove()).await;

        assert!(store.capabilities().await.home.is_proven());
    }
}
