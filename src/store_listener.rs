use crate::store::TelemetrySnapshot;
use tokio::sync::watch::Receiver;
use tracing::{debug, instrument};

#[instrument(skip_all)]
pub async fn store_listener(mut rx: Receiver<TelemetrySnapshot>) {
    while rx.changed().await.is_ok() {
        let snapshot: TelemetrySnapshot = rx.borrow_and_update().clone();
        let production = &snapshot.power_and_energy.production;
        debug!(
            power_w = production.power_w,
            energy_today_kwh = production.energy_today_kwh,
            energy_lifetime_kwh = production.energy_lifetime_kwh,
            "☀️ Telemetry updated"
        );
    }
}
