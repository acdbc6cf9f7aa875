use crate::domain::Notification;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, instrument, trace, warn};

/// Logs outbound notifications until every sender is gone. Returns how many were received.
#[instrument(skip_all)]
pub async fn notification_listener(mut rx: Receiver<Notification>) -> usize {
    let mut received = 0;

    while let Some(notification) = rx.recv().await {
        received += 1;
        match notification {
            Notification::DataUpdated { category, payload } => {
                debug!(category = %category, "📣 '{}' updated", category);
                trace!(category = %category, "📣 {}", payload);
            }
            Notification::RestFul { path, .. } => trace!(path = %path, "📣 REST mirror updated"),
            Notification::Mqtt { label, .. } => trace!(label = %label, "📣 MQTT publish"),
            Notification::SchedulerState { running } => {
                info!("📣 Scheduler is {}", if running { "running" } else { "stopped" })
            }
            Notification::Warning { category, message } => match category {
                Some(category) => warn!(category = %category, "📣 '{}': {}", category, message),
                None => warn!("📣 {}", message),
            },
        }
    }

    received
}
