use crate::domain::category::Category;
use serde_json::Value;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Outbound notification for the sinks around the core (smart-home bridge, REST mirror, MQTT).
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DataUpdated { category: Category, payload: Value },
    RestFul { path: String, payload: Value },
    Mqtt { label: String, payload: Value },
    SchedulerState { running: bool },
    Warning { category: Option<Category>, message: String },
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
    restful: bool,
    mqtt: bool,
}

impl Notifier {
    pub fn new(tx: Sender<Notification>, restful: bool, mqtt: bool) -> Self {
        Notifier { tx, restful, mqtt }
    }

    /// Fire-and-forget, a full buffer drops the notification.
    pub fn emit(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                warn!("⚠️ Notification buffer is full, dropping {:?}", notification);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    pub fn data_updated(&self, category: Category, payload: Value) {
        if self.restful {
            self.emit(Notification::RestFul {
                path: category.rest_path().to_string(),
                payload: payload.clone(),
            });
        }
        if self.mqtt {
            self.emit(Notification::Mqtt {
                label: category.mqtt_label().to_string(),
                payload: payload.clone(),
            });
        }
        self.emit(Notification::DataUpdated { category, payload });
    }

    pub fn warning(&self, category: Option<Category>, message: impl Into<String>) {
        self.emit(Notification::Warning {
            category,
            message: message.into(),
        });
    }
}
