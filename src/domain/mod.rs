pub mod capability;
pub mod category;
pub mod commands;
pub mod controller;
pub mod events;
pub mod measurement;
pub mod telemetry;

pub use capability::CapabilityMap;
pub use category::Category;
pub use events::{Notification, Notifier};
pub use telemetry::TelemetryTree;
