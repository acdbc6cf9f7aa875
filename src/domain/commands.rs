use crate::domain::telemetry::{DryContactSettings, GeneratorMode, StorageProfile};
use serde::Deserialize;

/// Control operations the host can issue against the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    SetProductionEnabled(bool),
    SetStorageSettings {
        profile: Option<StorageProfile>,
        reserved_soc: Option<f64>,
        charge_from_grid: Option<bool>,
    },
    SetGridConnected(bool),
    SetDryContact { id: String, closed: bool },
    SetDryContactSettings(DryContactSettings),
    SetGeneratorMode(GeneratorMode),
}
