use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct GridProfileGet {
    pub selected_profile: Option<String>,
}

/// PLC level per inverter serial number, 0-5.
pub type PlcLevelGet = BTreeMap<String, u8>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerModeGet {
    pub power_forced_off: bool,
}
