use crate::domain::telemetry::{DryContactSettings, StorageProfile};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct EnsembleGroup {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub devices: Vec<EnsembleDeviceGet>,
}

#[derive(Debug, Deserialize)]
pub struct EnsembleDeviceGet {
    pub serial_num: String,
    #[serde(default)]
    pub part_num: String,
    pub installed: Option<String>,
    #[serde(default)]
    pub device_status: Vec<String>,
    #[serde(default)]
    pub communicating: bool,
    pub admin_state: Option<i64>,
    #[serde(rename = "percentFull")]
    pub percent_full: Option<u8>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct EnsembleStatusGet {
    #[serde(default)]
    pub inventory: EnsembleStatusInventory,
    pub relay: Option<RelayGet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnsembleStatusInventory {
    #[serde(default)]
    pub serial_nums: BTreeMap<String, SerialStatusGet>,
}

#[derive(Debug, Deserialize)]
pub struct SerialStatusGet {
    pub device_type: Option<String>,
    pub comm_interface: Option<String>,
    pub admin_state: Option<String>,
    pub comm_level_sub_ghz: Option<u8>,
    pub comm_level_2_4_ghz: Option<u8>,
    pub reported_temperature: Option<f64>,
    #[serde(rename = "percentFull")]
    pub percent_full: Option<u8>,
    pub dc_switch_off: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RelayGet {
    #[serde(default)]
    pub mains_admin_state: String,
    #[serde(default)]
    pub mains_oper_state: String,
}

#[derive(Debug, Deserialize)]
pub struct EnsemblePowerGet {
    // Some firmware spells the key with a trailing colon.
    #[serde(alias = "devices:", default)]
    pub devices: Vec<EnsemblePowerDevice>,
}

#[derive(Debug, Deserialize)]
pub struct EnsemblePowerDevice {
    pub serial_num: String,
    #[serde(default)]
    pub real_power_mw: f64,
    #[serde(default)]
    pub apparent_power_mva: f64,
    pub soc: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct EnchargeSettingsGet {
    pub enc_settings: EnchargeSettingsBody,
}

#[derive(Debug, Deserialize)]
pub struct EnchargeSettingsBody {
    #[serde(default)]
    pub enable: bool,
    pub country: Option<String>,
    pub current_limit: Option<f64>,
    #[serde(default)]
    pub per_phase: bool,
}

#[derive(Debug, Deserialize)]
pub struct TariffGet {
    pub tariff: TariffBody,
}

#[derive(Debug, Deserialize)]
pub struct TariffBody {
    pub storage_settings: Option<StorageSettingsGet>,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettingsGet {
    pub mode: StorageProfile,
    #[serde(default)]
    pub reserved_soc: f64,
    pub very_low_soc: Option<f64>,
    #[serde(default)]
    pub charge_from_grid: bool,
}

#[derive(Debug, Deserialize)]
pub struct DryContactsGet {
    #[serde(default)]
    pub dry_contacts: Vec<DryContactGet>,
}

#[derive(Debug, Deserialize)]
pub struct DryContactGet {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DryContactSettingsGet {
    #[serde(default)]
    pub dry_contacts: Vec<DryContactSettings>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratorGet {
    pub admin_state: Option<String>,
    pub oper_state: Option<String>,
    pub admin_mode: Option<String>,
    pub rated_power: Option<f64>,
    /// Absent on firmware that always reports a generator block.
    pub present: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratorSettingsGet {
    pub max_cont_power: Option<f64>,
    pub nominal_voltage: Option<f64>,
    pub nominal_frequency: Option<f64>,
    #[serde(default)]
    pub auto_gen_start: bool,
}
