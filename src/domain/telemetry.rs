use crate::domain::measurement::{MeasurementKind, PhaseMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical, merged view of everything the gateway reports. Each refresh category writes its own
/// subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryTree {
    pub info: Info,
    pub home: Home,
    pub inventory: Inventory,
    pub pcu_power: BTreeMap<String, PcuPower>,
    pub meters: Vec<Meter>,
    pub device_details: BTreeMap<String, DeviceDetail>,
    pub power_and_energy: PowerAndEnergy,
    pub ensemble: Ensemble,
    pub grid_profile: Option<String>,
    pub plc_levels: BTreeMap<String, u8>,
    pub production_enabled: Option<bool>,
    pub live_data: Option<LiveData>,
}

impl TelemetryTree {
    pub fn meter(&self, kind: MeasurementKind) -> Option<&Meter> {
        self.meters.iter().find(|meter| meter.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub serial_number: String,
    pub model: String,
    pub software: String,
    pub firmware: u32,
    pub token_required: bool,
    pub imeter: bool,
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    pub software_build_epoch: Option<i64>,
    pub timezone: Option<String>,
    pub db_percent_full: Option<u8>,
    pub web_comm: bool,
    pub ever_reported_to_enlighten: bool,
    pub last_enlighten_report_time: Option<i64>,
    pub primary_interface: Option<String>,
    pub interfaces: Vec<NetworkInterface>,
    pub wireless_connections: Vec<WirelessConnection>,
    pub comm: CommLevels,
    pub alerts: Vec<String>,
    pub update_status: Option<String>,
    pub enpower: Option<EnpowerConnection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub kind: String,
    pub interface: String,
    pub mac: Option<String>,
    pub dhcp: bool,
    pub ip: Option<String>,
    pub signal_strength: u8,
    pub signal_strength_max: u8,
    pub carrier: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WirelessConnection {
    pub kind: String,
    pub signal_strength: u8,
    pub signal_strength_max: u8,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommCount {
    pub num: u32,
    /// 0-100
    pub level: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommLevels {
    pub total: CommCount,
    pub pcu: CommCount,
    pub acb: CommCount,
    pub nsrb: CommCount,
    pub esub: CommCount,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnpowerConnection {
    pub connected: bool,
    pub grid_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    #[serde(rename = "PCU")]
    Pcu,
    #[serde(rename = "ACB")]
    Acb,
    #[serde(rename = "NSRB")]
    Nsrb,
    #[serde(rename = "ESUB")]
    Esub,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub pcus: BTreeMap<String, InventoryDevice>,
    pub acbs: BTreeMap<String, InventoryDevice>,
    pub nsrbs: BTreeMap<String, InventoryDevice>,
    pub esubs: BTreeMap<String, InventoryDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDevice {
    pub serial_number: String,
    pub part_number: String,
    pub kind: DeviceKind,
    pub installed: Option<String>,
    pub last_report: Option<String>,
    pub admin_state: Option<i64>,
    pub device_status: Vec<String>,
    pub producing: bool,
    pub communicating: bool,
    pub provisioned: bool,
    pub operating: bool,
    pub firmware: Option<String>,
    pub gfi_clear: Option<bool>,
    pub relay: Option<String>,
    pub percent_full: Option<u8>,
    pub temperature: Option<f64>,
    pub charge_status: Option<String>,
    pub grid_profile: Option<String>,
}

impl InventoryDevice {
    pub fn is_active(&self) -> bool {
        self.producing || self.communicating || self.operating
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcuPower {
    pub last_report_date: i64,
    pub power_w: f64,
    pub power_peak_w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadingSource {
    Readings,
    Reports,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    pub eid: u64,
    pub kind: MeasurementKind,
    pub measurement: String,
    pub enabled: bool,
    pub phase_mode: PhaseMode,
    pub phase_count: u8,
    pub metering_status: String,
    pub status_flags: Vec<String>,
    pub voltage_divide: f64,
    pub power_factor_divide: f64,
    /// Set for the total-consumption entry derived from a net-consumption meter.
    pub synthesized: bool,
    pub reading: Option<MeterReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub source: ReadingSource,
    pub timestamp: Option<i64>,
    pub active_power_w: Option<f64>,
    pub apparent_power_va: Option<f64>,
    pub reactive_power_var: Option<f64>,
    pub energy_delivered_kwh: Option<f64>,
    pub energy_received_kwh: Option<f64>,
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub power_factor: Option<f64>,
    pub frequency_hz: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetail {
    pub kind: String,
    pub active: bool,
    pub reading_time: Option<i64>,
    pub power_w: f64,
    pub power_peak_w: f64,
    pub energy_today_kwh: f64,
    pub energy_yesterday_kwh: f64,
    pub energy_last_seven_days_kwh: f64,
    pub energy_lifetime_kwh: f64,
    pub ac_voltage_v: Option<f64>,
    pub ac_frequency_hz: Option<f64>,
    pub dc_voltage_v: Option<f64>,
    pub dc_current_a: Option<f64>,
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerAndEnergy {
    pub production: SourceFigures,
    pub consumption_net: Option<SourceFigures>,
    pub consumption_total: Option<SourceFigures>,
    pub storage: Option<StorageFigures>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFigures {
    pub kind: MeasurementKind,
    pub reading_time: Option<i64>,
    pub power_w: f64,
    pub power_peak_w: f64,
    pub energy_today_kwh: f64,
    pub energy_last_seven_days_kwh: f64,
    /// Includes the configured lifetime offset.
    pub energy_lifetime_kwh: f64,
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub power_factor: Option<f64>,
    pub apparent_power_va: Option<f64>,
    pub reactive_power_var: Option<f64>,
}

impl SourceFigures {
    pub fn new(kind: MeasurementKind) -> Self {
        SourceFigures {
            kind,
            reading_time: None,
            power_w: 0.0,
            power_peak_w: 0.0,
            energy_today_kwh: 0.0,
            energy_last_seven_days_kwh: 0.0,
            energy_lifetime_kwh: 0.0,
            voltage_v: None,
            current_a: None,
            power_factor: None,
            apparent_power_va: None,
            reactive_power_var: None,
        }
    }
}

impl Default for SourceFigures {
    fn default() -> Self {
        SourceFigures::new(MeasurementKind::Production)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageFigures {
    pub active_count: u32,
    pub reading_time: Option<i64>,
    pub power_w: f64,
    pub energy_kwh: f64,
    pub percent_full: Option<u8>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnsembleDeviceKind {
    Encharge,
    Enpower,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ensemble {
    pub devices: BTreeMap<String, EnsembleDevice>,
    pub relay: Option<RelayState>,
    pub encharge_settings: Option<EnchargeSettings>,
    pub storage_settings: Option<StorageSettings>,
    pub dry_contacts: Vec<DryContact>,
    pub generator: Option<Generator>,
}

impl Ensemble {
    pub fn count(&self, kind: EnsembleDeviceKind) -> usize {
        self.devices.values().filter(|device| device.kind == kind).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDevice {
    pub serial_number: String,
    pub part_number: String,
    pub kind: EnsembleDeviceKind,
    pub installed: Option<String>,
    pub device_status: Vec<String>,
    pub communicating: bool,
    pub admin_state: Option<i64>,
    pub percent_full: Option<u8>,
    pub temperature: Option<f64>,
    pub status: Option<EnsembleDeviceStatus>,
    pub power: Option<EnsembleDevicePower>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDeviceStatus {
    pub device_type: Option<String>,
    pub com_interface: Option<String>,
    pub admin_state: Option<String>,
    pub comm_level_sub_ghz: Option<u8>,
    pub comm_level_2_4_ghz: Option<u8>,
    pub temperature: Option<f64>,
    pub percent_full: Option<u8>,
    pub dc_switch_off: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDevicePower {
    pub real_power_w: f64,
    pub apparent_power_va: f64,
    pub soc: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayState {
    pub mains_admin_state: String,
    pub mains_oper_state: String,
    pub grid_connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnchargeSettings {
    pub enabled: bool,
    pub country: Option<String>,
    pub current_limit: Option<f64>,
    pub per_phase: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageProfile {
    SelfConsumption,
    Savings,
    Backup,
    EconomyMode,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    pub profile: StorageProfile,
    pub reserved_soc: f64,
    pub very_low_soc: Option<f64>,
    pub charge_from_grid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryContact {
    pub id: String,
    pub status: String,
    pub settings: Option<DryContactSettings>,
}

#[cfg(test)]
impl DryContact {
    pub fn is_closed(&self) -> bool {
        self.status == "closed"
    }
}

/// Settings block of a dry contact, sent back to the gateway as-is when changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DryContactSettings {
    pub id: String,
    #[serde(rename = "type", default)]
    pub contact_type: Option<String>,
    #[serde(default)]
    pub load_name: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub grid_action: Option<String>,
    #[serde(default)]
    pub micro_grid_action: Option<String>,
    #[serde(default)]
    pub gen_action: Option<String>,
    #[serde(default)]
    pub soc_low: Option<f64>,
    #[serde(default)]
    pub soc_high: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    On,
    Off,
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub admin_state: Option<String>,
    pub oper_state: Option<String>,
    pub admin_mode: Option<String>,
    pub rated_power_w: Option<f64>,
    pub settings: Option<GeneratorSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSettings {
    pub max_continuous_power_w: Option<f64>,
    pub nominal_voltage_v: Option<f64>,
    pub nominal_frequency_hz: Option<f64>,
    pub auto_start: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveData {
    pub stream_enabled: bool,
    pub last_update: Option<i64>,
    pub split_phase: bool,
    pub phase_count: u8,
    pub main_relay_state: Option<u8>,
    pub gen_relay_state: Option<u8>,
    pub backup_battery_mode: Option<String>,
    pub backup_soc: Option<u8>,
    pub encharge_soc: Option<u8>,
    pub encharge_energy_wh: Option<f64>,
    pub acb_soc: Option<u8>,
    pub acb_energy_wh: Option<f64>,
    pub sources: BTreeMap<String, LiveSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSource {
    pub power_w: f64,
    pub apparent_power_va: f64,
    pub phase_power_w: Vec<f64>,
}
