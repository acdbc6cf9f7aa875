pub const INFO: &str = "/info";
pub const HOME: &str = "/home.json";
pub const INVENTORY: &str = "/inventory.json?deleted=1";
pub const PCU_POWER: &str = "/api/v1/production/inverters";
pub const METERS: &str = "/ivp/meters";
pub const METER_READINGS: &str = "/ivp/meters/readings";
pub const METER_REPORTS: &str = "/ivp/meters/reports";
pub const DEVICE_DATA: &str = "/ivp/pdm/device_data";
pub const PRODUCTION: &str = "/api/v1/production";
pub const PRODUCTION_PDM: &str = "/ivp/pdm/production";
pub const ENERGY_PDM: &str = "/ivp/pdm/energy";
pub const PRODUCTION_STATISTICS: &str = "/production.json?details=1";
pub const ENSEMBLE_INVENTORY: &str = "/ivp/ensemble/inventory";
pub const ENSEMBLE_STATUS: &str = "/ivp/ensemble/status";
pub const ENSEMBLE_POWER: &str = "/ivp/ensemble/power";
pub const ENSEMBLE_RELAY: &str = "/ivp/ensemble/relay";
pub const ENCHARGE_SETTINGS: &str = "/ivp/ss/enc_settings";
pub const TARIFF: &str = "/admin/lib/tariff";
pub const DRY_CONTACTS: &str = "/ivp/ensemble/dry_contacts";
pub const DRY_CONTACT_SETTINGS: &str = "/ivp/ss/dry_contact_settings";
pub const GENERATOR: &str = "/ivp/ss/generator";
pub const GENERATOR_SETTINGS: &str = "/ivp/ss/gen_config";
pub const GENERATOR_MODE: &str = "/ivp/ss/gen_mode";
pub const GRID_PROFILE: &str = "/installer/agf/index.json?simplified=true";
pub const PLC_LEVEL: &str = "/installer/pcu_comm_check";
pub const BACKBONE_APPLICATION: &str = "/backbone/application.js";
pub const LIVE_DATA_STATUS: &str = "/ivp/livedata/status";
pub const LIVE_DATA_STREAM: &str = "/ivp/livedata/stream";

pub fn power_mode(device_id: &str) -> String {
    format!("/ivp/mod/{}/mode/power", device_id)
}
