use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct InventoryGroup {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub devices: Vec<InventoryDeviceGet>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryDeviceGet {
    pub serial_num: String,
    #[serde(default)]
    pub part_num: String,
    pub installed: Option<String>,
    pub last_rpt_date: Option<String>,
    pub admin_state: Option<i64>,
    #[serde(default)]
    pub device_status: Vec<String>,
    #[serde(default)]
    pub producing: bool,
    #[serde(default)]
    pub communicating: bool,
    #[serde(default)]
    pub provisioned: bool,
    #[serde(default)]
    pub operating: bool,
    pub img_pnum_running: Option<String>,
    #[serde(default)]
    pub device_control: Vec<DeviceControl>,
    pub relay: Option<String>,
    #[serde(rename = "percentFull")]
    pub percent_full: Option<u8>,
    pub temperature: Option<f64>,
    pub charge_status: Option<String>,
    /// Set on deleted devices when queried with `deleted=1`.
    #[serde(default)]
    pub deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceControl {
    pub gficlearset: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcuPowerGet {
    pub serial_number: String,
    #[serde(default)]
    pub last_report_date: i64,
    pub last_report_watts: Option<f64>,
    pub max_report_watts: Option<f64>,
}
