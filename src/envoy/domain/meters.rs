use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterGet {
    pub eid: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub measurement_type: String,
    #[serde(default)]
    pub phase_mode: String,
    #[serde(default)]
    pub phase_count: u8,
    #[serde(default)]
    pub metering_status: String,
    #[serde(default)]
    pub status_flags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReadingGet {
    pub eid: u64,
    pub timestamp: Option<i64>,
    pub act_energy_dlvd: Option<f64>,
    pub act_energy_rcvd: Option<f64>,
    pub active_power: Option<f64>,
    pub apparent_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub pwr_factor: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub freq: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReportGet {
    pub created_at: Option<i64>,
    #[serde(default)]
    pub report_type: String,
    pub cumulative: MeterCumulativeGet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterCumulativeGet {
    pub curr_w: Option<f64>,
    pub act_power: Option<f64>,
    pub apprnt_pwr: Option<f64>,
    pub react_pwr: Option<f64>,
    pub wh_dlvd_cum: Option<f64>,
    pub wh_rcvd_cum: Option<f64>,
    pub rms_voltage: Option<f64>,
    pub rms_current: Option<f64>,
    pub pwr_factor: Option<f64>,
    pub freq_hz: Option<f64>,
}
