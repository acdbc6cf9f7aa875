use serde::Deserialize;

/// `/api/v1/production`, the legacy single feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionGet {
    pub watt_hours_today: Option<f64>,
    pub watt_hours_seven_days: Option<f64>,
    pub watt_hours_lifetime: Option<f64>,
    pub watts_now: Option<f64>,
}

/// `/ivp/pdm/production`, instantaneous production per source.
#[derive(Debug, Default, Deserialize)]
pub struct ProductionPdmGet {
    pub pcu: Option<PdmSource>,
    pub rgm: Option<PdmSource>,
    pub eim: Option<PdmSource>,
}

/// `/ivp/pdm/energy`, accumulated production and consumption per source.
#[derive(Debug, Default, Deserialize)]
pub struct EnergyPdmGet {
    #[serde(default)]
    pub production: ProductionPdmGet,
    #[serde(default)]
    pub consumption: ProductionPdmGet,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdmSource {
    pub watts_now: Option<f64>,
    pub watt_hours_today: Option<f64>,
    pub watt_hours_seven_days: Option<f64>,
    pub watt_hours_lifetime: Option<f64>,
    pub reading_time: Option<i64>,
}

impl ProductionPdmGet {
    /// Revenue-grade meter first, then the integrated meter, then the inverters.
    pub fn best(&self) -> Option<PdmSource> {
        self.rgm.or(self.eim).or(self.pcu)
    }
}

/// `/production.json?details=1`
#[derive(Debug, Default, Deserialize)]
pub struct ProductionStatisticsGet {
    #[serde(default)]
    pub production: Vec<StatisticsEntry>,
    #[serde(default)]
    pub consumption: Vec<StatisticsEntry>,
    #[serde(default)]
    pub storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub measurement_type: Option<String>,
    pub reading_time: Option<i64>,
    #[serde(flatten)]
    pub values: StatisticsValues,
    #[serde(default)]
    pub lines: Vec<StatisticsValues>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsValues {
    pub w_now: Option<f64>,
    pub wh_lifetime: Option<f64>,
    pub wh_today: Option<f64>,
    pub wh_last_seven_days: Option<f64>,
    pub rms_current: Option<f64>,
    pub rms_voltage: Option<f64>,
    pub pwr_factor: Option<f64>,
    pub react_pwr: Option<f64>,
    pub apprnt_pwr: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub active_count: u32,
    pub reading_time: Option<i64>,
    pub w_now: Option<f64>,
    pub wh_now: Option<f64>,
    pub state: Option<String>,
    pub percent_full: Option<u8>,
}
