use serde::Deserialize;

/// One entry of `/ivp/pdm/device_data`. The feed is a map keyed by an internal id that also carries
/// bookkeeping keys, so entries are parsed one by one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDataEntry {
    pub dev_name: String,
    pub sn: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub channels: Vec<DeviceChannel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChannel {
    #[serde(default)]
    pub watts: ChannelWatts,
    #[serde(default)]
    pub watt_hours: ChannelWattHours,
    pub last_reading: Option<ChannelReading>,
    pub lifetime: Option<ChannelLifetime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelWatts {
    pub now: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelWattHours {
    pub today: Option<f64>,
    pub yesterday: Option<f64>,
    pub week: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReading {
    pub end_date: Option<i64>,
    #[serde(rename = "acVoltageINmV")]
    pub ac_voltage_mv: Option<f64>,
    #[serde(rename = "acFrequencyINmHz")]
    pub ac_frequency_mhz: Option<f64>,
    #[serde(rename = "dcVoltageINmV")]
    pub dc_voltage_mv: Option<f64>,
    #[serde(rename = "dcCurrentINmA")]
    pub dc_current_ma: Option<f64>,
    pub channel_temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLifetime {
    pub joules_produced: Option<f64>,
}
