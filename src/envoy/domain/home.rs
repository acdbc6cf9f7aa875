use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HomeGet {
    pub software_build_epoch: Option<i64>,
    pub timezone: Option<String>,
    pub db_percent_full: Option<String>,
    #[serde(default)]
    pub network: HomeNetwork,
    #[serde(default)]
    pub comm: HomeComm,
    #[serde(default)]
    pub alerts: Vec<HomeAlert>,
    pub update_status: Option<String>,
    #[serde(default)]
    pub wireless_connection: Vec<HomeWireless>,
    pub enpower: Option<HomeEnpower>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeNetwork {
    #[serde(default)]
    pub web_comm: bool,
    #[serde(default)]
    pub ever_reported_to_enlighten: bool,
    pub last_enlighten_report_time: Option<i64>,
    pub primary_interface: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<HomeInterface>,
}

#[derive(Debug, Deserialize)]
pub struct HomeInterface {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub interface: String,
    pub mac: Option<String>,
    #[serde(default)]
    pub dhcp: bool,
    pub ip: Option<String>,
    #[serde(default)]
    pub signal_strength: u8,
    #[serde(default)]
    pub signal_strength_max: u8,
    #[serde(default)]
    pub carrier: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeComm {
    #[serde(default)]
    pub num: u32,
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub pcu: HomeCommCount,
    #[serde(default)]
    pub acb: HomeCommCount,
    #[serde(default)]
    pub nsrb: HomeCommCount,
    #[serde(default)]
    pub esub: HomeCommCount,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeCommCount {
    #[serde(default)]
    pub num: u32,
    /// 0-5
    #[serde(default)]
    pub level: u8,
}

#[derive(Debug, Deserialize)]
pub struct HomeAlert {
    pub msg_key: String,
}

#[derive(Debug, Deserialize)]
pub struct HomeWireless {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub signal_strength: u8,
    #[serde(default)]
    pub signal_strength_max: u8,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct HomeEnpower {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub grid_status: String,
}
