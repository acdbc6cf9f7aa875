use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LiveDataGet {
    #[serde(default)]
    pub connection: LiveConnection,
    #[serde(default)]
    pub meters: LiveMeters,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveConnection {
    #[serde(default)]
    pub sc_stream: String,
}

impl LiveConnection {
    pub fn is_streaming(&self) -> bool {
        self.sc_stream == "enabled"
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveMeters {
    pub last_update: Option<i64>,
    #[serde(default)]
    pub is_split_phase: u8,
    #[serde(default)]
    pub phase_count: u8,
    pub main_relay_state: Option<u8>,
    pub gen_relay_state: Option<u8>,
    pub backup_bat_mode: Option<String>,
    pub backup_soc: Option<u8>,
    pub enc_agg_soc: Option<u8>,
    pub enc_agg_energy: Option<f64>,
    pub acb_agg_soc: Option<u8>,
    pub acb_agg_energy: Option<f64>,
    pub pv: Option<LiveSourceGet>,
    pub storage: Option<LiveSourceGet>,
    pub grid: Option<LiveSourceGet>,
    pub load: Option<LiveSourceGet>,
    pub generator: Option<LiveSourceGet>,
}

impl LiveMeters {
    pub fn sources(&self) -> [(&'static str, Option<&LiveSourceGet>); 5] {
        [
            ("pv", self.pv.as_ref()),
            ("storage", self.storage.as_ref()),
            ("grid", self.grid.as_ref()),
            ("load", self.load.as_ref()),
            ("generator", self.generator.as_ref()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveSourceGet {
    #[serde(default)]
    pub agg_p_mw: f64,
    #[serde(default)]
    pub agg_s_mva: f64,
    pub agg_p_ph_a_mw: Option<f64>,
    pub agg_p_ph_b_mw: Option<f64>,
    pub agg_p_ph_c_mw: Option<f64>,
}
