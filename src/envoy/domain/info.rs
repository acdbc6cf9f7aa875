use serde::Deserialize;

// `/info` is the only XML endpoint.
#[derive(Debug, Deserialize)]
pub struct InfoGet {
    pub time: Option<i64>,
    pub device: InfoDevice,
    #[serde(rename = "web-tokens", default)]
    pub web_tokens: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct InfoDevice {
    pub sn: String,
    #[serde(default)]
    pub pn: String,
    #[serde(default)]
    pub software: String,
    #[serde(default)]
    pub imeter: Option<bool>,
}
