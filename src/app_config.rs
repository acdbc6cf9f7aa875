use crate::domain::Category;
use config::{Config, ConfigError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    envoy: Envoy,
    enlighten: Enlighten,
    #[serde(default)]
    polling: Polling,
    #[serde(default)]
    energy: EnergyOffsets,
    #[serde(default)]
    mirror: Mirror,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::with_prefix("ENVOY_BRIDGE").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn envoy(&self) -> &Envoy {
        &self.envoy
    }

    pub fn enlighten(&self) -> &Enlighten {
        &self.enlighten
    }

    pub fn polling(&self) -> &Polling {
        &self.polling
    }

    pub fn energy_offsets(&self) -> &EnergyOffsets {
        &self.energy
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Categories this instance polls; meter-only mode polls a subset.
    pub fn enabled_categories(&self) -> &'static [Category] {
        if self.envoy.energy_meter_only() {
            &Category::METER_ONLY
        } else {
            &Category::ALL
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    notification_buffer_size: usize,
    data_directory: PathBuf,
}

impl Core {
    pub fn notification_buffer_size(&self) -> usize {
        self.notification_buffer_size
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }
}

#[derive(Debug, Deserialize)]
pub struct Envoy {
    url: String,
    password: Option<SecretString>,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    request_timeout: Duration,
    #[serde(default = "default_firmware_production_threshold")]
    firmware_production_threshold: u32,
    #[serde(default)]
    energy_meter_only: bool,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_firmware_production_threshold() -> u32 {
    824
}

impl Envoy {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// From this firmware code on, production comes from the pdm endpoints.
    pub fn firmware_production_threshold(&self) -> u32 {
        self.firmware_production_threshold
    }

    pub fn energy_meter_only(&self) -> bool {
        self.energy_meter_only
    }
}

#[derive(Debug, Deserialize)]
pub struct Enlighten {
    user: String,
    password: SecretString,
    #[serde(default = "default_login_url")]
    login_url: String,
    #[serde(default = "default_token_url")]
    token_url: String,
    #[serde(with = "humantime_serde", default = "default_token_request_backoff")]
    token_request_backoff: Duration,
}

fn default_login_url() -> String {
    "https://enlighten.enphaseenergy.com/login/login.json".to_string()
}

fn default_token_url() -> String {
    "https://entrez.enphaseenergy.com/tokens".to_string()
}

fn default_token_request_backoff() -> Duration {
    Duration::from_secs(30)
}

impl Enlighten {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn token_request_backoff(&self) -> Duration {
        self.token_request_backoff
    }
}

#[derive(Debug, Deserialize)]
pub struct Polling {
    #[serde(with = "humantime_serde", default = "default_home")]
    home: Duration,
    #[serde(with = "humantime_serde", default = "default_inventory")]
    inventory: Duration,
    #[serde(with = "humantime_serde", default)]
    device_data: Option<Duration>,
    #[serde(with = "humantime_serde", default = "default_production")]
    production: Duration,
    #[serde(with = "humantime_serde", default = "default_ensemble")]
    ensemble: Duration,
    #[serde(with = "humantime_serde", default = "default_live_data")]
    live_data: Duration,
    #[serde(with = "humantime_serde", default = "default_settings")]
    settings: Duration,
}

fn default_home() -> Duration {
    Duration::from_secs(300)
}

fn default_inventory() -> Duration {
    Duration::from_secs(120)
}

fn default_production() -> Duration {
    Duration::from_secs(10)
}

fn default_ensemble() -> Duration {
    Duration::from_secs(15)
}

fn default_live_data() -> Duration {
    Duration::from_secs(5)
}

fn default_settings() -> Duration {
    Duration::from_secs(120)
}

impl Default for Polling {
    fn default() -> Self {
        Polling {
            home: default_home(),
            inventory: default_inventory(),
            device_data: None,
            production: default_production(),
            ensemble: default_ensemble(),
            live_data: default_live_data(),
            settings: default_settings(),
        }
    }
}

impl Polling {
    pub fn period(&self, category: Category) -> Duration {
        match category {
            Category::Home => self.home,
            Category::Inventory => self.inventory,
            Category::Production => self.production,
            Category::DeviceData => self.device_data.unwrap_or(self.production),
            Category::Ensemble => self.ensemble,
            Category::LiveData => self.live_data,
            Category::Settings => self.settings,
        }
    }
}

/// Added to the lifetime energy figures, for installations whose meter was replaced.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EnergyOffsets {
    #[serde(rename = "production_offset_kwh", default)]
    pub production_kwh: f64,
    #[serde(rename = "consumption_net_offset_kwh", default)]
    pub consumption_net_kwh: f64,
    #[serde(rename = "consumption_total_offset_kwh", default)]
    pub consumption_total_kwh: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Mirror {
    #[serde(default)]
    restful: bool,
    #[serde(default)]
    mqtt: bool,
}

impl Mirror {
    pub fn restful(&self) -> bool {
        self.restful
    }

    pub fn mqtt(&self) -> bool {
        self.mqtt
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core {
                    notification_buffer_size: 64,
                    data_directory: std::env::temp_dir(),
                },
                envoy: Envoy {
                    url: "https://envoy.local".to_string(),
                    password: None,
                    request_timeout: Duration::from_secs(5),
                    firmware_production_threshold: default_firmware_production_threshold(),
                    energy_meter_only: false,
                },
                enlighten: Enlighten {
                    user: "owner@example.com".to_string(),
                    password: SecretString::from("hunter2"),
                    login_url: "https://enlighten.local/login/login.json".to_string(),
                    token_url: "https://entrez.local/tokens".to_string(),
                    token_request_backoff: Duration::ZERO,
                },
                polling: Polling::default(),
                energy: EnergyOffsets::default(),
                mirror: Mirror::default(),
            },
        }
    }

    pub fn envoy_url(mut self, url: String) -> Self {
        self.config.envoy.url = url;
        self
    }

    pub fn data_directory(mut self, directory: &Path) -> Self {
        self.config.core.data_directory = directory.to_path_buf();
        self
    }

    pub fn energy_meter_only(mut self) -> Self {
        self.config.envoy.energy_meter_only = true;
        self
    }

    pub fn mirror(mut self, restful: bool, mqtt: bool) -> Self {
        self.config.mirror = Mirror { restful, mqtt };
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
