use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A refresh category. Each one owns a disjoint part of the telemetry tree, has its own polling
/// period and its own entry in the lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Home,
    Inventory,
    Production,
    DeviceData,
    Ensemble,
    LiveData,
    Settings,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Home,
        Category::Inventory,
        Category::Production,
        Category::DeviceData,
        Category::Ensemble,
        Category::LiveData,
        Category::Settings,
    ];

    /// Categories polled when the gateway is only used as an energy meter.
    pub const METER_ONLY: [Category; 3] = [Category::Home, Category::Production, Category::LiveData];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Home => "home",
            Category::Inventory => "inventory",
            Category::Production => "production",
            Category::DeviceData => "deviceData",
            Category::Ensemble => "ensemble",
            Category::LiveData => "liveData",
            Category::Settings => "settings",
        }
    }

    /// Path used for the REST mirror.
    pub fn rest_path(&self) -> &'static str {
        match self {
            Category::Home => "home",
            Category::Inventory => "inventory",
            Category::Production => "powerandenergy",
            Category::DeviceData => "detaileddevices",
            Category::Ensemble => "ensemble",
            Category::LiveData => "livedata",
            Category::Settings => "gridprofile",
        }
    }

    /// Label used for the MQTT publisher.
    pub fn mqtt_label(&self) -> &'static str {
        match self {
            Category::Home => "Home",
            Category::Inventory => "Inventory",
            Category::Production => "Power And Energy",
            Category::DeviceData => "Detailed Devices",
            Category::Ensemble => "Ensemble",
            Category::LiveData => "Live Data",
            Category::Settings => "Grid Profile",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
