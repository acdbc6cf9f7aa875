mod client;
pub mod domain;
pub mod endpoints;
mod error;
pub mod map_device_data;
pub mod map_ensemble;
pub mod map_home;
pub mod map_info;
pub mod map_inventory;
pub mod map_live_data;
pub mod map_meters;
pub mod map_production;
pub mod map_settings;

pub use client::{Access, EnvoyClient, new_client};
pub use error::EnvoyError;
