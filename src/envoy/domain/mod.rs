pub mod device_data;
pub mod ensemble;
pub mod home;
pub mod info;
pub mod inventory;
pub mod live_data;
pub mod meters;
pub mod production;
pub mod settings;
