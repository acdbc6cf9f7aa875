mod control;
mod discovery;
mod engine;
mod refresh;

pub use engine::Engine;

use crate::auth::TokenCheck;
use crate::envoy::EnvoyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("could not read the gateway info: {0}")]
    Info(#[source] EnvoyError),
    #[error("token did not become valid ({0:?})")]
    Token(TokenCheck),
    #[error("could not read the home status: {0}")]
    Home(#[source] EnvoyError),
    #[error("could not read the inventory: {0}")]
    Inventory(#[source] EnvoyError),
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("credentials are not ready")]
    NotReady,
    #[error("{0} is not supported by this gateway")]
    Unsupported(&'static str),
    #[error("an installer-grade credential is required")]
    InstallerRequired,
    #[error("unknown dry contact '{0}'")]
    UnknownDryContact(String),
    #[error(transparent)]
    Envoy(#[from] EnvoyError),
}
