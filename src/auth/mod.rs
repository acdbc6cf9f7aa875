mod credential;
mod digest;
mod enlighten;
mod installer_password;
mod token;

pub use credential::{BearerToken, Credential, TokenPayload};
pub use digest::{DigestAuth, DigestRole};
pub use enlighten::{EnlightenIssuer, TokenIssuer};
#[cfg(test)]
pub use enlighten::StaticIssuer;
pub use installer_password::installer_password;
pub use token::{TokenCheck, TokenManager, TokenState};
#[cfg(test)]
pub use token::CHECK_JWT_PATH;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("digest challenge is missing or malformed")]
    MissingChallenge,
    #[error("digest credentials of the {0} user were rejected")]
    DigestRejected(String),
    #[error("request body cannot be replayed for digest authentication")]
    NotReplayable,
    #[error("envoy password must be 6 characters, got {0}")]
    InvalidEnvoyPassword(usize),
    #[error("token issuer failed: {0}")]
    Issuer(String),
    #[error("token issuer returned HTTP {0}")]
    IssuerStatus(StatusCode),
    #[error("invalid token payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("token rejected by the gateway: {0}")]
    TokenRejected(String),
}
