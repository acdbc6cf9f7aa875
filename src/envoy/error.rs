use crate::auth::AuthError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvoyError {
    #[error("request to {path} failed: {source}")]
    Transport { path: String, source: reqwest::Error },
    #[error("request to {path} was unauthorized")]
    Unauthorized { path: String },
    #[error("{path} is not supported by this gateway")]
    Unsupported { path: String },
    #[error("request to {path} returned HTTP {status}")]
    Status { path: String, status: StatusCode },
    #[error("could not parse the response of {path}: {message}")]
    Parse { path: String, message: String },
    #[error("authentication for {path} failed: {source}")]
    Auth { path: String, source: AuthError },
}

impl EnvoyError {
    pub fn parse(path: &str, message: impl ToString) -> Self {
        EnvoyError::Parse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Errors that mean this firmware does not offer the endpoint, or not to us.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            EnvoyError::Unsupported { .. }
                | EnvoyError::Auth {
                    source: AuthError::DigestRejected(_) | AuthError::MissingChallenge,
                    ..
                }
        ) || matches!(self, EnvoyError::Status { status, .. } if *status == StatusCode::FORBIDDEN || *status == StatusCode::METHOD_NOT_ALLOWED)
    }
}
