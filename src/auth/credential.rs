use crate::auth::{DigestAuth, DigestRole, TokenManager, TokenState};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Installer tokens are issued for exactly twelve hours.
pub const INSTALLER_TOKEN_LIFETIME_SECS: i64 = 43_200;

/// Tokens this close to expiry are treated as absent.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token payload as issued by the cloud and persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
    pub generation_time: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct BearerToken {
    token: SecretString,
    expires_at: i64,
    installer: bool,
}

impl BearerToken {
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn is_installer_grade(&self) -> bool {
        self.installer
    }

    /// Installer tokens are always usable, other tokens until a minute before they expire.
    pub fn is_usable_at(&self, now: i64) -> bool {
        !self.token.expose_secret().is_empty() && (self.installer || self.expires_at > now + EXPIRY_MARGIN_SECS)
    }
}

impl From<TokenPayload> for BearerToken {
    fn from(payload: TokenPayload) -> Self {
        BearerToken {
            installer: payload.expires_at - payload.generation_time == INSTALLER_TOKEN_LIFETIME_SECS,
            token: SecretString::from(payload.token),
            expires_at: payload.expires_at,
        }
    }
}

/// How a gateway session authenticates.
#[derive(Debug, Default)]
pub enum Credential {
    /// Older firmware without any protected endpoint in use.
    #[default]
    None,
    BearerToken(Arc<TokenManager>),
    /// Legacy firmware, each role is set up independently and may be missing.
    Digest {
        envoy: Option<DigestAuth>,
        installer: Option<DigestAuth>,
    },
}

impl Credential {
    pub fn token_manager(&self) -> Option<&Arc<TokenManager>> {
        match self {
            Credential::BearerToken(tokens) => Some(tokens),
            _ => None,
        }
    }

    pub fn digest(&self, role: DigestRole) -> Option<&DigestAuth> {
        match (self, role) {
            (Credential::Digest { envoy, .. }, DigestRole::Envoy) => envoy.as_ref(),
            (Credential::Digest { installer, .. }, DigestRole::Installer) => installer.as_ref(),
            _ => None,
        }
    }

    /// Whether endpoints protected for `role` can be called at all.
    pub fn grants(&self, role: DigestRole) -> bool {
        match self {
            Credential::BearerToken(tokens) => role == DigestRole::Envoy || tokens.is_installer_grade(),
            _ => self.digest(role).is_some(),
        }
    }

    pub fn token_state(&self) -> TokenState {
        match self {
            Credential::BearerToken(tokens) => tokens.state(),
            _ => TokenState::NoAuthRequired,
        }
    }
}
