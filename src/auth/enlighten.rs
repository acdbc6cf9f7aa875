use crate::auth::{AuthError, TokenPayload};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Debug;
use tracing::{info, instrument};

/// Exchanges account credentials and a gateway serial number for a token.
#[async_trait]
pub trait TokenIssuer: Debug + Send + Sync {
    async fn issue(&self, serial_number: &str) -> Result<TokenPayload, AuthError>;
}

#[derive(Debug)]
pub struct EnlightenIssuer {
    client: Client,
    login_url: String,
    token_url: String,
    user: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_id: Option<String>,
    message: Option<String>,
}

impl EnlightenIssuer {
    pub fn new(client: Client, login_url: String, token_url: String, user: String, password: SecretString) -> Self {
        EnlightenIssuer {
            client,
            login_url,
            token_url,
            user,
            password,
        }
    }
}

#[async_trait]
impl TokenIssuer for EnlightenIssuer {
    #[instrument(skip(self))]
    async fn issue(&self, serial_number: &str) -> Result<TokenPayload, AuthError> {
        info!("☁️ Requesting token from Enlighten...");
        let response = self
            .client
            .post(&self.login_url)
            .form(&[("user[email]", self.user.as_str()), ("user[password]", self.password.expose_secret())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::IssuerStatus(response.status()));
        }

        let login = response.json::<LoginResponse>().await?;
        let session_id = login.session_id.ok_or_else(|| {
            AuthError::Issuer(login.message.unwrap_or_else(|| "login did not return a session".to_string()))
        })?;

        let response = self
            .client
            .post(&self.token_url)
            .json(&json!({
                "session_id": session_id,
                "serial_num": serial_number,
                "username": self.user,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::IssuerStatus(response.status()));
        }

        let payload = serde_json::from_str::<TokenPayload>(&response.text().await?)?;
        info!(expires_at = payload.expires_at, "☁️ Requesting token from Enlighten... OK");
        Ok(payload)
    }
}

/// Issuer answering every request with the same payload, or failing when it has none.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticIssuer {
    calls: std::sync::atomic::AtomicUsize,
    payload: Option<TokenPayload>,
}

#[cfg(test)]
impl StaticIssuer {
    pub fn issuing(payload: TokenPayload) -> Self {
        StaticIssuer {
            calls: Default::default(),
            payload: Some(payload),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue(&self, _serial_number: &str) -> Result<TokenPayload, AuthError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.payload.clone().ok_or(AuthError::Issuer("offline".to_string()))
    }
}
