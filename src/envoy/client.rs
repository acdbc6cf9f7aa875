use crate::auth::{AuthError, Credential, DigestRole};
use crate::envoy::EnvoyError;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Gateways use self-signed certificates and drop idle connections, so certificates are not
/// verified and connections are never reused.
pub fn new_client(timeout: Duration) -> Result<Client, EnvoyClientError> {
    let client = Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()?;
    Ok(client)
}

#[derive(Error, Debug)]
pub enum EnvoyClientError {
    #[error("request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

/// Who may call an endpoint. With a token every request goes through the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Open,
    /// The digest role on legacy firmware, any token otherwise.
    Digest(DigestRole),
    /// The installer digest on legacy firmware, an installer-grade token otherwise.
    Installer,
}

impl Access {
    fn role(&self) -> Option<DigestRole> {
        match self {
            Access::Open => None,
            Access::Digest(role) => Some(*role),
            Access::Installer => Some(DigestRole::Installer),
        }
    }
}

#[derive(Debug)]
pub struct EnvoyClient {
    http: Client,
    base_url: String,
    credential: RwLock<Arc<Credential>>,
}

impl EnvoyClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        EnvoyClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: RwLock::new(Arc::new(Credential::None)),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> Arc<Credential> {
        self.credential.read().expect("credential lock poisoned").clone()
    }

    pub fn set_credential(&self, credential: Credential) {
        *self.credential.write().expect("credential lock poisoned") = Arc::new(credential);
    }

    pub fn grants(&self, access: Access) -> bool {
        grants(&self.credential(), access)
    }

    pub async fn send(&self, method: Method, path: &str, access: Access, body: Option<&Value>) -> Result<Response, EnvoyError> {
        let credential = self.credential();
        if !grants(&credential, access) {
            return Err(EnvoyError::Unsupported { path: path.to_string() });
        }

        debug!("{} {}", method, path);
        let mut builder = self.http.request(method.clone(), format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let transport = |source| EnvoyError::Transport {
            path: path.to_string(),
            source,
        };
        let response = match (credential.as_ref(), access.role()) {
            (Credential::BearerToken(tokens), _) => tokens.apply(builder).send().await.map_err(transport)?,
            (_, None) => builder.send().await.map_err(transport)?,
            (credential, Some(role)) => {
                let digest = credential
                    .digest(role)
                    .ok_or_else(|| EnvoyError::Unsupported { path: path.to_string() })?;
                digest.send(builder, method.as_str(), path).await.map_err(|source| match source {
                    AuthError::RequestError(source) => transport(source),
                    source => EnvoyError::Auth {
                        path: path.to_string(),
                        source,
                    },
                })?
            }
        };

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                if let Some(tokens) = credential.token_manager() {
                    tokens.invalidate();
                }
                Err(EnvoyError::Unauthorized { path: path.to_string() })
            }
            StatusCode::NOT_FOUND => Err(EnvoyError::Unsupported { path: path.to_string() }),
            status if !status.is_success() => Err(EnvoyError::Status {
                path: path.to_string(),
                status,
            }),
            _ => Ok(response),
        }
    }

    pub async fn text(&self, method: Method, path: &str, access: Access, body: Option<&Value>) -> Result<String, EnvoyError> {
        let response = self.send(method, path, access, body).await?;
        response.text().await.map_err(|source| EnvoyError::Transport {
            path: path.to_string(),
            source,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(&self, method: Method, path: &str, access: Access, body: Option<&Value>) -> Result<T, EnvoyError> {
        let body = self.text(method, path, access, body).await?;
        trace!(path, body = %body, "Received response");
        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            EnvoyError::parse(path, format!("{} (body preview: {:?})", e, preview))
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, access: Access) -> Result<T, EnvoyError> {
        self.request_json(Method::GET, path, access, None).await
    }

    pub async fn get_xml<T: DeserializeOwned>(&self, path: &str) -> Result<T, EnvoyError> {
        let body = self.text(Method::GET, path, Access::Open, None).await?;
        quick_xml::de::from_str::<T>(&body).map_err(|e| EnvoyError::parse(path, e))
    }

    /// For writes whose response body carries nothing we need.
    pub async fn write_json(&self, method: Method, path: &str, access: Access, body: &Value) -> Result<(), EnvoyError> {
        self.send(method, path, access, Some(body)).await.map(|_| ())
    }
}

fn grants(credential: &Credential, access: Access) -> bool {
    match (credential, access) {
        (_, Access::Open) => true,
        (Credential::BearerToken(_), Access::Digest(_)) => true,
        (credential, access) => access.role().is_some_and(|role| credential.grants(role)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DigestAuth, StaticIssuer, TokenCheck, TokenManager, TokenPayload};
    use chrono::Utc;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Level {
        level: u8,
    }

    async fn client(server: &mockito::ServerGuard) -> EnvoyClient {
        EnvoyClient::new(new_client(Duration::from_secs(5)).unwrap(), server.url())
    }

    #[tokio::test]
    async fn get_json_parses_the_body() -> Result<(), EnvoyError> {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/home.json").with_body(r#"{"level":5}"#).create_async().await;

        let level: Level = client(&server).await.get_json("/home.json", Access::Open).await?;

        assert_eq!(level, Level { level: 5 });
        Ok(())
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing").with_status(404).create_async().await;
        server.mock("GET", "/broken").with_status(500).create_async().await;
        server.mock("GET", "/garbage").with_body("<html>").create_async().await;
        let client = client(&server).await;

        let missing = client.get_json::<Level>("/missing", Access::Open).await;
        let broken = client.get_json::<Level>("/broken", Access::Open).await;
        let garbage = client.get_json::<Level>("/garbage", Access::Open).await;

        assert!(matches!(missing, Err(ref e) if e.is_unsupported()));
        assert!(matches!(broken, Err(EnvoyError::Status { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert!(matches!(garbage, Err(EnvoyError::Parse { .. })));
    }

    #[tokio::test]
    async fn protected_endpoints_without_credentials_are_unsupported() {
        let mut server = mockito::Server::new_async().await;
        let never_called = server.mock("GET", "/installer/pcu_comm_check").expect(0).create_async().await;

        let result = client(&server)
            .await
            .get_json::<Level>("/installer/pcu_comm_check", Access::Installer)
            .await;

        never_called.assert_async().await;
        assert!(matches!(result, Err(EnvoyError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn protected_endpoints_use_the_digest_role() -> Result<(), EnvoyError> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/production/inverters")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .with_header("www-authenticate", r#"Digest realm="enphaseenergy.com", qop="auth", nonce="n1""#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/production/inverters")
            .match_header("authorization", mockito::Matcher::Regex("username=\"envoy\"".to_string()))
            .with_body(r#"{"level":3}"#)
            .create_async()
            .await;
        let client = client(&server).await;
        client.set_credential(Credential::Digest {
            envoy: DigestAuth::envoy("122012345678", None).ok(),
            installer: None,
        });

        let level: Level = client.get_json("/api/v1/production/inverters", Access::Digest(DigestRole::Envoy)).await?;

        assert_eq!(level, Level { level: 3 });
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_response_invalidates_the_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", crate::auth::CHECK_JWT_PATH)
            .with_header("set-cookie", "sessionId=abc123; Path=/")
            .with_body("Valid token.")
            .create_async()
            .await;
        server
            .mock("PUT", "/ivp/livedata/stream")
            .match_header("cookie", "sessionId=abc123")
            .match_body(mockito::Matcher::Json(json!({ "enable": 1 })))
            .with_status(401)
            .create_async()
            .await;
        let client = client(&server).await;
        let now = Utc::now().timestamp();
        let issuer = Arc::new(StaticIssuer::issuing(TokenPayload {
            token: "eyJ.token".to_string(),
            generation_time: now,
            expires_at: now + 43_200,
        }));
        let tokens = Arc::new(TokenManager::new(client.http().clone(), server.url(), "122012345678", issuer, None, Duration::ZERO));
        assert_eq!(tokens.check(true).await, TokenCheck::Valid);
        client.set_credential(Credential::BearerToken(tokens.clone()));

        let result = client.write_json(Method::PUT, "/ivp/livedata/stream", Access::Open, &json!({ "enable": 1 })).await;

        assert!(matches!(result, Err(EnvoyError::Unauthorized { .. })));
        assert!(!tokens.has_token());
    }
}
