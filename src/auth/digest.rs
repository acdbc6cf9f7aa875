use crate::auth::AuthError;
use md5::{Digest, Md5};
use rand::RngCore;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Legacy firmware protects some endpoints behind one of two digest users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestRole {
    Envoy,
    Installer,
}

impl Display for DigestRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestRole::Envoy => f.write_str("envoy"),
            DigestRole::Installer => f.write_str("installer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate: Digest realm="...", nonce="...", ...` header value.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                _ => {}
            }
        }

        Some(DigestChallenge {
            realm: realm?,
            nonce: nonce.filter(|nonce| !nonce.is_empty())?,
            opaque,
        })
    }
}

fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in params.chars().chain(std::iter::once(',')) {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                if let Some((key, value)) = current.split_once('=') {
                    pairs.push((key.trim().to_string(), value.trim().to_string()));
                }
                current.clear();
            }
            c => current.push(c),
        }
    }

    pairs
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn new_cnonce() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One digest credential. The nonce counter belongs to the credential, never to the process.
#[derive(Debug)]
pub struct DigestAuth {
    role: DigestRole,
    username: String,
    password: SecretString,
    nonce_count: AtomicU32,
}

impl DigestAuth {
    pub fn new(role: DigestRole, username: impl Into<String>, password: SecretString) -> Self {
        DigestAuth {
            role,
            username: username.into(),
            password,
            nonce_count: AtomicU32::new(0),
        }
    }

    /// The envoy user's password is either configured or the last 6 characters of the serial number.
    pub fn envoy(serial_number: &str, password: Option<&SecretString>) -> Result<Self, AuthError> {
        let password = match password {
            Some(password) => password.clone(),
            None => {
                let chars: Vec<char> = serial_number.chars().collect();
                let derived: String = chars[chars.len().saturating_sub(6)..].iter().collect();
                if derived.len() != 6 {
                    return Err(AuthError::InvalidEnvoyPassword(derived.len()));
                }
                SecretString::from(derived)
            }
        };

        Ok(DigestAuth::new(DigestRole::Envoy, "envoy", password))
    }

    pub fn installer(serial_number: &str) -> Option<Self> {
        if serial_number.is_empty() {
            return None;
        }
        let password = crate::auth::installer_password(serial_number);
        Some(DigestAuth::new(DigestRole::Installer, "installer", SecretString::from(password)))
    }

    pub fn role(&self) -> DigestRole {
        self.role
    }

    pub fn nonce_count(&self) -> u32 {
        self.nonce_count.load(Ordering::SeqCst)
    }

    /// Answers a challenge, consuming the next nonce count of this credential.
    pub fn authorization(&self, challenge: &DigestChallenge, method: &str, uri: &str, cnonce: &str) -> String {
        let nc = format!("{:08}", self.nonce_count.fetch_add(1, Ordering::SeqCst) + 1);
        let response = digest_response(
            &self.username,
            self.password.expose_secret(),
            challenge,
            method,
            uri,
            &nc,
            cnonce,
        );

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=\"MD5\", qop=auth, nc={}, cnonce=\"{}\", response=\"{}\"",
            self.username, challenge.realm, challenge.nonce, uri, nc, cnonce, response
        );
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }

    /// Sends the request, answering a digest challenge once. A second 401 is an error.
    pub async fn send(&self, builder: RequestBuilder, method: &str, uri: &str) -> Result<Response, AuthError> {
        let retry = builder.try_clone().ok_or(AuthError::NotReplayable)?;
        let response = builder.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(DigestChallenge::parse)
            .ok_or(AuthError::MissingChallenge)?;

        debug!(role = %self.role, realm = challenge.realm, "🔑 Answering digest challenge for {}", uri);
        let authorization = self.authorization(&challenge, method, uri, &new_cnonce());
        let response = retry.header(AUTHORIZATION, authorization).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(role = %self.role, "🔑 Digest credentials rejected for {}", uri);
            return Err(AuthError::DigestRejected(self.role.to_string()));
        }

        Ok(response)
    }
}

fn digest_response(username: &str, password: &str, challenge: &DigestChallenge, method: &str, uri: &str, nc: &str, cnonce: &str) -> String {
    let ha1 = md5_hex(&format!("{}:{}:{}", username, challenge.realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    md5_hex(&format!("{}:{}:{}:{}:auth:{}", ha1, challenge.nonce, nc, cnonce, ha2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::Client;

    fn challenge() -> DigestChallenge {
        DigestChallenge {
            realm: "enphaseenergy.com".to_string(),
            nonce: "abc123nonce".to_string(),
            opaque: None,
        }
    }

    fn installer() -> DigestAuth {
        DigestAuth::new(DigestRole::Installer, "installer", SecretString::from("secret"))
    }

    #[test]
    fn parses_a_challenge() {
        let parsed = DigestChallenge::parse(r#"Digest realm="enphaseenergy.com", qop="auth,auth-int", nonce="abc123nonce", opaque="xyz""#);

        assert_eq!(
            parsed,
            Some(DigestChallenge {
                realm: "enphaseenergy.com".to_string(),
                nonce: "abc123nonce".to_string(),
                opaque: Some("xyz".to_string()),
            })
        );
    }

    #[test]
    fn rejects_a_challenge_without_a_nonce() {
        assert_eq!(DigestChallenge::parse(r#"Digest realm="enphaseenergy.com""#), None);
        assert_eq!(DigestChallenge::parse(r#"Basic realm="enphaseenergy.com""#), None);
    }

    #[test]
    fn computes_the_md5_response_chain() {
        let auth = installer();

        let header = auth.authorization(&challenge(), "GET", "/installer/pcu_comm_check", "0a4f113b");

        assert_eq!(
            header,
            "Digest username=\"installer\", realm=\"enphaseenergy.com\", nonce=\"abc123nonce\", uri=\"/installer/pcu_comm_check\", \
             algorithm=\"MD5\", qop=auth, nc=00000001, cnonce=\"0a4f113b\", response=\"83bbbb920f1a0deb38e7a0813f38c915\""
        );
    }

    #[test]
    fn nonce_count_increments_once_per_answered_challenge() {
        let auth = installer();

        auth.authorization(&challenge(), "GET", "/installer/pcu_comm_check", "0a4f113b");
        let second = auth.authorization(&challenge(), "GET", "/installer/pcu_comm_check", "0a4f113b");

        assert_eq!(auth.nonce_count(), 2);
        assert!(second.contains("nc=00000002"));
        assert!(second.contains("response=\"8fc3fe0254dd09fb2a70589254cbd242\""));
    }

    #[test]
    fn nonce_counters_are_per_credential() {
        let first = installer();
        let second = installer();

        first.authorization(&challenge(), "GET", "/", "c");

        assert_eq!(first.nonce_count(), 1);
        assert_eq!(second.nonce_count(), 0);
    }

    #[test]
    fn envoy_password_defaults_to_the_last_six_serial_characters() {
        assert!(DigestAuth::envoy("122012345678", None).is_ok());
        assert!(matches!(DigestAuth::envoy("1234", None), Err(AuthError::InvalidEnvoyPassword(4))));
    }

    #[tokio::test]
    async fn send_answers_the_challenge_once() -> Result<(), AuthError> {
        let mut server = mockito::Server::new_async().await;
        let challenged = server
            .mock("GET", "/api/v1/production/inverters")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .with_header("www-authenticate", r#"Digest realm="enphaseenergy.com", qop="auth", nonce="n1""#)
            .create_async()
            .await;
        let answered = server
            .mock("GET", "/api/v1/production/inverters")
            .match_header("authorization", mockito::Matcher::Regex("^Digest username=\"envoy\".*nc=00000001".to_string()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let auth = DigestAuth::envoy("122012345678", None)?;
        let builder = Client::new().get(format!("{}/api/v1/production/inverters", server.url()));
        let response = auth.send(builder, "GET", "/api/v1/production/inverters").await?;

        challenged.assert_async().await;
        answered.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn send_surfaces_a_second_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/installer/agf/index.json")
            .with_status(401)
            .with_header("www-authenticate", r#"Digest realm="enphaseenergy.com", qop="auth", nonce="n1""#)
            .expect(2)
            .create_async()
            .await;

        let auth = installer();
        let builder = Client::new().get(format!("{}/installer/agf/index.json", server.url()));
        let result = auth.send(builder, "GET", "/installer/agf/index.json").await;

        assert!(matches!(result, Err(AuthError::DigestRejected(role)) if role == "installer"));
    }
}
