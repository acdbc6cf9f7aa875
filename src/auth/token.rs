use crate::auth::{AuthError, BearerToken, TokenIssuer};
use crate::persistence::FileStore;
use chrono::Utc;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const CHECK_JWT_PATH: &str = "/auth/check_jwt";
const VALID_TOKEN_MARKER: &str = "Valid token";
const SESSION_COOKIE: &str = "sessionId=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenState {
    NoAuthRequired,
    Unknown,
    Missing,
    Requesting,
    PresentUnvalidated,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    NotReady,
    /// Another check is in flight, try again later.
    AlreadyRunning,
}

impl TokenCheck {
    pub fn is_ready(&self) -> bool {
        matches!(self, TokenCheck::Valid)
    }
}

#[derive(Debug)]
struct TokenInner {
    state: TokenState,
    token: Option<BearerToken>,
    cookie: Option<String>,
}

/// Owns the bearer token lifecycle of one gateway: load, request, validate, invalidate.
#[derive(Debug)]
pub struct TokenManager {
    client: Client,
    base_url: String,
    serial_number: String,
    issuer: Arc<dyn TokenIssuer>,
    store: Option<FileStore>,
    request_backoff: Duration,
    checking: AtomicBool,
    inner: Mutex<TokenInner>,
}

struct CheckGuard<'a>(&'a AtomicBool);

impl<'a> CheckGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CheckGuard(flag))
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TokenManager {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        serial_number: impl Into<String>,
        issuer: Arc<dyn TokenIssuer>,
        store: Option<FileStore>,
        request_backoff: Duration,
    ) -> Self {
        TokenManager {
            client,
            base_url: base_url.into(),
            serial_number: serial_number.into(),
            issuer,
            store,
            request_backoff,
            checking: AtomicBool::new(false),
            inner: Mutex::new(TokenInner {
                state: TokenState::Unknown,
                token: None,
                cookie: None,
            }),
        }
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, TokenInner> {
        self.inner.lock().expect("token lock poisoned")
    }

    pub fn state(&self) -> TokenState {
        self.inner().state
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::SeqCst)
    }

    pub fn is_installer_grade(&self) -> bool {
        self.inner().token.as_ref().is_some_and(BearerToken::is_installer_grade)
    }

    pub fn has_token(&self) -> bool {
        self.inner().token.is_some()
    }

    fn set_state(&self, state: TokenState) {
        self.inner().state = state;
    }

    /// Authenticates a request with the session cookie once the token is validated, with the
    /// bearer token before that.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        let inner = self.inner();
        match (&inner.cookie, &inner.token) {
            (Some(cookie), _) => builder.header(COOKIE, cookie.as_str()),
            (None, Some(token)) => builder.bearer_auth(token.token()),
            (None, None) => builder,
        }
    }

    /// Drops the in-memory token after an unauthorized response, ignored while a check is running.
    pub fn invalidate(&self) {
        if self.is_checking() {
            debug!("🔑 Unauthorized response during a token check, ignoring");
            return;
        }

        let mut inner = self.inner();
        inner.token = None;
        inner.cookie = None;
        inner.state = TokenState::Invalid;
        info!("🔑 Token invalidated, it will be requested again");
    }

    #[instrument(skip(self))]
    pub async fn check(&self, is_startup: bool) -> TokenCheck {
        let Some(_guard) = CheckGuard::acquire(&self.checking) else {
            debug!("🔑 Token check already running");
            return TokenCheck::AlreadyRunning;
        };

        if is_startup {
            self.load_persisted().await;
        }

        let now = Utc::now().timestamp();
        let exists = self.inner().token.as_ref().is_some_and(|token| token.is_usable_at(now));
        if !exists {
            {
                let mut inner = self.inner();
                inner.token = None;
                inner.cookie = None;
                inner.state = TokenState::Missing;
            }

            info!("🔑 No usable token, requesting a new one in {:?}...", self.request_backoff);
            sleep(self.request_backoff).await;

            self.set_state(TokenState::Requesting);
            match self.issuer.issue(&self.serial_number).await {
                Ok(payload) => {
                    if let Some(store) = &self.store {
                        if let Err(e) = store.write_token(&payload).await {
                            warn!("⚠️ Could not persist token: {}", e);
                        }
                    }
                    let mut inner = self.inner();
                    inner.token = Some(BearerToken::from(payload));
                    inner.state = TokenState::PresentUnvalidated;
                }
                Err(e) => {
                    warn!("🔑 Requesting token... failed, {}", e);
                    self.set_state(TokenState::Missing);
                    return TokenCheck::NotReady;
                }
            }
        }

        if self.state() == TokenState::Valid {
            return TokenCheck::Valid;
        }

        match self.validate().await {
            Ok(cookie) => {
                let mut inner = self.inner();
                inner.cookie = Some(cookie);
                inner.state = TokenState::Valid;
                info!("🔑 Validating token... OK");
                TokenCheck::Valid
            }
            Err(e) => {
                warn!("🔑 Validating token... failed, {}", e);
                self.set_state(TokenState::Invalid);
                TokenCheck::NotReady
            }
        }
    }

    async fn load_persisted(&self) {
        let Some(store) = &self.store else {
            return;
        };

        match store.read_token().await {
            Ok(Some(payload)) => {
                debug!(expires_at = payload.expires_at, "🔑 Loaded persisted token");
                let mut inner = self.inner();
                inner.token = Some(BearerToken::from(payload));
                inner.cookie = None;
                inner.state = TokenState::PresentUnvalidated;
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ Could not read persisted token: {}", e),
        }
    }

    async fn validate(&self) -> Result<String, AuthError> {
        let token = self
            .inner()
            .token
            .as_ref()
            .map(|token| token.token().to_string())
            .ok_or(AuthError::TokenRejected("no token".to_string()))?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, CHECK_JWT_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .find(|pair| pair.starts_with(SESSION_COOKIE))
            .map(str::to_string);
        let body = response.text().await?;

        if status != StatusCode::OK || !body.contains(VALID_TOKEN_MARKER) {
            return Err(AuthError::TokenRejected(format!("HTTP {}", status)));
        }

        cookie.ok_or(AuthError::TokenRejected("no session cookie".to_string()))
    }
}
