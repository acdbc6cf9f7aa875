use crate::app_config::AppConfig;
use crate::auth::{TokenCheck, TokenIssuer, TokenState};
use crate::domain::telemetry::DryContact;
use crate::domain::{CapabilityMap, Category, Notification, Notifier, TelemetryTree};
use crate::envoy::{Access, EnvoyClient, EnvoyError};
use crate::lock_table::LockTable;
use crate::persistence::FileStore;
use crate::scheduler::Scheduler;
use crate::store::{Store, TelemetrySnapshot};
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, Sender, UnboundedReceiver};
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, instrument, warn};

/// The acquisition engine of one gateway: discovery at connect, then category refreshes fired by
/// the scheduler, each guarded by the lock table and a credential check.
#[derive(Debug)]
pub struct Engine {
    pub(super) config: Arc<AppConfig>,
    pub(super) client: EnvoyClient,
    pub(super) issuer: Arc<dyn TokenIssuer>,
    pub(super) store: Store,
    pub(super) locks: LockTable,
    pub(super) notifier: Notifier,
    pub(super) scheduler: Scheduler,
    firings: Mutex<Option<UnboundedReceiver<Category>>>,
    pub(super) device_id: Mutex<Option<String>>,
    pub(super) files: Mutex<Option<FileStore>>,
}

impl Engine {
    pub fn new(config: Arc<AppConfig>, http: Client, issuer: Arc<dyn TokenIssuer>, notifications: Sender<Notification>) -> Self {
        let notifier = Notifier::new(notifications, config.mirror().restful(), config.mirror().mqtt());
        let (tx, rx) = mpsc::unbounded_channel();

        Engine {
            client: EnvoyClient::new(http, config.envoy().url()),
            issuer,
            store: Store::new(),
            locks: LockTable::default(),
            scheduler: Scheduler::new(tx, notifier.clone()),
            notifier,
            firings: Mutex::new(Some(rx)),
            device_id: Mutex::new(None),
            files: Mutex::new(None),
            config,
        }
    }

    /// Runs the routines the scheduler fires, one task per firing. Returns when the scheduler is
    /// gone or immediately when called twice.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>) {
        let Some(mut firings) = self.firings.lock().expect("engine lock poisoned").take() else {
            warn!("⚠️ Engine is already running");
            return;
        };

        while let Some(category) = firings.recv().await {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.run_category(category).await;
            });
        }
    }

    /// A firing that arrives while the same category still runs is dropped. Returns whether the
    /// routine ran.
    #[instrument(skip(self), fields(category = %category))]
    pub async fn run_category(&self, category: Category) -> bool {
        let Some(_guard) = self.locks.try_acquire(category) else {
            debug!("🔁 Refresh of '{}' is still running, dropping this firing", category);
            return false;
        };

        if !self.check_token(false).await.is_ready() {
            debug!("🔁 Credentials are not ready, skipping '{}'", category);
            return false;
        }

        match self.refresh(category, false).await {
            Ok(()) => {}
            Err(e @ EnvoyError::Unauthorized { .. }) => {
                debug!("🔑 Refreshing '{}'... unauthorized, {}", category, e);
            }
            Err(e) => {
                warn!("⚠️ Refreshing '{}'... failed, {}", category, e);
                self.notifier.warning(Some(category), e.to_string());
            }
        }
        true
    }

    pub async fn check_token(&self, is_startup: bool) -> TokenCheck {
        let tokens = self.client.credential().token_manager().cloned();
        match tokens {
            Some(tokens) => tokens.check(is_startup).await,
            None => TokenCheck::Valid,
        }
    }

    pub fn enabled_categories(&self) -> &'static [Category] {
        self.config.enabled_categories()
    }

    pub fn token_state(&self) -> TokenState {
        self.client.credential().token_state()
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn subscribe(&self) -> WatchReceiver<TelemetrySnapshot> {
        self.store.notifier()
    }

    pub async fn snapshot(&self) -> TelemetryTree {
        self.store.telemetry().await
    }

    pub async fn capabilities(&self) -> CapabilityMap {
        self.store.capabilities().await
    }

    pub async fn dry_contacts(&self) -> Vec<DryContact> {
        self.store.read(|tree| tree.ensemble.dry_contacts.clone()).await
    }

    pub(super) fn device_id(&self) -> Option<String> {
        self.device_id.lock().expect("engine lock poisoned").clone()
    }

    pub(super) fn files(&self) -> Option<FileStore> {
        self.files.lock().expect("engine lock poisoned").clone()
    }

    pub(super) fn has_token(&self) -> bool {
        self.client.credential().token_manager().is_some()
    }

    /// Fetches an optional endpoint. Endpoints not proven supported are skipped outside of
    /// discovery; during discovery any failure demotes the endpoint to unsupported.
    pub(super) async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        access: Access,
        supported: bool,
        is_startup: bool,
    ) -> Result<Option<T>, EnvoyError> {
        self.request(Method::GET, path, access, supported, is_startup).await
    }

    pub(super) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        access: Access,
        supported: bool,
        is_startup: bool,
    ) -> Result<Option<T>, EnvoyError> {
        if !(supported || is_startup) || !self.client.grants(access) {
            return Ok(None);
        }

        match self.client.request_json(method, path, access, None).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if is_startup => {
                if e.is_unsupported() {
                    warn!(path, "⚠️ {} is not supported by this gateway", path);
                } else {
                    warn!(path, "⚠️ Probing {}... failed, {}", path, e);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(super) fn publish<T: Serialize>(&self, category: Category, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => self.notifier.data_updated(category, payload),
            Err(e) => warn!("⚠️ Could not serialize the '{}' update: {}", category, e),
        }
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::app_config::AppConfigBuilder;
    use crate::auth::{StaticIssuer, TokenPayload};
    use crate::envoy::new_client;
    use chrono::Utc;
    use mockito::{Matcher, ServerGuard};
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    pub fn engine_with(server: &ServerGuard, issuer: StaticIssuer, config: AppConfigBuilder) -> (Arc<Engine>, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(256);
        let config = config.envoy_url(server.url()).build();
        let engine = Engine::new(Arc::new(config), new_client(Duration::from_secs(5)).unwrap(), Arc::new(issuer), tx);
        (Arc::new(engine), rx)
    }

    pub fn engine(server: &ServerGuard) -> (Arc<Engine>, Receiver<Notification>) {
        engine_with(server, StaticIssuer::default(), AppConfigBuilder::new())
    }

    pub fn token_payload(lifetime: i64) -> TokenPayload {
        let now = Utc::now().timestamp();
        TokenPayload {
            token: "eyJ.token".to_string(),
            generation_time: now,
            expires_at: now + lifetime,
        }
    }

    pub fn notifications(rx: &mut Receiver<Notification>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            notifications.push(notification);
        }
        notifications
    }

    #[tokio::test]
    async fn a_locked_category_never_runs() {
        let mut server = mockito::Server::new_async().await;
        let home = server.mock("GET", "/home.json").expect(0).create_async().await;
        let (engine, _rx) = engine(&server);

        let _guard = engine.locks.try_acquire(Category::Home);
        let ran = engine.run_category(Category::Home).await;

        assert!(!ran);
        home.assert_async().await;
    }

    #[test_log::test(tokio::test)]
    async fn the_lock_is_released_after_a_failed_refresh() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/home.json").with_status(500).create_async().await;
        let (engine, mut rx) = engine(&server);

        let ran = engine.run_category(Category::Home).await;

        assert!(ran);
        assert!(!engine.locks.is_locked(Category::Home));
        assert!(notifications(&mut rx).iter().any(|notification| matches!(
            notification,
            Notification::Warning {
                category: Some(Category::Home),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn an_unauthorized_refresh_is_not_reported_as_a_warning() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/home.json").with_status(401).create_async().await;
        let (engine, mut rx) = engine(&server);

        let ran = engine.run_category(Category::Home).await;

        assert!(ran);
        assert!(!engine.locks.is_locked(Category::Home));
        assert!(
            !notifications(&mut rx)
                .iter()
                .any(|notification| matches!(notification, Notification::Warning { .. }))
        );
    }

    #[tokio::test]
    async fn refreshes_are_skipped_while_the_token_is_not_ready() {
        let mut server = mockito::Server::new_async().await;
        let home = server.mock("GET", "/home.json").expect(0).create_async().await;
        server.mock("GET", crate::auth::CHECK_JWT_PATH).with_status(401).create_async().await;
        let (engine, _rx) = engine_with(&server, StaticIssuer::issuing(token_payload(3600)), AppConfigBuilder::new());
        let tokens = Arc::new(crate::auth::TokenManager::new(
            engine.client.http().clone(),
            server.url(),
            "122012345678",
            engine.issuer.clone(),
            None,
            Duration::ZERO,
        ));
        engine.client.set_credential(crate::auth::Credential::BearerToken(tokens));

        let ran = engine.run_category(Category::Home).await;

        assert!(!ran);
        assert!(!engine.locks.is_locked(Category::Home));
        home.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_skips_unproven_endpoints_outside_of_discovery() -> Result<(), EnvoyError> {
        let mut server = mockito::Server::new_async().await;
        let readings = server
            .mock("GET", Matcher::Regex("^/ivp/meters/readings".to_string()))
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let (engine, _rx) = engine(&server);

        let skipped: Option<serde_json::Value> = engine.fetch("/ivp/meters/readings", Access::Open, false, false).await?;
        let probed: Option<serde_json::Value> = engine.fetch("/ivp/meters/readings", Access::Open, false, true).await?;

        assert_eq!(skipped, None);
        assert_eq!(probed, None);
        readings.assert_async().await;
        Ok(())
    }
}
