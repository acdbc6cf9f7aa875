use crate::auth::{Credential, DigestAuth, TokenCheck, TokenManager};
use crate::domain::Category;
use crate::domain::telemetry::Info;
use crate::envoy::{Access, EnvoyError, endpoints};
use crate::persistence::FileStore;
use crate::poll::{ConnectError, Engine};
use crate::scheduler::ScheduledTask;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const DEVICE_ID_MARKER: &str = "envoyDevId:'";
const DEVICE_ID_LENGTH: usize = 9;

/// Categories discovered after home and inventory, in discovery order.
const SOFT_CATEGORIES: [Category; 5] = [
    Category::Production,
    Category::DeviceData,
    Category::Ensemble,
    Category::Settings,
    Category::LiveData,
];

impl Engine {
    /// Runs discovery against the gateway and starts the scheduler for every category that proved
    /// supported. A failing hard step aborts the attempt, the host retries the whole sequence.
    #[instrument(skip_all)]
    pub async fn connect(&self) -> Result<(), ConnectError> {
        info!("🔌 Connecting to {}...", self.client.base_url());
        self.scheduler.stop();

        let info = self.refresh_info().await.map_err(ConnectError::Info)?;

        let files = FileStore::new(self.config.core().data_directory(), info.serial_number.as_str());
        *self.files.lock().expect("engine lock poisoned") = Some(files.clone());
        self.seed_energy_baseline(&files).await;

        self.authenticate(&info, &files).await?;

        let enabled = self.config.enabled_categories();
        if enabled.contains(&Category::Settings) {
            self.resolve_device_id(&files).await;
            soft(Category::Settings, self.refresh_production_state(true).await);
        }

        self.refresh_home().await.map_err(ConnectError::Home)?;
        if enabled.contains(&Category::Inventory) {
            self.refresh_inventory().await.map_err(ConnectError::Inventory)?;
        }

        for category in SOFT_CATEGORIES.into_iter().filter(|category| enabled.contains(category)) {
            soft(category, self.refresh(category, true).await);
        }

        let tasks: Vec<ScheduledTask> = self
            .store
            .capabilities()
            .await
            .supported_categories(enabled)
            .into_iter()
            .map(|category| ScheduledTask::new(category, self.config.polling().period(category)))
            .collect();
        self.scheduler.start(&tasks);

        let categories: Vec<&str> = tasks.iter().map(|task| task.category.name()).collect();
        info!("🔌 Connecting... OK, polling {}", categories.join(", "));
        Ok(())
    }

    /// Token firmware must end up with a valid token. Legacy firmware sets up both digest roles,
    /// each one may fail on its own.
    async fn authenticate(&self, info: &Info, files: &FileStore) -> Result<(), ConnectError> {
        if info.token_required {
            let tokens = match self.client.credential().token_manager() {
                Some(tokens) => tokens.clone(),
                None => Arc::new(TokenManager::new(
                    self.client.http().clone(),
                    self.client.base_url(),
                    info.serial_number.as_str(),
                    self.issuer.clone(),
                    Some(files.clone()),
                    self.config.enlighten().token_request_backoff(),
                )),
            };
            self.client.set_credential(Credential::BearerToken(tokens.clone()));

            return match tokens.check(true).await {
                TokenCheck::Valid => {
                    info!(installer = tokens.is_installer_grade(), "🔑 Authenticating with a token... OK");
                    Ok(())
                }
                check => Err(ConnectError::Token(check)),
            };
        }

        let envoy = DigestAuth::envoy(&info.serial_number, self.config.envoy().password())
            .inspect_err(|e| warn!("🔑 Envoy digest credentials unavailable, {}", e))
            .ok();
        let installer = DigestAuth::installer(&info.serial_number);
        if installer.is_none() {
            warn!("🔑 Installer digest credentials unavailable, installer endpoints are disabled");
        }
        info!(
            envoy = envoy.is_some(),
            installer = installer.is_some(),
            "🔑 Authenticating with digest credentials... OK"
        );
        self.client.set_credential(Credential::Digest { envoy, installer });
        Ok(())
    }

    /// The persisted id when there is one, otherwise scraped from the status page and persisted.
    pub(super) async fn resolve_device_id(&self, files: &FileStore) {
        let persisted = files.read_device_id().await.unwrap_or_else(|e| {
            warn!("⚠️ Could not read the device id: {}", e);
            None
        });

        let device_id = match persisted {
            Some(device_id) => Some(device_id),
            None => match self.scrape_device_id().await {
                Ok(device_id) => {
                    if let Some(device_id) = &device_id {
                        if let Err(e) = files.write_device_id(device_id).await {
                            warn!("⚠️ Could not persist the device id: {}", e);
                        }
                    }
                    device_id
                }
                Err(e) => {
                    warn!("⚠️ Reading the device id... failed, {}", e);
                    None
                }
            },
        };

        match &device_id {
            Some(device_id) => {
                debug!(device_id = %device_id, "🪪 Resolved the device id");
                self.store.update_capabilities(|capabilities| capabilities.device_id.prove()).await;
            }
            None => info!("🪪 No device id, production control is unavailable"),
        }
        *self.device_id.lock().expect("engine lock poisoned") = device_id;
    }

    async fn scrape_device_id(&self) -> Result<Option<String>, EnvoyError> {
        let page = self
            .client
            .text(Method::GET, endpoints::BACKBONE_APPLICATION, Access::Open, None)
            .await?;
        Ok(device_id_from(&page))
    }

    /// Seeds the cached production lifetime so the fallback survives restarts.
    async fn seed_energy_baseline(&self, files: &FileStore) {
        match files.read_energy_baseline().await {
            Ok(Some(baseline)) => {
                debug!(baseline, "⚡ Seeding the production lifetime energy");
                self.store
                    .update(|tree| {
                        let production = &mut tree.power_and_energy.production;
                        if production.energy_lifetime_kwh == 0.0 {
                            production.energy_lifetime_kwh = baseline;
                        }
                    })
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!("⚠️ Could not read the energy baseline: {}", e),
        }
    }
}

fn soft(category: Category, result: Result<(), EnvoyError>) {
    if let Err(e) = result {
        warn!("⚠️ Discovering '{}'... failed, {}", category, e);
    }
}

fn device_id_from(page: &str) -> Option<String> {
    let start = page.find(DEVICE_ID_MARKER)? + DEVICE_ID_MARKER.len();
    let device_id: String = page[start..].chars().take(DEVICE_ID_LENGTH).collect();
    (device_id.len() == DEVICE_ID_LENGTH && device_id.chars().all(|c| c.is_ascii_alphanumeric())).then_some(device_id)
}
