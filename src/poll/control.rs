use crate::auth::DigestRole;
use crate::domain::Category;
use crate::domain::commands::Command;
use crate::domain::controller::Controller;
use crate::domain::telemetry::{DryContactSettings, GeneratorMode, RelayState, StorageProfile};
use crate::envoy::domain::ensemble::TariffGet;
use crate::envoy::map_ensemble::map_storage_settings;
use crate::envoy::{Access, EnvoyError, endpoints};
use crate::poll::{ControlError, Engine};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{info, instrument};

#[async_trait]
impl Controller for Engine {
    #[instrument(skip(self))]
    async fn execute(&self, command: Command) -> Result<(), ControlError> {
        if !self.check_token(false).await.is_ready() {
            return Err(ControlError::NotReady);
        }

        match command {
            Command::SetProductionEnabled(enabled) => self.set_production_enabled(enabled).await,
            Command::SetStorageSettings {
                profile,
                reserved_soc,
                charge_from_grid,
            } => self.set_storage_settings(profile, reserved_soc, charge_from_grid).await,
            Command::SetGridConnected(connected) => self.set_grid_connected(connected).await,
            Command::SetDryContact { id, closed } => self.set_dry_contact(id, closed).await,
            Command::SetDryContactSettings(settings) => self.set_dry_contact_settings(settings).await,
            Command::SetGeneratorMode(mode) => self.set_generator_mode(mode).await,
        }
    }
}

impl Engine {
    async fn set_production_enabled(&self, enabled: bool) -> Result<(), ControlError> {
        let device_id = self.device_id().ok_or(ControlError::Unsupported("production control"))?;
        if !self.client.grants(Access::Installer) {
            return Err(ControlError::InstallerRequired);
        }

        let body = json!({ "length": 1, "arr": [if enabled { 0 } else { 1 }] });
        self.client
            .write_json(Method::PUT, &endpoints::power_mode(&device_id), Access::Installer, &body)
            .await?;
        info!("🏭 Setting production {}... OK", if enabled { "on" } else { "off" });

        self.store.update(|tree| tree.production_enabled = Some(enabled)).await;
        Ok(())
    }

    /// The tariff is read back and written as a whole, only the storage settings change.
    async fn set_storage_settings(
        &self,
        profile: Option<StorageProfile>,
        reserved_soc: Option<f64>,
        charge_from_grid: Option<bool>,
    ) -> Result<(), ControlError> {
        if !self.store.capabilities().await.ensemble.tariff.is_proven() {
            return Err(ControlError::Unsupported("storage settings"));
        }
        let access = Access::Digest(DigestRole::Envoy);

        let mut tariff: Value = self.client.get_json(endpoints::TARIFF, access).await?;
        let settings = tariff
            .pointer_mut("/tariff/storage_settings")
            .and_then(Value::as_object_mut)
            .ok_or(ControlError::Unsupported("storage settings"))?;
        if let Some(profile) = profile {
            settings.insert("mode".to_string(), json!(profile));
        }
        if let Some(reserved_soc) = reserved_soc {
            settings.insert("reserved_soc".to_string(), json!(reserved_soc));
        }
        if let Some(charge_from_grid) = charge_from_grid {
            settings.insert("charge_from_grid".to_string(), json!(charge_from_grid));
        }

        self.client.write_json(Method::PUT, endpoints::TARIFF, access, &tariff).await?;
        info!(?profile, ?reserved_soc, ?charge_from_grid, "🔋 Setting storage settings... OK");

        let tariff: TariffGet = serde_json::from_value(tariff).map_err(|e| EnvoyError::parse(endpoints::TARIFF, e))?;
        let storage_settings = map_storage_settings(tariff);
        self.update_ensemble(|ensemble| ensemble.storage_settings = storage_settings).await;
        Ok(())
    }

    async fn set_grid_connected(&self, connected: bool) -> Result<(), ControlError> {
        if !self.store.capabilities().await.ensemble.enpowers.is_present() {
            return Err(ControlError::Unsupported("grid relay"));
        }

        let state = if connected { "closed" } else { "open" };
        self.client
            .write_json(
                Method::POST,
                endpoints::ENSEMBLE_RELAY,
                Access::Digest(DigestRole::Envoy),
                &json!({ "mains_admin_state": state }),
            )
            .await?;
        info!("🔌 Setting grid relay {}... OK", state);

        self.update_ensemble(|ensemble| {
            let relay = ensemble.relay.get_or_insert_with(RelayState::default);
            relay.mains_admin_state = state.to_string();
        })
        .await;
        Ok(())
    }

    async fn set_dry_contact(&self, id: String, closed: bool) -> Result<(), ControlError> {
        self.known_dry_contact(&id).await?;

        let status = if closed { "closed" } else { "open" };
        self.client
            .write_json(
                Method::POST,
                endpoints::DRY_CONTACTS,
                Access::Digest(DigestRole::Envoy),
                &json!({ "dry_contacts": { "id": id, "status": status } }),
            )
            .await?;
        info!("🔌 Setting dry contact '{}' {}... OK", id, status);

        self.update_ensemble(|ensemble| {
            if let Some(contact) = ensemble.dry_contacts.iter_mut().find(|contact| contact.id == id) {
                contact.status = status.to_string();
            }
        })
        .await;
        Ok(())
    }

    async fn set_dry_contact_settings(&self, settings: DryContactSettings) -> Result<(), ControlError> {
        self.known_dry_contact(&settings.id).await?;

        self.client
            .write_json(
                Method::POST,
                endpoints::DRY_CONTACT_SETTINGS,
                Access::Digest(DigestRole::Envoy),
                &json!({ "dry_contacts": [settings] }),
            )
            .await?;
        info!("🔌 Setting dry contact '{}' settings... OK", settings.id);

        self.update_ensemble(|ensemble| {
            if let Some(contact) = ensemble.dry_contacts.iter_mut().find(|contact| contact.id == settings.id) {
                contact.settings = Some(settings);
            }
        })
        .await;
        Ok(())
    }

    async fn set_generator_mode(&self, mode: GeneratorMode) -> Result<(), ControlError> {
        if !self.store.capabilities().await.ensemble.generator.is_proven() {
            return Err(ControlError::Unsupported("generator"));
        }

        let mode = json!(mode);
        self.client
            .write_json(
                Method::POST,
                endpoints::GENERATOR_MODE,
                Access::Digest(DigestRole::Envoy),
                &json!({ "gen_mode": mode }),
            )
            .await?;
        info!("⛽ Setting generator mode {}... OK", mode);

        self.update_ensemble(|ensemble| {
            if let Some(generator) = ensemble.generator.as_mut() {
                generator.admin_mode = mode.as_str().map(str::to_string);
            }
        })
        .await;
        Ok(())
    }

    async fn known_dry_contact(&self, id: &str) -> Result<(), ControlError> {
        let known = self
            .store
            .read(|tree| tree.ensemble.dry_contacts.iter().any(|contact| contact.id == id))
            .await;
        if known {
            Ok(())
        } else {
            Err(ControlError::UnknownDryContact(id.to_string()))
        }
    }

    async fn update_ensemble(&self, f: impl FnOnce(&mut crate::domain::telemetry::Ensemble)) {
        let ensemble = self
            .store
            .update(|tree| {
                f(&mut tree.ensemble);
                tree.ensemble.clone()
            })
            .await;
        self.publish(Category::Ensemble, &ensemble);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, DigestAuth};
    use crate::domain::telemetry::DryContact;
    use crate::poll::engine::tests::engine;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    fn digest_credential() -> Credential {
        Credential::Digest {
            envoy: DigestAuth::envoy("121547060495", None).ok(),
            installer: DigestAuth::installer("121547060495"),
        }
    }

    fn contact(id: &str, status: &str) -> DryContact {
        DryContact {
            id: id.to_string(),
            status: status.to_string(),
            settings: None,
        }
    }

    #[tokio::test]
    async fn production_control_needs_the_installer_role() {
        let server = mockito::Server::new_async().await;
        let (engine, _rx) = engine(&server);
        *engine.device_id.lock().unwrap() = Some("123456789".to_string());

        let result = engine.execute(Command::SetProductionEnabled(false)).await;

        assert!(matches!(result, Err(ControlError::InstallerRequired)));
    }

    #[tokio::test]
    async fn production_control_without_a_device_id_is_unsupported() {
        let server = mockito::Server::new_async().await;
        let (engine, _rx) = engine(&server);
        engine.client.set_credential(digest_credential());

        let result = engine.execute(Command::SetProductionEnabled(true)).await;

        assert!(matches!(result, Err(ControlError::Unsupported(_))));
    }

    #[tokio::test]
    async fn disabling_production_forces_the_power_off() -> Result<(), ControlError> {
        let mut server = mockito::Server::new_async().await;
        let power = server
            .mock("PUT", "/ivp/mod/123456789/mode/power")
            .match_body(Matcher::Json(json!({ "length": 1, "arr": [1] })))
            .with_status(204)
            .create_async()
            .await;
        let (engine, _rx) = engine(&server);
        engine.client.set_credential(digest_credential());
        *engine.device_id.lock().unwrap() = Some("123456789".to_string());

        engine.execute(Command::SetProductionEnabled(false)).await?;

        power.assert_async().await;
        assert_eq!(engine.snapshot().await.production_enabled, Some(false));
        Ok(())
    }

    #[tokio::test]
    async fn storage_settings_are_written_into_the_tariff() -> Result<(), ControlError> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/admin/lib/tariff")
            .with_body(r#"{"tariff":{"currency":{"code":"EUR"},"storage_settings":{"mode":"self-consumption","reserved_soc":20.0,"charge_from_grid":false}}}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/admin/lib/tariff")
            .match_body(Matcher::Json(json!({
                "tariff": {
                    "currency": { "code": "EUR" },
                    "storage_settings": { "mode": "backup", "reserved_soc": 30.0, "charge_from_grid": false }
                }
            })))
            .create_async()
            .await;
        let (engine, _rx) = engine(&server);
        engine.client.set_credential(digest_credential());
        engine.store.update_capabilities(|capabilities| capabilities.ensemble.tariff.prove()).await;

        engine
            .execute(Command::SetStorageSettings {
                profile: Some(StorageProfile::Backup),
                reserved_soc: Some(30.0),
                charge_from_grid: None,
            })
            .await?;

        put.assert_async().await;
        let settings = engine.snapshot().await.ensemble.storage_settings.unwrap();
        assert_eq!(settings.profile, StorageProfile::Backup);
        assert_eq!(settings.reserved_soc, 30.0);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_dry_contacts_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let contacts = server.mock("POST", "/ivp/ensemble/dry_contacts").expect(0).create_async().await;
        let (engine, _rx) = engine(&server);
        engine.client.set_credential(digest_credential());

        let result = engine
            .execute(Command::SetDryContact {
                id: "NC9".to_string(),
                closed: true,
            })
            .await;

        contacts.assert_async().await;
        assert!(matches!(result, Err(ControlError::UnknownDryContact(id)) if id == "NC9"));
    }

    #[tokio::test]
    async fn closing_a_dry_contact_updates_its_status() -> Result<(), ControlError> {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/ivp/ensemble/dry_contacts")
            .match_body(Matcher::Json(json!({ "dry_contacts": { "id": "NC1", "status": "closed" } })))
            .create_async()
            .await;
        let (engine, _rx) = engine(&server);
        engine.client.set_credential(digest_credential());
        engine
            .store
            .update(|tree| tree.ensemble.dry_contacts = vec![contact("NC1", "open"), contact("NC2", "open")])
            .await;

        engine
            .execute(Command::SetDryContact {
                id: "NC1".to_string(),
                closed: true,
            })
            .await?;

        post.assert_async().await;
        let contacts = engine.dry_contacts().await;
        assert!(contacts[0].is_closed());
        assert!(!contacts[1].is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn generator_mode_needs_a_generator() {
        let server = mockito::Server::new_async().await;
        let (engine, _rx) = engine(&server);

        let result = engine.execute(Command::SetGeneratorMode(GeneratorMode::Auto)).await;

        assert!(matches!(result, Err(ControlError::Unsupported("generator"))));
    }
}
