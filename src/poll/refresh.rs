use crate::auth::DigestRole;
use crate::domain::Category;
use crate::domain::capability::MeterCapabilities;
use crate::domain::measurement::MeasurementKind;
use crate::domain::telemetry::{Ensemble, EnsembleDeviceKind, Info, Meter};
use crate::envoy::domain::ensemble::{
    DryContactSettingsGet, DryContactsGet, EnchargeSettingsGet, EnsembleGroup, EnsemblePowerGet, EnsembleStatusGet, GeneratorGet,
    GeneratorSettingsGet, TariffGet,
};
use crate::envoy::domain::home::HomeGet;
use crate::envoy::domain::info::InfoGet;
use crate::envoy::domain::inventory::{InventoryGroup, PcuPowerGet};
use crate::envoy::domain::live_data::LiveDataGet;
use crate::envoy::domain::meters::{MeterGet, MeterReadingGet, MeterReportGet};
use crate::envoy::domain::production::{EnergyPdmGet, ProductionGet, ProductionPdmGet, ProductionStatisticsGet};
use crate::envoy::domain::settings::{GridProfileGet, PlcLevelGet, PowerModeGet};
use crate::envoy::map_device_data::map_device_data;
use crate::envoy::map_ensemble::{
    apply_ensemble_power, apply_ensemble_status, map_dry_contacts, map_encharge_settings, map_ensemble_inventory, map_generator,
    map_storage_settings,
};
use crate::envoy::map_home::map_home;
use crate::envoy::map_info::map_info;
use crate::envoy::map_inventory::{installed, map_inventory, map_pcu_power};
use crate::envoy::map_live_data::map_live_data;
use crate::envoy::map_meters::{apply_meter_data, map_meters};
use crate::envoy::map_production::{ProductionSources, merge_power_and_energy};
use crate::envoy::map_settings::map_plc_levels;
use crate::envoy::{Access, EnvoyError, endpoints};
use crate::poll::Engine;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

impl Engine {
    pub(super) async fn refresh(&self, category: Category, is_startup: bool) -> Result<(), EnvoyError> {
        match category {
            Category::Home => self.refresh_home().await,
            Category::Inventory => self.refresh_inventory().await,
            Category::Production => self.refresh_production(is_startup).await,
            Category::DeviceData => self.refresh_device_data(is_startup).await,
            Category::Ensemble => self.refresh_ensemble(is_startup).await,
            Category::LiveData => self.refresh_live_data(is_startup).await,
            Category::Settings => self.refresh_settings(is_startup).await,
        }
    }

    #[instrument(skip_all)]
    pub(super) async fn refresh_info(&self) -> Result<Info, EnvoyError> {
        let raw: InfoGet = self.client.get_xml(endpoints::INFO).await?;
        let info = map_info(raw).map_err(|e| EnvoyError::parse(endpoints::INFO, e))?;

        self.store.update(|tree| tree.info = info.clone()).await;
        self.store.update_capabilities(|capabilities| capabilities.info.prove()).await;
        info!(
            serial_number = %info.serial_number,
            firmware = info.firmware,
            "📟 Gateway runs {}, token {}",
            info.software,
            if info.token_required { "required" } else { "not required" }
        );
        Ok(info)
    }

    /// Home is always fetched, it tells which device families are present at all.
    #[instrument(skip_all)]
    pub(super) async fn refresh_home(&self) -> Result<(), EnvoyError> {
        let raw: HomeGet = self.client.get_json(endpoints::HOME, Access::Open).await?;
        let home = map_home(raw);

        self.store
            .update_capabilities(|capabilities| {
                capabilities.home.prove();
                let families = [
                    (&mut capabilities.pcus, home.comm.pcu.num),
                    (&mut capabilities.acbs, home.comm.acb.num),
                    (&mut capabilities.nsrbs, home.comm.nsrb.num),
                    (&mut capabilities.esubs, home.comm.esub.num),
                ];
                for (capability, count) in families {
                    if count > 0 {
                        capability.prove();
                    }
                }
                if home.enpower.is_some() {
                    capabilities.esubs.prove();
                }
            })
            .await;

        self.publish(Category::Home, &home);
        self.store.update(|tree| tree.home = home).await;
        Ok(())
    }

    #[instrument(skip_all)]
    pub(super) async fn refresh_inventory(&self) -> Result<(), EnvoyError> {
        let groups: Vec<InventoryGroup> = self.client.get_json(endpoints::INVENTORY, Access::Open).await?;
        let inventory = self
            .store
            .update(|tree| {
                let inventory = map_inventory(groups, tree.grid_profile.as_deref());
                tree.inventory = inventory.clone();
                inventory
            })
            .await;

        self.store
            .update_capabilities(|capabilities| {
                capabilities.inventory.prove();
                let families = [
                    (&mut capabilities.pcus, &inventory.pcus),
                    (&mut capabilities.acbs, &inventory.acbs),
                    (&mut capabilities.nsrbs, &inventory.nsrbs),
                    (&mut capabilities.esubs, &inventory.esubs),
                ];
                for (capability, devices) in families {
                    if !devices.is_empty() {
                        capability.prove();
                    }
                    capability.record(installed(devices), devices.len());
                }
            })
            .await;

        debug!(
            pcus = inventory.pcus.len(),
            acbs = inventory.acbs.len(),
            nsrbs = inventory.nsrbs.len(),
            esubs = inventory.esubs.len(),
            "📦 Inventory refreshed"
        );
        self.publish(Category::Inventory, &inventory);
        Ok(())
    }

    #[instrument(skip_all)]
    pub(super) async fn refresh_production(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let capabilities = self.store.capabilities().await;
        let firmware = self.store.read(|tree| tree.info.firmware).await;

        let pcu_power = self
            .fetch::<Vec<PcuPowerGet>>(
                endpoints::PCU_POWER,
                Access::Digest(DigestRole::Envoy),
                capabilities.pcu_power.is_proven(),
                is_startup,
            )
            .await?;
        if let Some(readings) = pcu_power {
            self.store.update_capabilities(|capabilities| capabilities.pcu_power.prove()).await;
            self.store
                .update(|tree| tree.pcu_power = map_pcu_power(readings, &tree.pcu_power))
                .await;
        }

        let meters = self.refresh_meters(is_startup).await?;

        let (legacy, pdm, energy) = if firmware >= self.config.envoy().firmware_production_threshold() {
            let pdm = self
                .fetch::<ProductionPdmGet>(endpoints::PRODUCTION_PDM, Access::Open, capabilities.production.pdm.is_proven(), is_startup)
                .await?;
            let energy = self
                .fetch::<EnergyPdmGet>(
                    endpoints::ENERGY_PDM,
                    Access::Open,
                    capabilities.production.energy_pdm.is_proven(),
                    is_startup,
                )
                .await?;
            (None, pdm, energy)
        } else {
            let legacy = self
                .fetch::<ProductionGet>(endpoints::PRODUCTION, Access::Open, capabilities.production.legacy.is_proven(), is_startup)
                .await?;
            (legacy, None, None)
        };

        let batteries_or_meters = self.store.capabilities().await.batteries_or_meters();
        let statistics = if batteries_or_meters {
            self.fetch::<ProductionStatisticsGet>(
                endpoints::PRODUCTION_STATISTICS,
                Access::Open,
                capabilities.production.statistics.is_proven(),
                is_startup,
            )
            .await?
        } else {
            None
        };

        self.store
            .update_capabilities(|capabilities| {
                let production = &mut capabilities.production;
                for (support, fetched) in [
                    (&mut production.legacy, legacy.is_some()),
                    (&mut production.pdm, pdm.is_some()),
                    (&mut production.energy_pdm, energy.is_some()),
                    (&mut production.statistics, statistics.is_some()),
                ] {
                    if fetched {
                        support.prove();
                    }
                }
            })
            .await;

        let offsets = *self.config.energy_offsets();
        let power_and_energy = self
            .store
            .update(|tree| {
                let sources = ProductionSources {
                    meters: &meters,
                    pcu_power: Some(&tree.pcu_power),
                    legacy,
                    pdm,
                    energy,
                    statistics,
                };
                tree.power_and_energy = merge_power_and_energy(&sources, &tree.power_and_energy, &offsets);
                tree.power_and_energy.clone()
            })
            .await;

        self.persist_energy_baseline(power_and_energy.production.energy_lifetime_kwh).await;
        self.publish(Category::Production, &power_and_energy);
        Ok(())
    }

    /// Meter configuration, then readings and reports of the enabled meters. Returns the meters as
    /// stored, the cached ones when the configuration was not fetched.
    async fn refresh_meters(&self, is_startup: bool) -> Result<Vec<Meter>, EnvoyError> {
        let capabilities = self.store.capabilities().await.meters;

        let configs = self
            .fetch::<Vec<MeterGet>>(endpoints::METERS, Access::Open, capabilities.config.supported(), is_startup)
            .await?;
        let Some(configs) = configs else {
            return Ok(self.store.read(|tree| tree.meters.clone()).await);
        };

        let previous = self.store.read(|tree| tree.meters.clone()).await;
        let mut meters = map_meters(configs, &previous);

        let (readings, reports) = if meters.iter().any(|meter| meter.enabled) {
            let readings = self
                .fetch::<Vec<MeterReadingGet>>(endpoints::METER_READINGS, Access::Open, capabilities.readings.is_proven(), is_startup)
                .await?;
            let reports = self
                .fetch::<Vec<MeterReportGet>>(endpoints::METER_REPORTS, Access::Open, capabilities.reports.is_proven(), is_startup)
                .await?;
            (readings, reports)
        } else {
            (None, None)
        };
        apply_meter_data(&mut meters, readings.as_deref(), reports.as_deref());

        self.store
            .update_capabilities(|capabilities| {
                record_meters(&mut capabilities.meters, &meters);
                if readings.is_some() {
                    capabilities.meters.readings.prove();
                }
                if reports.is_some() {
                    capabilities.meters.reports.prove();
                }
            })
            .await;
        self.store.update(|tree| tree.meters = meters.clone()).await;
        Ok(meters)
    }

    async fn persist_energy_baseline(&self, energy_lifetime_kwh: f64) {
        let Some(files) = self.files() else {
            return;
        };
        if !energy_lifetime_kwh.is_finite() || energy_lifetime_kwh <= 0.0 {
            return;
        }
        if let Err(e) = files.write_energy_baseline(energy_lifetime_kwh).await {
            warn!("⚠️ Could not persist the energy baseline: {}", e);
        }
    }

    #[instrument(skip_all)]
    pub(super) async fn refresh_device_data(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let supported = self.store.capabilities().await.device_data.is_proven();
        let Some(feed) = self
            .fetch::<Value>(endpoints::DEVICE_DATA, Access::Digest(DigestRole::Envoy), supported, is_startup)
            .await?
        else {
            return Ok(());
        };

        self.store.update_capabilities(|capabilities| capabilities.device_data.prove()).await;
        let details = self
            .store
            .update(|tree| {
                tree.device_details = map_device_data(feed, &tree.device_details);
                tree.device_details.clone()
            })
            .await;
        self.publish(Category::DeviceData, &details);
        Ok(())
    }

    /// Ensemble inventory first, the other ensemble endpoints only once it answered. Settings and
    /// tariff need batteries, dry contacts and the generator need a smart switch.
    #[instrument(skip_all)]
    pub(super) async fn refresh_ensemble(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let capabilities = self.store.capabilities().await;
        if !self.has_token() || !capabilities.esubs.supported() {
            return Ok(());
        }
        let access = Access::Digest(DigestRole::Envoy);
        let supported = &capabilities.ensemble;

        let Some(groups) = self
            .fetch::<Vec<EnsembleGroup>>(endpoints::ENSEMBLE_INVENTORY, access, supported.inventory.is_proven(), is_startup)
            .await?
        else {
            return Ok(());
        };

        let previous = self.store.read(|tree| tree.ensemble.clone()).await;
        let mut devices = map_ensemble_inventory(groups, &previous.devices);
        let count = |kind| devices.values().filter(|device| device.kind == kind).count();
        let (encharges, enpowers) = (count(EnsembleDeviceKind::Encharge), count(EnsembleDeviceKind::Enpower));

        let status = self
            .fetch::<EnsembleStatusGet>(endpoints::ENSEMBLE_STATUS, access, supported.status.is_proven(), is_startup)
            .await?;
        let status_fetched = status.is_some();
        let relay = status.and_then(|status| apply_ensemble_status(&mut devices, status));

        let power = self
            .fetch::<EnsemblePowerGet>(endpoints::ENSEMBLE_POWER, access, supported.power.is_proven(), is_startup)
            .await?;
        let power_fetched = power.is_some();
        if let Some(power) = power {
            apply_ensemble_power(&mut devices, power);
        }

        let (encharge_settings, tariff) = if encharges > 0 {
            let settings = self
                .fetch::<EnchargeSettingsGet>(endpoints::ENCHARGE_SETTINGS, access, supported.settings.is_proven(), is_startup)
                .await?;
            let tariff = self
                .fetch::<TariffGet>(endpoints::TARIFF, access, supported.tariff.is_proven(), is_startup)
                .await?;
            (settings, tariff)
        } else {
            (None, None)
        };

        let (contacts, contact_settings, generator, generator_settings) = if enpowers > 0 {
            let contacts = self
                .fetch::<DryContactsGet>(endpoints::DRY_CONTACTS, access, supported.dry_contacts.is_proven(), is_startup)
                .await?;
            let contact_settings = match contacts {
                Some(_) => {
                    self.fetch::<DryContactSettingsGet>(
                        endpoints::DRY_CONTACT_SETTINGS,
                        access,
                        supported.dry_contact_settings.is_proven(),
                        is_startup,
                    )
                    .await?
                }
                None => None,
            };
            let generator = self
                .fetch::<GeneratorGet>(endpoints::GENERATOR, access, supported.generator.is_proven(), is_startup)
                .await?;
            let generator_settings = match generator {
                Some(_) => {
                    self.fetch::<GeneratorSettingsGet>(
                        endpoints::GENERATOR_SETTINGS,
                        access,
                        supported.generator_settings.is_proven(),
                        is_startup,
                    )
                    .await?
                }
                None => None,
            };
            (contacts, contact_settings, generator, generator_settings)
        } else {
            (None, None, None, None)
        };

        self.store
            .update_capabilities(|capabilities| {
                let ensemble = &mut capabilities.ensemble;
                ensemble.inventory.prove();
                for (support, fetched) in [
                    (&mut ensemble.status, status_fetched),
                    (&mut ensemble.power, power_fetched),
                    (&mut ensemble.settings, encharge_settings.is_some()),
                    (&mut ensemble.tariff, tariff.is_some()),
                    (&mut ensemble.dry_contacts, contacts.is_some()),
                    (&mut ensemble.dry_contact_settings, contact_settings.is_some()),
                    (&mut ensemble.generator, generator.is_some()),
                    (&mut ensemble.generator_settings, generator_settings.is_some()),
                ] {
                    if fetched {
                        support.prove();
                    }
                }
                for (capability, count) in [(&mut ensemble.encharges, encharges), (&mut ensemble.enpowers, enpowers)] {
                    if count > 0 {
                        capability.prove();
                    }
                    capability.record(count > 0, count);
                }
            })
            .await;

        let ensemble = Ensemble {
            devices,
            relay: relay.or(previous.relay),
            encharge_settings: encharge_settings.map(map_encharge_settings).or(previous.encharge_settings),
            storage_settings: tariff.and_then(map_storage_settings).or(previous.storage_settings),
            dry_contacts: match contacts {
                Some(contacts) => map_dry_contacts(contacts, contact_settings),
                None => previous.dry_contacts,
            },
            generator: match generator {
                Some(generator) => map_generator(generator, generator_settings),
                None => previous.generator,
            },
        };

        self.publish(Category::Ensemble, &ensemble);
        self.store.update(|tree| tree.ensemble = ensemble).await;
        Ok(())
    }

    #[instrument(skip_all)]
    pub(super) async fn refresh_settings(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let capabilities = self.store.capabilities().await;

        let grid_profile = self
            .fetch::<GridProfileGet>(
                endpoints::GRID_PROFILE,
                Access::Digest(DigestRole::Installer),
                capabilities.grid_profile.is_proven(),
                is_startup,
            )
            .await?
            .and_then(|grid| grid.selected_profile);
        if let Some(profile) = &grid_profile {
            self.store.update_capabilities(|capabilities| capabilities.grid_profile.prove()).await;
            self.store.update(|tree| tree.grid_profile = Some(profile.clone())).await;
        }

        let levels = self
            .request::<PlcLevelGet>(
                Method::POST,
                endpoints::PLC_LEVEL,
                Access::Installer,
                capabilities.plc_level.is_proven(),
                is_startup,
            )
            .await?;
        if let Some(levels) = levels {
            self.store.update_capabilities(|capabilities| capabilities.plc_level.prove()).await;
            self.store.update(|tree| tree.plc_levels = map_plc_levels(levels)).await;
        }

        // Discovery reads the production state right after authenticating.
        if !is_startup {
            self.refresh_production_state(false).await?;
        }

        let settings = self
            .store
            .read(|tree| {
                json!({
                    "gridProfile": tree.grid_profile,
                    "plcLevels": tree.plc_levels,
                    "productionEnabled": tree.production_enabled,
                })
            })
            .await;
        self.publish(Category::Settings, &settings);
        Ok(())
    }

    /// Needs the device id, skipped without one.
    pub(super) async fn refresh_production_state(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let Some(device_id) = self.device_id() else {
            return Ok(());
        };
        let supported = self.store.capabilities().await.production_state.is_proven();

        let mode = self
            .fetch::<PowerModeGet>(
                &endpoints::power_mode(&device_id),
                Access::Digest(DigestRole::Installer),
                supported,
                is_startup,
            )
            .await?;
        if let Some(mode) = mode {
            self.store.update_capabilities(|capabilities| capabilities.production_state.prove()).await;
            self.store.update(|tree| tree.production_enabled = Some(!mode.power_forced_off)).await;
        }
        Ok(())
    }

    /// At startup a stopped live stream is switched on when the token allows it.
    #[instrument(skip_all)]
    pub(super) async fn refresh_live_data(&self, is_startup: bool) -> Result<(), EnvoyError> {
        let capabilities = self.store.capabilities().await;
        if !self.has_token() || !(capabilities.meters.any_enabled() || capabilities.ensemble.inventory.is_proven()) {
            return Ok(());
        }

        let Some(raw) = self
            .fetch::<LiveDataGet>(
                endpoints::LIVE_DATA_STATUS,
                Access::Digest(DigestRole::Envoy),
                capabilities.live_data.is_proven(),
                is_startup,
            )
            .await?
        else {
            return Ok(());
        };
        self.store.update_capabilities(|capabilities| capabilities.live_data.prove()).await;

        let installer_grade = self
            .client
            .credential()
            .token_manager()
            .is_some_and(|tokens| tokens.is_installer_grade());
        if is_startup && !raw.connection.is_streaming() && installer_grade {
            let body = json!({ "enable": 1 });
            match self
                .client
                .write_json(Method::POST, endpoints::LIVE_DATA_STREAM, Access::Installer, &body)
                .await
            {
                Ok(()) => info!("📡 Enabling the live data stream... OK"),
                Err(e) => warn!("⚠️ Enabling the live data stream... failed, {}", e),
            }
        }

        let live_data = map_live_data(raw);
        self.publish(Category::LiveData, &live_data);
        self.store.update(|tree| tree.live_data = Some(live_data)).await;
        Ok(())
    }
}

fn record_meters(capabilities: &mut MeterCapabilities, meters: &[Meter]) {
    capabilities.config.prove();
    capabilities.config.record(meters.iter().any(|meter| meter.enabled), meters.len());

    let kinds = [
        (MeasurementKind::Production, &mut capabilities.production),
        (MeasurementKind::NetConsumption, &mut capabilities.net_consumption),
        (MeasurementKind::TotalConsumption, &mut capabilities.total_consumption),
        (MeasurementKind::Storage, &mut capabilities.storage),
    ];
    for (kind, capability) in kinds {
        match meters.iter().find(|meter| meter.kind == kind) {
            Some(meter) => {
                capability.prove();
                capability.record(meter.enabled, 1);
            }
            None => capability.record(false, 0),
        }
    }
}
