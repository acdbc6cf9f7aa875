use crate::domain::category::Category;
use serde::Serialize;

/// A support flag that can only ever be raised. Once an endpoint has answered, it stays supported
/// for the lifetime of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Support(bool);

impl Support {
    pub fn prove(&mut self) {
        self.0 = true;
    }

    pub fn is_proven(&self) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capability {
    supported: Support,
    pub installed: bool,
    pub count: usize,
}

impl Capability {
    pub fn supported(&self) -> bool {
        self.supported.is_proven()
    }

    pub fn prove(&mut self) {
        self.supported.prove();
    }

    /// Recomputed on every discovery or refresh pass, unlike `supported`.
    pub fn record(&mut self, installed: bool, count: usize) {
        self.installed = installed;
        self.count = count;
    }

    pub fn is_present(&self) -> bool {
        self.supported() && self.count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeterCapabilities {
    pub config: Capability,
    pub readings: Support,
    pub reports: Support,
    pub production: Capability,
    pub net_consumption: Capability,
    pub total_consumption: Capability,
    pub storage: Capability,
}

impl MeterCapabilities {
    pub fn any_enabled(&self) -> bool {
        self.config.supported() && self.config.installed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionCapabilities {
    pub legacy: Support,
    pub pdm: Support,
    pub energy_pdm: Support,
    pub statistics: Support,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnsembleCapabilities {
    pub inventory: Support,
    pub status: Support,
    pub power: Support,
    pub settings: Support,
    pub tariff: Support,
    pub dry_contacts: Support,
    pub dry_contact_settings: Support,
    pub generator: Support,
    pub generator_settings: Support,
    pub encharges: Capability,
    pub enpowers: Capability,
}

/// Which optional endpoints and device families this gateway has proven to support.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityMap {
    pub info: Support,
    pub home: Support,
    pub inventory: Support,
    pub pcus: Capability,
    pub acbs: Capability,
    pub nsrbs: Capability,
    pub esubs: Capability,
    pub pcu_power: Support,
    pub meters: MeterCapabilities,
    pub device_data: Support,
    pub production: ProductionCapabilities,
    pub ensemble: EnsembleCapabilities,
    pub device_id: Support,
    pub production_state: Support,
    pub grid_profile: Support,
    pub plc_level: Support,
    pub live_data: Support,
}

impl CapabilityMap {
    pub fn batteries_or_meters(&self) -> bool {
        self.acbs.is_present() || self.meters.any_enabled()
    }

    pub fn is_supported(&self, category: Category) -> bool {
        match category {
            Category::Home => self.home.is_proven(),
            Category::Inventory => self.inventory.is_proven(),
            Category::Production => {
                self.meters.config.supported()
                    || self.production.legacy.is_proven()
                    || self.production.pdm.is_proven()
                    || self.production.energy_pdm.is_proven()
                    || self.production.statistics.is_proven()
                    || self.pcu_power.is_proven()
            }
            Category::DeviceData => self.device_data.is_proven(),
            Category::Ensemble => self.ensemble.inventory.is_proven(),
            Category::LiveData => self.live_data.is_proven(),
            Category::Settings => self.grid_profile.is_proven() || self.plc_level.is_proven() || self.production_state.is_proven(),
        }
    }

    pub fn supported_categories(&self, enabled: &[Category]) -> Vec<Category> {
        enabled.iter().copied().filter(|category| self.is_supported(*category)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_never_reverts() {
        let mut support = Support::default();
        assert!(!support.is_proven());

        support.prove();
        support.prove();

        assert!(support.is_proven());
    }

    #[test]
    fn recording_a_capability_keeps_it_supported() {
        let mut capability = Capability::default();
        capability.prove();
        capability.record(true, 12);

        capability.record(false, 0);

        assert!(capability.supported());
        assert!(!capability.installed);
        assert_eq!(capability.count, 0);
        assert!(!capability.is_present());
    }

    #[test]
    fn supported_categories_only_lists_enabled_and_proven_categories() {
        let mut capabilities = CapabilityMap::default();
        capabilities.home.prove();
        capabilities.inventory.prove();
        capabilities.production.legacy.prove();
        capabilities.plc_level.prove();

        let categories = capabilities.supported_categories(&Category::METER_ONLY);

        assert_eq!(categories, vec![Category::Home, Category::Production]);
        assert_eq!(
            capabilities.supported_categories(&Category::ALL),
            vec![Category::Home, Category::Inventory, Category::Production, Category::Settings]
        );
    }
}
