use crate::domain::measurement::device_status;
use crate::domain::telemetry::{
    DryContact, EnchargeSettings, EnsembleDevice, EnsembleDeviceKind, EnsembleDevicePower, EnsembleDeviceStatus, Generator,
    GeneratorSettings, RelayState, StorageSettings,
};
use crate::envoy::domain::ensemble::{
    DryContactSettingsGet, DryContactsGet, EnchargeSettingsGet, EnsembleGroup, EnsemblePowerGet, EnsembleStatusGet, GeneratorGet,
    GeneratorSettingsGet, RelayGet, TariffGet,
};
use crate::extensions::f64_ext::UnitConversions;
use std::collections::BTreeMap;
use tracing::debug;

/// Maps the ensemble inventory. Status and power blocks of devices already known are carried over
/// until the next status and power fetches replace them.
pub fn map_ensemble_inventory(groups: Vec<EnsembleGroup>, previous: &BTreeMap<String, EnsembleDevice>) -> BTreeMap<String, EnsembleDevice> {
    let mut devices = BTreeMap::new();

    for group in groups {
        let kind = match group.kind.as_str() {
            "ENCHARGE" => EnsembleDeviceKind::Encharge,
            "ENPOWER" => EnsembleDeviceKind::Enpower,
            other => {
                debug!("Skipping unknown ensemble group '{}'", other);
                continue;
            }
        };

        for device in group.devices {
            let known = previous.get(&device.serial_num);
            let device = EnsembleDevice {
                part_number: device.part_num,
                kind,
                installed: device.installed,
                device_status: device.device_status.iter().map(|code| device_status(code).to_string()).collect(),
                communicating: device.communicating,
                admin_state: device.admin_state,
                percent_full: device.percent_full,
                temperature: device.temperature,
                status: known.and_then(|known| known.status.clone()),
                power: known.and_then(|known| known.power),
                serial_number: device.serial_num,
            };
            devices.insert(device.serial_number.clone(), device);
        }
    }

    devices
}

/// Attaches status blocks by serial number; status for devices not in the inventory is ignored.
pub fn apply_ensemble_status(devices: &mut BTreeMap<String, EnsembleDevice>, status: EnsembleStatusGet) -> Option<RelayState> {
    for (serial_number, block) in status.inventory.serial_nums {
        let Some(device) = devices.get_mut(&serial_number) else {
            continue;
        };
        if block.percent_full.is_some() {
            device.percent_full = block.percent_full;
        }
        device.status = Some(EnsembleDeviceStatus {
            device_type: block.device_type,
            com_interface: block.comm_interface,
            admin_state: block.admin_state,
            comm_level_sub_ghz: block.comm_level_sub_ghz,
            comm_level_2_4_ghz: block.comm_level_2_4_ghz,
            temperature: block.reported_temperature,
            percent_full: block.percent_full,
            dc_switch_off: block.dc_switch_off,
        });
    }

    status.relay.map(map_relay)
}

pub fn map_relay(relay: RelayGet) -> RelayState {
    RelayState {
        grid_connected: relay.mains_oper_state == "closed",
        mains_admin_state: relay.mains_admin_state,
        mains_oper_state: relay.mains_oper_state,
    }
}

pub fn apply_ensemble_power(devices: &mut BTreeMap<String, EnsembleDevice>, power: EnsemblePowerGet) {
    for reading in power.devices {
        if let Some(device) = devices.get_mut(&reading.serial_num) {
            device.power = Some(EnsembleDevicePower {
                real_power_w: reading.real_power_mw.from_milli(),
                apparent_power_va: reading.apparent_power_mva.from_milli(),
                soc: reading.soc,
            });
        }
    }
}

pub fn map_encharge_settings(settings: EnchargeSettingsGet) -> EnchargeSettings {
    EnchargeSettings {
        enabled: settings.enc_settings.enable,
        country: settings.enc_settings.country,
        current_limit: settings.enc_settings.current_limit,
        per_phase: settings.enc_settings.per_phase,
    }
}

pub fn map_storage_settings(tariff: TariffGet) -> Option<StorageSettings> {
    tariff.tariff.storage_settings.map(|settings| StorageSettings {
        profile: settings.mode,
        reserved_soc: settings.reserved_soc,
        very_low_soc: settings.very_low_soc,
        charge_from_grid: settings.charge_from_grid,
    })
}

/// Joins contact states with their settings by contact id.
pub fn map_dry_contacts(contacts: DryContactsGet, settings: Option<DryContactSettingsGet>) -> Vec<DryContact> {
    let mut settings: BTreeMap<_, _> = settings
        .map(|settings| settings.dry_contacts)
        .unwrap_or_default()
        .into_iter()
        .map(|settings| (settings.id.clone(), settings))
        .collect();

    contacts
        .dry_contacts
        .into_iter()
        .map(|contact| DryContact {
            settings: settings.remove(&contact.id),
            id: contact.id,
            status: contact.status,
        })
        .collect()
}

/// `None` when the gateway reports that no generator is connected.
pub fn map_generator(generator: GeneratorGet, settings: Option<GeneratorSettingsGet>) -> Option<Generator> {
    if generator.present == Some(false) {
        return None;
    }

    Some(Generator {
        admin_state: generator.admin_state,
        oper_state: generator.oper_state,
        admin_mode: generator.admin_mode,
        rated_power_w: generator.rated_power,
        settings: settings.map(|settings| GeneratorSettings {
            max_continuous_power_w: settings.max_cont_power,
            nominal_voltage_v: settings.nominal_voltage,
            nominal_frequency_hz: settings.nominal_frequency,
            auto_start: settings.auto_gen_start,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::StorageProfile;
    use pretty_assertions::assert_eq;

    fn devices() -> BTreeMap<String, EnsembleDevice> {
        let groups: Vec<EnsembleGroup> = serde_json::from_str(include_str!("../../tests/resources/envoy/ensemble_inventory.json")).unwrap();
        map_ensemble_inventory(groups, &BTreeMap::new())
    }

    #[test]
    fn maps_encharges_and_enpowers() {
        let devices = devices();

        assert_eq!(devices.len(), 2);
        let encharge = &devices["482201011111"];
        assert_eq!(encharge.kind, EnsembleDeviceKind::Encharge);
        assert_eq!(encharge.percent_full, Some(81));
        assert_eq!(encharge.device_status, vec!["OK".to_string(), "Propagation Done".to_string()]);
        assert_eq!(devices["482202022222"].kind, EnsembleDeviceKind::Enpower);
    }

    #[test]
    fn status_enriches_devices_by_serial_number() {
        let mut devices = devices();
        let status: EnsembleStatusGet = serde_json::from_str(include_str!("../../tests/resources/envoy/ensemble_status.json")).unwrap();

        let relay = apply_ensemble_status(&mut devices, status);

        assert_eq!(devices.len(), 2);
        let encharge = &devices["482201011111"];
        assert_eq!(encharge.percent_full, Some(82));
        let status = encharge.status.as_ref().unwrap();
        assert_eq!(status.com_interface.as_deref(), Some("RADIO"));
        assert_eq!(status.temperature, Some(24.0));
        assert_eq!(devices["482202022222"].status, None);
        assert_eq!(
            relay,
            Some(RelayState {
                mains_admin_state: "closed".to_string(),
                mains_oper_state: "closed".to_string(),
                grid_connected: true,
            })
        );
    }

    #[test]
    fn power_is_converted_from_milliwatts() {
        let mut devices = devices();
        let power: EnsemblePowerGet = serde_json::from_str(include_str!("../../tests/resources/envoy/ensemble_power.json")).unwrap();

        apply_ensemble_power(&mut devices, power);

        assert_eq!(
            devices["482201011111"].power,
            Some(EnsembleDevicePower {
                real_power_w: -1250.0,
                apparent_power_va: 1310.0,
                soc: Some(82),
            })
        );
    }

    #[test]
    fn inventory_refresh_keeps_status_and_power() {
        let mut previous = devices();
        apply_ensemble_power(
            &mut previous,
            serde_json::from_str(include_str!("../../tests/resources/envoy/ensemble_power.json")).unwrap(),
        );
        let groups: Vec<EnsembleGroup> = serde_json::from_str(include_str!("../../tests/resources/envoy/ensemble_inventory.json")).unwrap();

        let devices = map_ensemble_inventory(groups, &previous);

        assert_eq!(devices["482201011111"].power, previous["482201011111"].power);
    }

    #[test]
    fn dry_contacts_are_joined_with_their_settings() {
        let contacts: DryContactsGet =
            serde_json::from_str(r#"{"dry_contacts":[{"id":"NC1","status":"closed"},{"id":"NO1","status":"open"}]}"#).unwrap();
        let settings: DryContactSettingsGet =
            serde_json::from_str(r#"{"dry_contacts":[{"id":"NC1","type":"NC","load_name":"Pool pump","mode":"manual","soc_low":25.0}]}"#).unwrap();

        let contacts = map_dry_contacts(contacts, Some(settings));

        assert!(contacts[0].is_closed());
        let settings = contacts[0].settings.as_ref().unwrap();
        assert_eq!(settings.load_name.as_deref(), Some("Pool pump"));
        assert_eq!(settings.contact_type.as_deref(), Some("NC"));
        assert_eq!(contacts[1].settings, None);
    }

    #[test]
    fn storage_settings_come_from_the_tariff() {
        let tariff: TariffGet = serde_json::from_str(
            r#"{"tariff":{"currency":{"code":"USD"},"storage_settings":{"mode":"self-consumption","reserved_soc":30.0,"very_low_soc":5,"charge_from_grid":false}}}"#,
        )
        .unwrap();

        let settings = map_storage_settings(tariff).unwrap();

        assert_eq!(settings.profile, StorageProfile::SelfConsumption);
        assert_eq!(settings.reserved_soc, 30.0);
        assert_eq!(settings.very_low_soc, Some(5.0));
    }

    #[test]
    fn absent_generator_maps_to_none() {
        let absent: GeneratorGet = serde_json::from_str(r#"{"admin_state":"off","present":false}"#).unwrap();
        let present: GeneratorGet = serde_json::from_str(r#"{"admin_state":"on","oper_state":"off","admin_mode":"auto"}"#).unwrap();

        assert_eq!(map_generator(absent, None), None);
        assert_eq!(map_generator(present, None).unwrap().admin_mode.as_deref(), Some("auto"));
    }
}
