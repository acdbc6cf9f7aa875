use crate::domain::measurement::device_status;
use crate::domain::telemetry::{DeviceKind, Inventory, InventoryDevice, PcuPower};
use crate::envoy::domain::inventory::{InventoryDeviceGet, InventoryGroup, PcuPowerGet};
use crate::extensions::f64_ext::prefer_finite;
use std::collections::BTreeMap;
use tracing::debug;

/// Maps the inventory groups, skipping deleted devices. Every device carries the grid profile the
/// settings refresh last read.
pub fn map_inventory(groups: Vec<InventoryGroup>, grid_profile: Option<&str>) -> Inventory {
    let mut inventory = Inventory::default();

    for group in groups {
        let (kind, devices) = match group.kind.as_str() {
            "PCU" => (DeviceKind::Pcu, &mut inventory.pcus),
            "ACB" => (DeviceKind::Acb, &mut inventory.acbs),
            "NSRB" => (DeviceKind::Nsrb, &mut inventory.nsrbs),
            "ESUB" => (DeviceKind::Esub, &mut inventory.esubs),
            other => {
                debug!("Skipping unknown inventory group '{}'", other);
                continue;
            }
        };

        for device in group.devices.into_iter().filter(|device| device.deleted != Some(true)) {
            let device = map_device(device, kind, grid_profile.map(str::to_string));
            devices.insert(device.serial_number.clone(), device);
        }
    }

    inventory
}

fn map_device(device: InventoryDeviceGet, kind: DeviceKind, grid_profile: Option<String>) -> InventoryDevice {
    InventoryDevice {
        part_number: device.part_num,
        kind,
        installed: device.installed,
        last_report: device.last_rpt_date,
        admin_state: device.admin_state,
        device_status: device.device_status.iter().map(|code| device_status(code).to_string()).collect(),
        producing: device.producing,
        communicating: device.communicating,
        provisioned: device.provisioned,
        operating: device.operating,
        firmware: device.img_pnum_running,
        gfi_clear: device.device_control.first().and_then(|control| control.gficlearset),
        relay: device.relay,
        percent_full: device.percent_full,
        temperature: device.temperature,
        charge_status: device.charge_status,
        grid_profile,
        serial_number: device.serial_num,
    }
}

/// Installed once at least one device of the family is active.
pub fn installed(devices: &BTreeMap<String, InventoryDevice>) -> bool {
    devices.values().any(InventoryDevice::is_active)
}

/// Per-inverter power, keeping the highest power seen per inverter.
pub fn map_pcu_power(readings: Vec<PcuPowerGet>, previous: &BTreeMap<String, PcuPower>) -> BTreeMap<String, PcuPower> {
    readings
        .into_iter()
        .map(|reading| {
            let cached = previous.get(&reading.serial_number).copied().unwrap_or_default();
            let power_w = prefer_finite([reading.last_report_watts], cached.power_w);
            let power_peak_w = [cached.power_peak_w, power_w, reading.max_report_watts.unwrap_or(0.0)]
                .into_iter()
                .filter(|value| value.is_finite())
                .fold(0.0, f64::max);

            let power = PcuPower {
                last_report_date: reading.last_report_date,
                power_w,
                power_peak_w,
            };
            (reading.serial_number, power)
        })
        .collect()
}
