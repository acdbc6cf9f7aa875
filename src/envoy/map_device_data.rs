use crate::domain::telemetry::DeviceDetail;
use crate::envoy::domain::device_data::DeviceDataEntry;
use crate::extensions::f64_ext::{UnitConversions, prefer_finite};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

const JOULES_PER_KWH: f64 = 3_600_000.0;

/// Maps the detailed devices feed by serial number. Keys that are not device entries are skipped.
pub fn map_device_data(feed: Value, previous: &BTreeMap<String, DeviceDetail>) -> BTreeMap<String, DeviceDetail> {
    let Value::Object(entries) = feed else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(key, entry)| match serde_json::from_value::<DeviceDataEntry>(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                trace!(key = %key, "Skipping device data entry: {}", e);
                None
            }
        })
        .map(|entry| {
            let detail = map_entry(&entry, previous.get(&entry.sn));
            (entry.sn, detail)
        })
        .collect()
}

fn map_entry(entry: &DeviceDataEntry, previous: Option<&DeviceDetail>) -> DeviceDetail {
    let cached = previous.cloned().unwrap_or_default();
    let Some(channel) = entry.channels.first() else {
        return DeviceDetail {
            kind: entry.dev_name.clone(),
            active: entry.active,
            ..cached
        };
    };
    let reading = channel.last_reading.as_ref();

    let power_w = prefer_finite([channel.watts.now], cached.power_w);
    DeviceDetail {
        kind: entry.dev_name.clone(),
        active: entry.active,
        reading_time: reading.and_then(|reading| reading.end_date).or(cached.reading_time),
        power_w,
        power_peak_w: [cached.power_peak_w, power_w, channel.watts.max.unwrap_or(0.0)]
            .into_iter()
            .filter(|value| value.is_finite())
            .fold(0.0, f64::max),
        energy_today_kwh: prefer_finite([channel.watt_hours.today.map(f64::to_kilo)], cached.energy_today_kwh),
        energy_yesterday_kwh: prefer_finite([channel.watt_hours.yesterday.map(f64::to_kilo)], cached.energy_yesterday_kwh),
        energy_last_seven_days_kwh: prefer_finite([channel.watt_hours.week.map(f64::to_kilo)], cached.energy_last_seven_days_kwh),
        energy_lifetime_kwh: prefer_finite(
            [channel.lifetime.as_ref().and_then(|lifetime| lifetime.joules_produced).map(|joules| joules / JOULES_PER_KWH)],
            cached.energy_lifetime_kwh,
        ),
        ac_voltage_v: reading.and_then(|reading| reading.ac_voltage_mv).map(f64::from_milli).or(cached.ac_voltage_v),
        ac_frequency_hz: reading.and_then(|reading| reading.ac_frequency_mhz).map(f64::from_milli).or(cached.ac_frequency_hz),
        dc_voltage_v: reading.and_then(|reading| reading.dc_voltage_mv).map(f64::from_milli).or(cached.dc_voltage_v),
        dc_current_a: reading.and_then(|reading| reading.dc_current_ma).map(f64::from_milli).or(cached.dc_current_a),
        temperature_c: reading.and_then(|reading| reading.channel_temp).or(cached.temperature_c),
    }
}
