use crate::app_config::EnergyOffsets;
use crate::domain::measurement::{MeasurementKind, PhaseMode};
use crate::domain::telemetry::{Meter, MeterReading, PcuPower, PowerAndEnergy, SourceFigures, StorageFigures};
use crate::envoy::domain::production::{
    EnergyPdmGet, ProductionGet, ProductionPdmGet, ProductionStatisticsGet, StatisticsEntry, StatisticsValues,
};
use crate::extensions::f64_ext::{UnitConversions, prefer_finite, prefer_finite_opt};
use std::collections::BTreeMap;
use std::iter::once;

/// Everything the production refresh fetched this cycle. Sources that are unsupported or were not
/// fetched are `None`.
#[derive(Debug, Default)]
pub struct ProductionSources<'a> {
    pub meters: &'a [Meter],
    pub pcu_power: Option<&'a BTreeMap<String, PcuPower>>,
    pub legacy: Option<ProductionGet>,
    pub pdm: Option<ProductionPdmGet>,
    pub energy: Option<EnergyPdmGet>,
    pub statistics: Option<ProductionStatisticsGet>,
}

/// Candidate values for one feed, each list ordered from most to least preferred.
struct Candidates {
    reading: Option<MeterReading>,
    reading_time: Vec<Option<i64>>,
    power_w: Vec<Option<f64>>,
    today_kwh: Vec<Option<f64>>,
    seven_days_kwh: Vec<Option<f64>>,
    lifetime_kwh: Vec<Option<f64>>,
    statistics: Option<StatisticsValues>,
}

/// Merges meter readings, aggregate feeds and the previous figures into the power and energy tree.
pub fn merge_power_and_energy(sources: &ProductionSources, previous: &PowerAndEnergy, offsets: &EnergyOffsets) -> PowerAndEnergy {
    let statistics = sources.statistics.as_ref();
    let meter = |kind| sources.meters.iter().find(|meter| meter.kind == kind && meter.enabled);
    let phase_mode = |kind| meter(kind).map(|meter| meter.phase_mode).unwrap_or_default();
    let reading = |kind| meter(kind).and_then(|meter| meter.reading);

    let production = {
        let pdm = sources.pdm.as_ref().and_then(ProductionPdmGet::best);
        let energy = sources.energy.as_ref().and_then(|energy| energy.production.best());
        let legacy = sources.legacy.as_ref();
        let eim = statistics
            .and_then(|statistics| find_entry(&statistics.production, "eim", Some("production")))
            .map(|entry| statistics_totals(entry, phase_mode(MeasurementKind::Production)));
        let inverters = statistics.and_then(|statistics| find_entry(&statistics.production, "inverters", None));
        let pcu_sum = sources
            .pcu_power
            .filter(|power| !power.is_empty())
            .map(|power| power.values().map(|pcu| pcu.power_w).sum::<f64>());

        let candidates = Candidates {
            reading: reading(MeasurementKind::Production),
            reading_time: vec![
                pdm.and_then(|pdm| pdm.reading_time),
                inverters.and_then(|entry| entry.reading_time),
            ],
            power_w: vec![
                pdm.and_then(|pdm| pdm.watts_now),
                legacy.and_then(|legacy| legacy.watts_now),
                eim.as_ref().and_then(|eim| eim.w_now),
                inverters.and_then(|entry| entry.values.w_now),
                pcu_sum,
            ],
            today_kwh: vec![
                energy.and_then(|energy| energy.watt_hours_today),
                legacy.and_then(|legacy| legacy.watt_hours_today),
                eim.as_ref().and_then(|eim| eim.wh_today),
            ],
            seven_days_kwh: vec![
                energy.and_then(|energy| energy.watt_hours_seven_days),
                legacy.and_then(|legacy| legacy.watt_hours_seven_days),
                eim.as_ref().and_then(|eim| eim.wh_last_seven_days),
            ],
            lifetime_kwh: vec![
                energy.and_then(|energy| energy.watt_hours_lifetime),
                legacy.and_then(|legacy| legacy.watt_hours_lifetime),
                eim.as_ref().and_then(|eim| eim.wh_lifetime),
                inverters.and_then(|entry| entry.values.wh_lifetime),
            ],
            statistics: eim,
        };
        merge(MeasurementKind::Production, candidates.in_kilo(), Some(&previous.production), offsets.production_kwh)
    };

    let consumption_net = {
        let net = statistics
            .and_then(|statistics| find_entry(&statistics.consumption, "eim", Some("net-consumption")))
            .map(|entry| (entry.reading_time, statistics_totals(entry, phase_mode(MeasurementKind::NetConsumption))));

        (meter(MeasurementKind::NetConsumption).is_some() || net.is_some()).then(|| {
            let candidates = Candidates {
                reading: reading(MeasurementKind::NetConsumption),
                reading_time: vec![net.as_ref().and_then(|(time, _)| *time)],
                power_w: vec![net.as_ref().and_then(|(_, net)| net.w_now)],
                today_kwh: vec![net.as_ref().and_then(|(_, net)| net.wh_today)],
                seven_days_kwh: vec![net.as_ref().and_then(|(_, net)| net.wh_last_seven_days)],
                lifetime_kwh: vec![net.as_ref().and_then(|(_, net)| net.wh_lifetime)],
                statistics: net.map(|(_, net)| net),
            };
            merge(
                MeasurementKind::NetConsumption,
                candidates.in_kilo(),
                previous.consumption_net.as_ref(),
                offsets.consumption_net_kwh,
            )
        })
    };

    let consumption_total = {
        let energy = sources.energy.as_ref().and_then(|energy| energy.consumption.best());
        let total = statistics
            .and_then(|statistics| find_entry(&statistics.consumption, "eim", Some("total-consumption")))
            .map(|entry| (entry.reading_time, statistics_totals(entry, phase_mode(MeasurementKind::TotalConsumption))));

        (meter(MeasurementKind::TotalConsumption).is_some() || energy.is_some() || total.is_some()).then(|| {
            let candidates = Candidates {
                reading: reading(MeasurementKind::TotalConsumption),
                reading_time: vec![energy.and_then(|energy| energy.reading_time), total.as_ref().and_then(|(time, _)| *time)],
                power_w: vec![energy.and_then(|energy| energy.watts_now), total.as_ref().and_then(|(_, total)| total.w_now)],
                today_kwh: vec![
                    energy.and_then(|energy| energy.watt_hours_today),
                    total.as_ref().and_then(|(_, total)| total.wh_today),
                ],
                seven_days_kwh: vec![
                    energy.and_then(|energy| energy.watt_hours_seven_days),
                    total.as_ref().and_then(|(_, total)| total.wh_last_seven_days),
                ],
                lifetime_kwh: vec![
                    energy.and_then(|energy| energy.watt_hours_lifetime),
                    total.as_ref().and_then(|(_, total)| total.wh_lifetime),
                ],
                statistics: total.map(|(_, total)| total),
            };
            merge(
                MeasurementKind::TotalConsumption,
                candidates.in_kilo(),
                previous.consumption_total.as_ref(),
                offsets.consumption_total_kwh,
            )
        })
    };

    let storage = statistics
        .and_then(|statistics| statistics.storage.iter().find(|entry| entry.kind == "acb"))
        .map(|entry| {
            let cached = previous.storage.clone().unwrap_or_default();
            StorageFigures {
                active_count: entry.active_count,
                reading_time: entry.reading_time.or(cached.reading_time),
                power_w: prefer_finite([entry.w_now], cached.power_w),
                energy_kwh: prefer_finite([entry.wh_now.map(f64::to_kilo)], cached.energy_kwh),
                percent_full: entry.percent_full.or(cached.percent_full),
                state: entry.state.clone().or(cached.state),
            }
        })
        .or_else(|| previous.storage.clone());

    PowerAndEnergy {
        production,
        consumption_net: consumption_net.or_else(|| previous.consumption_net.clone()),
        consumption_total: consumption_total.or_else(|| previous.consumption_total.clone()),
        storage,
    }
}

impl Candidates {
    /// Energy candidates arrive in Wh.
    fn in_kilo(mut self) -> Self {
        for values in [&mut self.today_kwh, &mut self.seven_days_kwh, &mut self.lifetime_kwh] {
            values.iter_mut().for_each(|value| *value = value.map(f64::to_kilo));
        }
        self
    }
}

fn merge(kind: MeasurementKind, candidates: Candidates, previous: Option<&SourceFigures>, offset_kwh: f64) -> SourceFigures {
    let previous = previous.cloned().unwrap_or_else(|| SourceFigures::new(kind));
    let reading = candidates.reading;
    let statistics = candidates.statistics.unwrap_or_default();

    let power_w = prefer_finite(
        once(reading.and_then(|reading| reading.active_power_w)).chain(candidates.power_w),
        previous.power_w,
    );
    let energy_lifetime_kwh = prefer_finite_opt(
        once(reading.and_then(|reading| reading.energy_delivered_kwh)).chain(candidates.lifetime_kwh),
        None,
    )
    .map(|lifetime| lifetime + offset_kwh)
    .unwrap_or(previous.energy_lifetime_kwh);

    SourceFigures {
        kind,
        reading_time: reading
            .and_then(|reading| reading.timestamp)
            .or(candidates.reading_time.into_iter().flatten().next())
            .or(previous.reading_time),
        power_w,
        power_peak_w: if power_w.is_finite() { previous.power_peak_w.max(power_w) } else { previous.power_peak_w },
        energy_today_kwh: prefer_finite(candidates.today_kwh, previous.energy_today_kwh),
        energy_last_seven_days_kwh: prefer_finite(candidates.seven_days_kwh, previous.energy_last_seven_days_kwh),
        energy_lifetime_kwh,
        voltage_v: prefer_finite_opt([reading.and_then(|r| r.voltage_v), statistics.rms_voltage], previous.voltage_v),
        current_a: prefer_finite_opt([reading.and_then(|r| r.current_a), statistics.rms_current], previous.current_a),
        power_factor: prefer_finite_opt([reading.and_then(|r| r.power_factor), statistics.pwr_factor], previous.power_factor),
        apparent_power_va: prefer_finite_opt([reading.and_then(|r| r.apparent_power_va), statistics.apprnt_pwr], previous.apparent_power_va),
        reactive_power_var: prefer_finite_opt([reading.and_then(|r| r.reactive_power_var), statistics.react_pwr], previous.reactive_power_var),
    }
}

fn find_entry<'a>(entries: &'a [StatisticsEntry], kind: &str, measurement_type: Option<&str>) -> Option<&'a StatisticsEntry> {
    entries
        .iter()
        .find(|entry| entry.kind == kind && (measurement_type.is_none() || entry.measurement_type.as_deref() == measurement_type))
}

/// Sums the per-line values of up to three phases, then divides voltage and power factor by the
/// phase divisors. Entries without lines only get divided.
pub fn statistics_totals(entry: &StatisticsEntry, phase_mode: PhaseMode) -> StatisticsValues {
    let mut totals = if entry.lines.is_empty() {
        entry.values.clone()
    } else {
        let lines = &entry.lines[..entry.lines.len().min(3)];
        let sum = |field: fn(&StatisticsValues) -> Option<f64>| {
            lines
                .iter()
                .filter_map(field)
                .fold(None, |total: Option<f64>, value| Some(total.unwrap_or(0.0) + value))
        };
        StatisticsValues {
            w_now: sum(|line| line.w_now),
            wh_lifetime: sum(|line| line.wh_lifetime),
            wh_today: sum(|line| line.wh_today),
            wh_last_seven_days: sum(|line| line.wh_last_seven_days),
            rms_current: sum(|line| line.rms_current),
            rms_voltage: sum(|line| line.rms_voltage),
            pwr_factor: sum(|line| line.pwr_factor),
            react_pwr: sum(|line| line.react_pwr),
            apprnt_pwr: sum(|line| line.apprnt_pwr),
        }
    };

    totals.rms_voltage = totals.rms_voltage.map(|voltage| voltage / phase_mode.voltage_divide());
    totals.pwr_factor = totals.pwr_factor.map(|power_factor| power_factor / phase_mode.power_factor_divide());
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envoy::domain::meters::{MeterGet, MeterReadingGet, MeterReportGet};
    use crate::envoy::map_meters::{apply_meter_data, map_meters};
    use pretty_assertions::assert_eq;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {} to be close to {}", actual, expected);
    }

    fn meters_with_reports() -> Vec<Meter> {
        let configs: Vec<MeterGet> = serde_json::from_str(include_str!("../../tests/resources/envoy/meters.json")).unwrap();
        let reports: Vec<MeterReportGet> = serde_json::from_str(include_str!("../../tests/resources/envoy/meter_reports.json")).unwrap();
        let mut meters = map_meters(configs, &[]);
        apply_meter_data(&mut meters, None, Some(&reports));
        meters
    }

    fn legacy() -> ProductionGet {
        serde_json::from_str(include_str!("../../tests/resources/envoy/production.json")).unwrap()
    }

    fn statistics() -> ProductionStatisticsGet {
        serde_json::from_str(include_str!("../../tests/resources/envoy/production_statistics.json")).unwrap()
    }

    #[test]
    fn meter_readings_win_over_aggregates() {
        let meters = meters_with_reports();
        let sources = ProductionSources {
            meters: &meters,
            pdm: Some(serde_json::from_str(include_str!("../../tests/resources/envoy/production_pdm.json")).unwrap()),
            energy: Some(serde_json::from_str(include_str!("../../tests/resources/envoy/energy_pdm.json")).unwrap()),
            statistics: Some(statistics()),
            ..Default::default()
        };
        let offsets = EnergyOffsets {
            production_kwh: 250.0,
            ..Default::default()
        };

        let merged = merge_power_and_energy(&sources, &PowerAndEnergy::default(), &offsets);

        let production = &merged.production;
        assert_eq!(production.power_w, 2850.0);
        assert_eq!(production.power_peak_w, 2850.0);
        assert_eq!(production.reading_time, Some(1_699_996_301));
        assert_eq!(production.energy_today_kwh, 14.3);
        assert_close(production.energy_lifetime_kwh, 11245.7 + 250.0);
        assert_eq!(production.voltage_v, Some(241.3));

        let net = merged.consumption_net.unwrap();
        assert_eq!(net.power_w, -1230.0);

        let total = merged.consumption_total.unwrap();
        assert_eq!(total.power_w, 1620.0);
        assert_eq!(total.energy_today_kwh, 9.1);
        assert_eq!(total.energy_lifetime_kwh, 4823.45);

        let storage = merged.storage.unwrap();
        assert_eq!(storage.active_count, 0);
        assert_eq!(storage.state.as_deref(), Some("idle"));
    }

    #[test]
    fn legacy_feed_without_meters() {
        let sources = ProductionSources {
            legacy: Some(legacy()),
            ..Default::default()
        };

        let merged = merge_power_and_energy(&sources, &PowerAndEnergy::default(), &EnergyOffsets::default());

        assert_eq!(merged.production.power_w, 2830.0);
        assert_eq!(merged.production.energy_today_kwh, 14.25);
        assert_eq!(merged.production.energy_last_seven_days_kwh, 98.0);
        assert_eq!(merged.production.energy_lifetime_kwh, 11200.0);
        assert_eq!(merged.production.voltage_v, None);
        assert_eq!(merged.consumption_net, None);
        assert_eq!(merged.consumption_total, None);
    }

    #[test]
    fn non_finite_values_keep_the_cached_figures() {
        let mut legacy = legacy();
        legacy.watts_now = Some(f64::NAN);
        legacy.watt_hours_lifetime = Some(f64::INFINITY);
        let sources = ProductionSources {
            legacy: Some(legacy),
            ..Default::default()
        };
        let mut previous = PowerAndEnergy::default();
        previous.production.power_w = 1234.0;
        previous.production.power_peak_w = 3000.0;
        previous.production.energy_lifetime_kwh = 11000.0;

        let merged = merge_power_and_energy(&sources, &previous, &EnergyOffsets::default());

        assert_eq!(merged.production.power_w, 1234.0);
        assert_eq!(merged.production.power_peak_w, 3000.0);
        assert_eq!(merged.production.energy_lifetime_kwh, 11000.0);
        assert!(merged.production.energy_today_kwh.is_finite());
    }

    #[test]
    fn a_partial_meter_reading_falls_back_to_the_aggregates() {
        let configs: Vec<MeterGet> = serde_json::from_str(include_str!("../../tests/resources/envoy/meters.json")).unwrap();
        let readings: Vec<MeterReadingGet> = serde_json::from_str(r#"[{"eid": 704643328, "activePower": 2845.5}]"#).unwrap();
        let mut meters = map_meters(configs, &[]);
        apply_meter_data(&mut meters, Some(&readings), None);
        let sources = ProductionSources {
            meters: &meters,
            legacy: Some(legacy()),
            ..Default::default()
        };

        let merged = merge_power_and_energy(&sources, &PowerAndEnergy::default(), &EnergyOffsets::default());

        assert_eq!(merged.production.power_w, 2845.5);
        assert_eq!(merged.production.energy_lifetime_kwh, 11200.0);
        assert_eq!(merged.production.voltage_v, None);
        assert_eq!(merged.production.power_factor, None);
    }

    #[test]
    fn statistics_lines_are_summed_per_phase() {
        let statistics = statistics();
        let eim = find_entry(&statistics.production, "eim", Some("production")).unwrap();

        let totals = statistics_totals(eim, PhaseMode::Split);

        assert_eq!(totals.w_now, Some(2849.0));
        assert_eq!(totals.rms_voltage, Some(241.4));
        assert_eq!(totals.pwr_factor, Some(0.98));
        assert_eq!(totals.rms_current, Some(12.2));
    }

    #[test]
    fn statistics_feed_the_figures_when_meters_have_no_reading() {
        let configs: Vec<MeterGet> = serde_json::from_str(include_str!("../../tests/resources/envoy/meters.json")).unwrap();
        let meters = map_meters(configs, &[]);
        let sources = ProductionSources {
            meters: &meters,
            statistics: Some(statistics()),
            ..Default::default()
        };

        let merged = merge_power_and_energy(&sources, &PowerAndEnergy::default(), &EnergyOffsets::default());

        assert_eq!(merged.production.power_w, 2849.0);
        assert_eq!(merged.production.voltage_v, Some(241.4));
        assert_eq!(merged.production.energy_today_kwh, 14.31);
        assert_eq!(merged.consumption_net.unwrap().power_w, -1231.0);
        assert_eq!(merged.consumption_total.unwrap().voltage_v, Some(241.2));
    }

    #[test]
    fn inverter_power_is_the_last_resort() {
        let mut power = BTreeMap::new();
        power.insert("1".to_string(), PcuPower { last_report_date: 0, power_w: 200.0, power_peak_w: 250.0 });
        power.insert("2".to_string(), PcuPower { last_report_date: 0, power_w: 210.0, power_peak_w: 250.0 });
        let sources = ProductionSources {
            pcu_power: Some(&power),
            ..Default::default()
        };

        let merged = merge_power_and_energy(&sources, &PowerAndEnergy::default(), &EnergyOffsets::default());

        assert_eq!(merged.production.power_w, 410.0);
    }
}
