use crate::domain::measurement::{MeasurementKind, PhaseMode, meter_status_flag, metering_status};
use crate::domain::telemetry::{Meter, MeterReading, ReadingSource};
use crate::envoy::domain::meters::{MeterCumulativeGet, MeterGet, MeterReadingGet, MeterReportGet};
use crate::extensions::f64_ext::{UnitConversions, prefer_finite_opt};

/// Maps the meter configuration. A configured net-consumption meter without a total-consumption
/// counterpart gets a synthesized total-consumption entry, fed by the reports.
pub fn map_meters(configs: Vec<MeterGet>, previous: &[Meter]) -> Vec<Meter> {
    let mut meters: Vec<Meter> = Vec::with_capacity(configs.len() + 1);

    for config in configs {
        let kind = MeasurementKind::from_raw(&config.measurement_type);
        let phase_mode = PhaseMode::from_raw(&config.phase_mode);
        let meter = Meter {
            eid: config.eid,
            kind,
            measurement: kind.canonical().to_string(),
            enabled: config.state == "enabled",
            phase_mode,
            phase_count: config.phase_count,
            metering_status: metering_status(&config.metering_status).to_string(),
            status_flags: config.status_flags.iter().map(|flag| meter_status_flag(flag).to_string()).collect(),
            voltage_divide: phase_mode.voltage_divide(),
            power_factor_divide: phase_mode.power_factor_divide(),
            synthesized: false,
            reading: previous_reading(previous, config.eid, kind),
        };
        upsert(&mut meters, meter);
    }

    let has_total = meters.iter().any(|meter| meter.kind == MeasurementKind::TotalConsumption);
    let net = meters.iter().find(|meter| meter.kind == MeasurementKind::NetConsumption).cloned();
    if let (false, Some(net)) = (has_total, net) {
        let kind = MeasurementKind::TotalConsumption;
        meters.push(Meter {
            kind,
            measurement: kind.canonical().to_string(),
            synthesized: true,
            reading: previous_reading(previous, net.eid, kind),
            ..net
        });
    }

    meters
}

fn previous_reading(previous: &[Meter], eid: u64, kind: MeasurementKind) -> Option<MeterReading> {
    previous
        .iter()
        .find(|meter| meter.eid == eid && meter.kind == kind)
        .and_then(|meter| meter.reading)
}

fn upsert(meters: &mut Vec<Meter>, meter: Meter) {
    match meters.iter_mut().find(|existing| existing.eid == meter.eid && existing.kind == meter.kind) {
        Some(existing) => *existing = meter,
        None => meters.push(meter),
    }
}

/// Applies the latest readings and reports. A report for the meter's measurement kind wins over an
/// instantaneous reading; a meter with neither keeps its previous reading. Missing or non-finite
/// fields keep their previous value and stay `None` when there is none.
pub fn apply_meter_data(meters: &mut [Meter], readings: Option<&[MeterReadingGet]>, reports: Option<&[MeterReportGet]>) {
    for meter in meters.iter_mut() {
        let report = reports.and_then(|reports| {
            reports
                .iter()
                .find(|report| MeasurementKind::from_raw(&report.report_type) == meter.kind)
        });
        let reading = match report {
            Some(report) => Some(from_report(meter, report)),
            None if !meter.synthesized => readings
                .and_then(|readings| readings.iter().find(|reading| reading.eid == meter.eid))
                .map(|reading| from_reading(meter, reading)),
            None => None,
        };

        if let Some(reading) = reading {
            meter.reading = Some(reading);
        }
    }
}

fn from_reading(meter: &Meter, reading: &MeterReadingGet) -> MeterReading {
    let cached = meter.reading;
    let cached = |field: fn(&MeterReading) -> Option<f64>| cached.as_ref().and_then(field);

    MeterReading {
        source: ReadingSource::Readings,
        timestamp: reading.timestamp,
        active_power_w: prefer_finite_opt([reading.active_power], cached(|r| r.active_power_w)),
        apparent_power_va: prefer_finite_opt([reading.apparent_power], cached(|r| r.apparent_power_va)),
        reactive_power_var: prefer_finite_opt([reading.reactive_power], cached(|r| r.reactive_power_var)),
        energy_delivered_kwh: prefer_finite_opt([reading.act_energy_dlvd.map(f64::to_kilo)], cached(|r| r.energy_delivered_kwh)),
        energy_received_kwh: prefer_finite_opt([reading.act_energy_rcvd.map(f64::to_kilo)], cached(|r| r.energy_received_kwh)),
        voltage_v: prefer_finite_opt([reading.voltage.map(|v| v / meter.voltage_divide)], cached(|r| r.voltage_v)),
        current_a: prefer_finite_opt([reading.current], cached(|r| r.current_a)),
        power_factor: prefer_finite_opt([reading.pwr_factor.map(|pf| pf / meter.power_factor_divide)], cached(|r| r.power_factor)),
        frequency_hz: prefer_finite_opt([reading.freq], cached(|r| r.frequency_hz)),
    }
}

fn from_report(meter: &Meter, report: &MeterReportGet) -> MeterReading {
    let cached = meter.reading;
    let cached = |field: fn(&MeterReading) -> Option<f64>| cached.as_ref().and_then(field);
    let values: &MeterCumulativeGet = &report.cumulative;

    MeterReading {
        source: ReadingSource::Reports,
        timestamp: report.created_at,
        active_power_w: prefer_finite_opt([values.act_power, values.curr_w], cached(|r| r.active_power_w)),
        apparent_power_va: prefer_finite_opt([values.apprnt_pwr], cached(|r| r.apparent_power_va)),
        reactive_power_var: prefer_finite_opt([values.react_pwr], cached(|r| r.reactive_power_var)),
        energy_delivered_kwh: prefer_finite_opt([values.wh_dlvd_cum.map(f64::to_kilo)], cached(|r| r.energy_delivered_kwh)),
        energy_received_kwh: prefer_finite_opt([values.wh_rcvd_cum.map(f64::to_kilo)], cached(|r| r.energy_received_kwh)),
        voltage_v: prefer_finite_opt([values.rms_voltage.map(|v| v / meter.voltage_divide)], cached(|r| r.voltage_v)),
        current_a: prefer_finite_opt([values.rms_current], cached(|r| r.current_a)),
        power_factor: prefer_finite_opt([values.pwr_factor.map(|pf| pf / meter.power_factor_divide)], cached(|r| r.power_factor)),
        frequency_hz: prefer_finite_opt([values.freq_hz], cached(|r| r.frequency_hz)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn configs() -> Vec<MeterGet> {
        serde_json::from_str(include_str!("../../tests/resources/envoy/meters.json")).unwrap()
    }

    fn readings() -> Vec<MeterReadingGet> {
        serde_json::from_str(include_str!("../../tests/resources/envoy/meter_readings.json")).unwrap()
    }

    fn reports() -> Vec<MeterReportGet> {
        serde_json::from_str(include_str!("../../tests/resources/envoy/meter_reports.json")).unwrap()
    }

    #[test]
    fn synthesizes_total_consumption_from_net_consumption() {
        let meters = map_meters(configs(), &[]);

        assert_eq!(meters.len(), 3);
        let net = &meters[1];
        let total = &meters[2];
        assert_eq!(net.measurement, "Consumption (Net)");
        assert_eq!(net.status_flags, vec!["Negative Total Consumption".to_string()]);
        assert_eq!(total.kind, MeasurementKind::TotalConsumption);
        assert_eq!(total.measurement, "Consumption (Total)");
        assert!(total.synthesized);
        assert_eq!(total.eid, net.eid);
        assert_eq!(total.phase_mode, net.phase_mode);
        assert_eq!(total.phase_count, net.phase_count);
        assert_eq!(total.voltage_divide, 2.0);
        assert_eq!(total.enabled, net.enabled);
    }

    #[test]
    fn meter_entries_are_unique_per_eid_and_kind() {
        let mut configs = configs();
        configs.extend(self::configs());

        let meters = map_meters(configs, &[]);

        assert_eq!(meters.len(), 3);
    }

    #[test]
    fn readings_are_divided_by_phase() {
        let mut meters = map_meters(configs(), &[]);

        apply_meter_data(&mut meters, Some(&readings()), None);

        let production = meters[0].reading.unwrap();
        assert_eq!(production.source, ReadingSource::Readings);
        assert_eq!(production.active_power_w, Some(2845.5));
        assert_eq!(production.voltage_v, Some(241.2));
        assert_eq!(production.power_factor, Some(0.98));
        assert_eq!(production.energy_delivered_kwh, Some(11245.6785));
        assert_eq!(meters[2].reading, None);
    }

    #[test]
    fn reports_take_precedence_over_readings() {
        let mut meters = map_meters(configs(), &[]);

        apply_meter_data(&mut meters, Some(&readings()), Some(&reports()));

        let production = meters[0].reading.unwrap();
        assert_eq!(production.source, ReadingSource::Reports);
        assert_eq!(production.active_power_w, Some(2850.0));
        assert_eq!(production.voltage_v, Some(241.3));

        let total = meters[2].reading.unwrap();
        assert_eq!(total.active_power_w, Some(1620.0));
        assert_eq!(total.energy_delivered_kwh, Some(4823.45));
    }

    #[test]
    fn non_finite_values_keep_the_cached_value() {
        let mut meters = map_meters(configs(), &[]);
        apply_meter_data(&mut meters, Some(&readings()), None);
        let mut readings = readings();
        readings[0].active_power = Some(f64::NAN);
        readings[0].voltage = None;

        apply_meter_data(&mut meters, Some(&readings), None);

        let production = meters[0].reading.unwrap();
        assert_eq!(production.active_power_w, Some(2845.5));
        assert_eq!(production.voltage_v, Some(241.2));
    }

    #[test]
    fn missing_fields_without_a_cached_value_stay_empty() {
        let mut meters = map_meters(configs(), &[]);
        let readings: Vec<MeterReadingGet> = serde_json::from_str(r#"[{"eid": 704643328, "activePower": 2845.5}]"#).unwrap();

        apply_meter_data(&mut meters, Some(&readings), None);

        let production = meters[0].reading.unwrap();
        assert_eq!(production.active_power_w, Some(2845.5));
        assert_eq!(production.energy_delivered_kwh, None);
        assert_eq!(production.voltage_v, None);
        assert_eq!(production.power_factor, None);
    }

    #[test]
    fn configuration_refresh_keeps_previous_readings() {
        let mut meters = map_meters(configs(), &[]);
        apply_meter_data(&mut meters, None, Some(&reports()));

        let refreshed = map_meters(configs(), &meters);

        assert_eq!(refreshed, meters);
    }
}
