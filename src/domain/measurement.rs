use serde::{Deserialize, Serialize};

/// Canonical classification of a meter or production feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementKind {
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "net-consumption")]
    NetConsumption,
    #[serde(rename = "total-consumption")]
    TotalConsumption,
    #[serde(rename = "storage")]
    Storage,
    #[serde(other)]
    Unknown,
}

impl MeasurementKind {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "production" => MeasurementKind::Production,
            "net-consumption" => MeasurementKind::NetConsumption,
            "total-consumption" => MeasurementKind::TotalConsumption,
            "storage" => MeasurementKind::Storage,
            _ => MeasurementKind::Unknown,
        }
    }

    pub fn canonical(&self) -> &'static str {
        match self {
            MeasurementKind::Production => "Production",
            MeasurementKind::NetConsumption => "Consumption (Net)",
            MeasurementKind::TotalConsumption => "Consumption (Total)",
            MeasurementKind::Storage => "Storage",
            MeasurementKind::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhaseMode {
    Single,
    Split,
    Three,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PhaseMode {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "single" => PhaseMode::Single,
            "split" => PhaseMode::Split,
            "three" => PhaseMode::Three,
            _ => PhaseMode::Unknown,
        }
    }

    pub fn canonical(&self) -> &'static str {
        match self {
            PhaseMode::Single => "Single",
            PhaseMode::Split => "Split",
            PhaseMode::Three => "Three",
            PhaseMode::Unknown => "Unknown",
        }
    }

    /// Summed line voltages are divided by this to get the per-phase voltage.
    pub fn voltage_divide(&self) -> f64 {
        match self {
            PhaseMode::Split => 2.0,
            PhaseMode::Three => 3.0,
            _ => 1.0,
        }
    }

    // Three-phase power factor is left undivided, matching the gateway's own reporting.
    pub fn power_factor_divide(&self) -> f64 {
        match self {
            PhaseMode::Split => 2.0,
            _ => 1.0,
        }
    }
}

pub fn metering_status(raw: &str) -> &str {
    match raw {
        "normal" => "Normal",
        "not-metering" => "Not Metering",
        "check-wiring" => "Check Wiring",
        other => other,
    }
}

pub fn meter_status_flag(raw: &str) -> &str {
    match raw {
        "production-imbalance" => "Production Imbalance",
        "negative-production" => "Negative Production",
        "power-on-unused-phase" => "Power On Unused Phase",
        "negative-total-consumption" => "Negative Total Consumption",
        other => other,
    }
}

pub fn device_status(raw: &str) -> &str {
    match raw {
        "envoy.global.ok" => "OK",
        "prop.done" => "Propagation Done",
        "envoy.cond_flags.acb_ctrl.bmuhardwareerror" => "BMU Hardware Error",
        "envoy.cond_flags.acb_ctrl.bmuimageerror" => "BMU Image Error",
        "envoy.cond_flags.acb_ctrl.bmumaxcurrentwarning" => "BMU Max Current Warning",
        "envoy.cond_flags.acb_ctrl.bmusenseerror" => "BMU Sense Error",
        "envoy.cond_flags.acb_ctrl.cellmaxtemperror" => "Cell Max Temperature Error",
        "envoy.cond_flags.acb_ctrl.cellmintemperror" => "Cell Min Temperature Error",
        "envoy.cond_flags.obs_strs.discovering" => "Discovering",
        "envoy.cond_flags.obs_strs.failure" => "Failure To Report",
        "envoy.cond_flags.obs_strs.verifying" => "Verifying Device",
        "envoy.cond_flags.pcu_chan.acMonitorError" => "AC Monitor Error",
        "envoy.cond_flags.pcu_chan.dcvoltagetoolow" => "DC Voltage Too Low",
        "envoy.cond_flags.pcu_ctrl.acfrequencyoor" => "AC Frequency Out Of Range",
        "envoy.cond_flags.pcu_ctrl.acvoltageoosp1" => "AC Voltage Out Of Range - Phase 1",
        "envoy.cond_flags.pcu_ctrl.commandedreset" => "Commanded Reset",
        "envoy.cond_flags.pcu_ctrl.dc-pwr-low" => "DC Power Too Low",
        "envoy.cond_flags.pcu_ctrl.gridgone" => "Grid Gone",
        "envoy.cond_flags.pcu_ctrl.gridinstability" => "Grid Instability",
        "envoy.cond_flags.pcu_ctrl.gridoffsetlow" => "Grid Offset Low",
        "envoy.cond_flags.pcu_ctrl.gridoffsethigh" => "Grid Offset High",
        "envoy.cond_flags.pcu_ctrl.powergeneration" => "Power Generation Error",
        "envoy.cond_flags.pcu_ctrl.tpmtest" => "Transient Grid Profile",
        "envoy.cond_flags.nsrb_ctrl.relayopen" => "Relay Open",
        "envoy.cond_flags.rgm_chan.check_meter" => "Meter Error",
        "envoy.global.unexpected_reset" => "Unexpected Reset",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("split", 2.0, 2.0)]
    #[case("three", 3.0, 1.0)]
    #[case("single", 1.0, 1.0)]
    #[case("", 1.0, 1.0)]
    #[case("quad", 1.0, 1.0)]
    fn phase_mode_divisors(#[case] raw: &str, #[case] voltage: f64, #[case] power_factor: f64) {
        let mode = PhaseMode::from_raw(raw);

        assert_eq!(mode.voltage_divide(), voltage);
        assert_eq!(mode.power_factor_divide(), power_factor);
    }

    #[rstest]
    #[case("production", MeasurementKind::Production, "Production")]
    #[case("net-consumption", MeasurementKind::NetConsumption, "Consumption (Net)")]
    #[case("total-consumption", MeasurementKind::TotalConsumption, "Consumption (Total)")]
    #[case("storage", MeasurementKind::Storage, "Storage")]
    #[case("backfeed", MeasurementKind::Unknown, "Unknown")]
    fn measurement_kind_code_table(#[case] raw: &str, #[case] expected: MeasurementKind, #[case] canonical: &str) {
        let kind = MeasurementKind::from_raw(raw);

        assert_eq!(kind, expected);
        assert_eq!(kind.canonical(), canonical);
    }

    #[test]
    fn measurement_kind_deserializes_unknown_values() {
        let kind: MeasurementKind = serde_json::from_str("\"something-new\"").unwrap();

        assert_eq!(kind, MeasurementKind::Unknown);
    }

    #[rstest]
    #[case("envoy.global.ok", "OK")]
    #[case("envoy.cond_flags.pcu_ctrl.dc-pwr-low", "DC Power Too Low")]
    #[case("some.unknown.code", "some.unknown.code")]
    fn device_status_code_table(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(device_status(raw), expected);
    }
}
