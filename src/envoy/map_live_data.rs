use crate::domain::telemetry::{LiveData, LiveSource};
use crate::envoy::domain::live_data::LiveDataGet;
use crate::extensions::f64_ext::UnitConversions;

pub fn map_live_data(live_data: LiveDataGet) -> LiveData {
    let meters = &live_data.meters;
    let phase_count = meters.phase_count;

    LiveData {
        stream_enabled: live_data.connection.is_streaming(),
        last_update: meters.last_update,
        split_phase: meters.is_split_phase == 1,
        phase_count,
        main_relay_state: meters.main_relay_state,
        gen_relay_state: meters.gen_relay_state,
        backup_battery_mode: meters.backup_bat_mode.clone(),
        backup_soc: meters.backup_soc,
        encharge_soc: meters.enc_agg_soc,
        encharge_energy_wh: meters.enc_agg_energy,
        acb_soc: meters.acb_agg_soc,
        acb_energy_wh: meters.acb_agg_energy,
        sources: meters
            .sources()
            .into_iter()
            .filter_map(|(name, source)| source.map(|source| (name, source)))
            .map(|(name, source)| {
                let phases = [source.agg_p_ph_a_mw, source.agg_p_ph_b_mw, source.agg_p_ph_c_mw];
                let live = LiveSource {
                    power_w: source.agg_p_mw.from_milli(),
                    apparent_power_va: source.agg_s_mva.from_milli(),
                    phase_power_w: phases
                        .into_iter()
                        .take(phase_count as usize)
                        .map(|power| power.unwrap_or(0.0).from_milli())
                        .collect(),
                };
                (name.to_string(), live)
            })
            .collect(),
    }
}
