use crate::domain::telemetry::{CommCount, CommLevels, EnpowerConnection, Home, NetworkInterface, WirelessConnection};
use crate::envoy::domain::home::{HomeCommCount, HomeGet};

/// Scales a 0-5 signal level to a percentage.
pub fn level_percent(level: u8) -> u8 {
    level.min(5) * 20
}

pub fn map_home(home: HomeGet) -> Home {
    let comm_count = |count: &HomeCommCount| CommCount {
        num: count.num,
        level: level_percent(count.level),
    };

    Home {
        software_build_epoch: home.software_build_epoch,
        timezone: home.timezone,
        db_percent_full: home.db_percent_full.and_then(|percent| percent.trim().parse().ok()),
        web_comm: home.network.web_comm,
        ever_reported_to_enlighten: home.network.ever_reported_to_enlighten,
        last_enlighten_report_time: home.network.last_enlighten_report_time,
        primary_interface: home.network.primary_interface,
        interfaces: home
            .network
            .interfaces
            .into_iter()
            .map(|interface| NetworkInterface {
                kind: interface.kind,
                interface: interface.interface,
                mac: interface.mac,
                dhcp: interface.dhcp,
                ip: interface.ip,
                signal_strength: level_percent(interface.signal_strength),
                signal_strength_max: level_percent(interface.signal_strength_max),
                carrier: interface.carrier,
            })
            .collect(),
        wireless_connections: home
            .wireless_connection
            .into_iter()
            .map(|connection| WirelessConnection {
                kind: connection.kind,
                signal_strength: level_percent(connection.signal_strength),
                signal_strength_max: level_percent(connection.signal_strength_max),
                connected: connection.connected,
            })
            .collect(),
        comm: CommLevels {
            total: CommCount {
                num: home.comm.num,
                level: level_percent(home.comm.level),
            },
            pcu: comm_count(&home.comm.pcu),
            acb: comm_count(&home.comm.acb),
            nsrb: comm_count(&home.comm.nsrb),
            esub: comm_count(&home.comm.esub),
        },
        alerts: home.alerts.into_iter().map(|alert| alert.msg_key).collect(),
        update_status: home.update_status,
        enpower: home.enpower.map(|enpower| EnpowerConnection {
            connected: enpower.connected,
            grid_status: enpower.grid_status,
        }),
    }
}
