use crate::devices::DeviceSnapshot;
use serde::Serialize;

/// Classement global de l'installation, fonction pure des snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Unknown,
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub status: SystemStatus,
    pub total_devices: usize,
    pub online_devices: usize,
    pub offline_devices: usize,
    pub avg_packet_loss: f64,
    pub devices: Vec<DeviceSnapshot>,
}

/// unknown si aucun device, healthy si tous online, critical si tous
/// offline, degraded entre les deux.
pub fn rollup(devices: Vec<DeviceSnapshot>) -> SystemHealth {
    let total = devices.len();
    let online = devices.iter().filter(|d| d.online).count();
    let offline = total - online;

    let status = if total == 0 {
        SystemStatus::Unknown
    } else if offline == 0 {
        SystemStatus::Healthy
    } else if offline == total {
        SystemStatus::Critical
    } else {
        SystemStatus::Degraded
    };

    let avg_packet_loss = if total == 0 {
        0.0
    } else {
        devices.iter().map(|d| d.packet_loss as f64).sum::<f64>() / total as f64
    };

    SystemHealth {
        status,
        total_devices: total,
        online_devices: online,
        offline_devices: offline,
        avg_packet_loss,
        devices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn snap(id: &str, online: bool, loss: u8) -> DeviceSnapshot {
        DeviceSnapshot {
            id: id.into(),
            last_seq: None,
            expected_packets: 0,
            received_packets: 0,
            heartbeat_count: 1,
            uptime_ms: None,
            free_heap: None,
            last_seen: String::new(),
            time_since_last_heartbeat: 0,
            online,
            status: if online { "online" } else { "offline" }.into(),
            packet_loss: loss,
            extra: Map::new(),
        }
    }

    #[test]
    fn no_devices_is_unknown() {
        let h = rollup(vec![]);
        assert_eq!(h.status, SystemStatus::Unknown);
        assert_eq!(h.total_devices, 0);
        assert_eq!(h.avg_packet_loss, 0.0);
    }

    #[test]
    fn all_online_is_healthy() {
        let h = rollup(vec![snap("LEFT", true, 0), snap("RIGHT", true, 10)]);
        assert_eq!(h.status, SystemStatus::Healthy);
        assert_eq!(h.online_devices, 2);
        assert_eq!(h.avg_packet_loss, 5.0);
    }

    #[test]
    fn mixed_is_degraded() {
        let h = rollup(vec![snap("LEFT", true, 0), snap("RIGHT", false, 0)]);
        assert_eq!(h.status, SystemStatus::Degraded);
        assert_eq!(h.offline_devices, 1);
    }

    #[test]
    fn all_offline_is_critical() {
        let h = rollup(vec![snap("LEFT", false, 0)]);
        assert_eq!(h.status, SystemStatus::Critical);
    }

    #[test]
    fn status_serializes_lowercase() {
        let v = serde_json::to_value(SystemStatus::Degraded).unwrap();
        assert_eq!(v, serde_json::json!("degraded"));
    }
}
