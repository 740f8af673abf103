/**
 * DEVICE AGGREGATOR - Suivi santé des devices LED via heartbeats UDP
 *
 * RÔLE : Machine à états par device : sessions de numéros de séquence,
 * comptage de packet loss, classement online/offline sur timeout.
 *
 * FONCTIONNEMENT :
 * - Un DeviceRecord par id, créé au premier heartbeat, jamais supprimé
 *   individuellement (seulement clear())
 * - seq croissant = même session ; seq < lastSeq = reboot du device,
 *   nouvelle session et compteurs remis à 1
 * - Les champs dérivés (online, packetLoss, ...) sont recalculés à la
 *   lecture, jamais stockés
 *
 * UTILITÉ : La perte UDP n'est pas retransmise, elle est mesurée — le
 * pourcentage de loss est la métrique de récupération, pas un retry.
 */

use crate::health::{rollup, SystemHealth};
use crate::models::HeartbeatIn;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::seconds(30);

/// Clés JSON du snapshot (typées ou dérivées) : jamais acceptées depuis
/// le map libre d'un heartbeat, sinon le flatten les ferait gagner sur
/// les valeurs calculées à la sérialisation.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "lastSeq",
    "expectedPackets",
    "receivedPackets",
    "heartbeatCount",
    "uptimeMs",
    "freeHeap",
    "lastSeen",
    "timeSinceLastHeartbeat",
    "online",
    "status",
    "packetLoss",
];

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("Heartbeat must include device id")]
    MissingId,
}

/// État stocké par device. `extra` reçoit les champs libres du heartbeat
/// en merge superficiel (les valeurs récentes écrasent les anciennes).
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: String,
    pub last_seq: Option<u64>,
    pub first_seq_in_session: Option<u64>,
    pub expected_packets: u64,
    pub received_packets: u64,
    pub heartbeat_count: u64,
    pub last_seen: OffsetDateTime,
    pub uptime_ms: Option<u64>,
    pub free_heap: Option<u64>,
    pub extra: Map<String, Value>,
}

/// Vue API d'un device : champs stockés + dérivés recalculés à la lecture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<u64>,
    pub expected_packets: u64,
    pub received_packets: u64,
    pub heartbeat_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_heap: Option<u64>,
    pub last_seen: String, // RFC3339
    pub time_since_last_heartbeat: i64, // ms
    pub online: bool,
    pub status: String, // online | offline
    pub packet_loss: u8, // pourcentage 0..100
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct DeviceAggregator {
    records: HashMap<String, DeviceRecord>,
    heartbeat_timeout: Duration,
}

impl DeviceAggregator {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            records: HashMap::new(),
            heartbeat_timeout,
        }
    }

    /// Intègre un heartbeat et retourne le snapshot du device.
    /// Un id manquant est une erreur que le callback UDP doit attraper :
    /// un device mal configuré ne coupe jamais l'ingestion des autres.
    pub fn update_device(&mut self, hb: HeartbeatIn) -> Result<DeviceSnapshot, HeartbeatError> {
        let id = match hb.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(HeartbeatError::MissingId),
        };

        let now = OffsetDateTime::now_utc();
        let record = self
            .records
            .entry(id.clone())
            .or_insert_with(|| DeviceRecord {
                id,
                last_seq: None,
                first_seq_in_session: None,
                expected_packets: 0,
                received_packets: 0,
                heartbeat_count: 0,
                last_seen: now,
                uptime_ms: None,
                free_heap: None,
                extra: Map::new(),
            });

        if let Some(seq) = hb.seq {
            let new_session = match record.last_seq {
                None => true,
                Some(last) => seq < last, // reboot ou wrap du device
            };
            if new_session {
                record.first_seq_in_session = Some(seq);
                record.expected_packets = 1;
                record.received_packets = 1;
            } else {
                let first = record.first_seq_in_session.unwrap_or(seq);
                // saturant : un seq aberrant (u64::MAX) ne doit jamais
                // paniquer la boucle d'ingestion
                record.expected_packets = seq.saturating_sub(first).saturating_add(1);
                record.received_packets += 1;
            }
            record.last_seq = Some(seq);
        }
        // sans seq : pas de comptage de paquets, le loss reste à 0

        if hb.uptime_ms.is_some() {
            record.uptime_ms = hb.uptime_ms;
        }
        if hb.free_heap.is_some() {
            record.free_heap = hb.free_heap;
        }
        for (k, v) in hb.extra {
            // les champs dérivés sont recalculés à la lecture et doivent
            // gagner : un device ne peut pas spoofer son propre statut
            if RESERVED_KEYS.contains(&k.as_str()) {
                continue;
            }
            record.extra.insert(k, v);
        }

        record.last_seen = now;
        record.heartbeat_count += 1;

        Ok(Self::snapshot(record, now, self.heartbeat_timeout))
    }

    pub fn get_device(&self, id: &str) -> Option<DeviceSnapshot> {
        let now = OffsetDateTime::now_utc();
        self.records
            .get(id)
            .map(|r| Self::snapshot(r, now, self.heartbeat_timeout))
    }

    pub fn get_all_devices(&self) -> Vec<DeviceSnapshot> {
        let now = OffsetDateTime::now_utc();
        let mut devices: Vec<DeviceSnapshot> = self
            .records
            .values()
            .map(|r| Self::snapshot(r, now, self.heartbeat_timeout))
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub fn get_system_health(&self) -> SystemHealth {
        rollup(self.get_all_devices())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn device_count(&self) -> usize {
        self.records.len()
    }

    fn snapshot(record: &DeviceRecord, now: OffsetDateTime, timeout: Duration) -> DeviceSnapshot {
        let age = now - record.last_seen;
        let online = age < timeout;
        DeviceSnapshot {
            id: record.id.clone(),
            last_seq: record.last_seq,
            expected_packets: record.expected_packets,
            received_packets: record.received_packets,
            heartbeat_count: record.heartbeat_count,
            uptime_ms: record.uptime_ms,
            free_heap: record.free_heap,
            last_seen: record.last_seen.format(&Rfc3339).unwrap_or_default(),
            time_since_last_heartbeat: age.whole_milliseconds().max(0) as i64,
            online,
            status: if online { "online" } else { "offline" }.to_string(),
            packet_loss: packet_loss(record.received_packets, record.expected_packets),
            extra: record.extra.clone(),
        }
    }
}

impl Default for DeviceAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

/// round(100 * (1 - received/expected)), borné à [0,100].
/// 0 si aucun seq n'a jamais été vu (expected = 0).
fn packet_loss(received: u64, expected: u64) -> u8 {
    if expected == 0 {
        return 0;
    }
    let loss = 100.0 * (1.0 - received as f64 / expected as f64);
    loss.round().clamp(0.0, 100.0) as u8
}
