use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ligne de log reçue en UDP depuis un device (ou fabriquée côté kernel).
/// Tous les champs sont optionnels sauf le timestamp de réception, stampé
/// par le LogBuffer si le device ne l'a pas fourni.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "receivedAt", default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>, // RFC3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Champs libres conservés tels quels (ts, runs, leds, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Heartbeat entrant, basé sur le JSON émis par le firmware :
/// {"id":"LEFT","ip":"10.10.0.2","uptime_ms":123456,"link":true,...}
/// Schéma explicite : champs typés + map ouverte pour le reste.
/// Un `seq` non numérique fait échouer la désérialisation, le datagramme
/// est alors jeté comme n'importe quel JSON invalide.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatIn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default, alias = "uptime")]
    pub uptime_ms: Option<u64>,
    #[serde(default, alias = "freeHeap")]
    pub free_heap: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_typed_fields_and_extra() {
        let hb: HeartbeatIn = serde_json::from_str(
            r#"{"id":"LEFT","seq":3,"uptime_ms":1000,"link":true,"runs":2}"#,
        )
        .unwrap();
        assert_eq!(hb.id.as_deref(), Some("LEFT"));
        assert_eq!(hb.seq, Some(3));
        assert_eq!(hb.uptime_ms, Some(1000));
        assert_eq!(hb.extra.get("link"), Some(&Value::Bool(true)));
    }

    #[test]
    fn heartbeat_rejects_string_seq() {
        let r = serde_json::from_str::<HeartbeatIn>(r#"{"id":"LEFT","seq":"3"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn log_entry_roundtrips_unknown_fields() {
        let e: LogEntry =
            serde_json::from_str(r#"{"level":"info","msg":"boot","ts":42}"#).unwrap();
        assert_eq!(e.level.as_deref(), Some("info"));
        assert_eq!(e.extra.get("ts"), Some(&Value::from(42)));
        let out = serde_json::to_value(&e).unwrap();
        assert_eq!(out.get("ts"), Some(&Value::from(42)));
        assert!(out.get("receivedAt").is_none());
    }
}
