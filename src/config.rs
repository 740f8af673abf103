use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_log_port")]
    pub log_port: u16,
    #[serde(default = "default_heartbeat_port")]
    pub heartbeat_port: u16,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    #[serde(default = "default_log_buffer_size")]
    pub log_buffer_size: usize,
}

fn default_http_port() -> u16 { 8080 }
fn default_log_port() -> u16 { 9000 }
fn default_heartbeat_port() -> u16 { 9001 }
fn default_heartbeat_timeout() -> u64 { 30 }
fn default_log_buffer_size() -> usize { 1000 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            log_port: default_log_port(),
            heartbeat_port: default_heartbeat_port(),
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            log_buffer_size: default_log_buffer_size(),
        }
    }
}

pub async fn load_config() -> MonitorConfig {
    let path = std::env::var("LUMEN_MONITOR_CONFIG").unwrap_or_else(|_| "monitor.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return MonitorConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[monitor] config invalide: {e}");
            MonitorConfig::default()
        })
    } else {
        eprintln!("[monitor] pas de monitor.yaml, usage config par défaut");
        MonitorConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: MonitorConfig = serde_yaml::from_str("http_port: 9090").unwrap();
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.log_port, 9000);
        assert_eq!(cfg.heartbeat_timeout_seconds, 30);
        assert_eq!(cfg.log_buffer_size, 1000);
    }
}
