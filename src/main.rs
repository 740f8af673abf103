/**
 * LUMEN MONITOR - Point d'entrée du kernel de télémétrie
 *
 * RÔLE : Orchestration : config, récepteurs UDP (logs + heartbeats),
 * stores partagés, API REST et push WebSocket pour le dashboard.
 *
 * FLUX : device LED → datagramme UDP → parse JSON → LogBuffer /
 * DeviceAggregator → broadcast WebSocket → dashboards connectés.
 * Les GET HTTP lisent les stores directement, indépendamment du push.
 */

use lumen_monitor::config::load_config;
use lumen_monitor::devices::DeviceAggregator;
use lumen_monitor::http::{build_router, AppState};
use lumen_monitor::logbuffer::LogBuffer;
use lumen_monitor::models::{HeartbeatIn, LogEntry};
use lumen_monitor::state::new_state;
use lumen_monitor::udp::UdpReceiver;
use lumen_monitor::ws::WsHub;

use std::net::SocketAddr;
use time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = load_config().await;
    let logs = new_state(LogBuffer::new(cfg.log_buffer_size));
    let devices = new_state(DeviceAggregator::new(Duration::seconds(
        cfg.heartbeat_timeout_seconds as i64,
    )));
    let hub = WsHub::new();

    // flux logs : ajout au ring buffer puis fan-out vers les dashboards
    let log_rx = UdpReceiver::bind(cfg.log_port, "logs").await?;
    println!("[monitor] logs UDP on port {}", log_rx.local_port());
    {
        let logs = logs.clone();
        let hub = hub.clone();
        log_rx.spawn(move |value, addr| {
            match serde_json::from_value::<LogEntry>(value) {
                Ok(mut entry) => {
                    if entry.source.is_none() {
                        entry.source = Some(addr.ip().to_string());
                    }
                    let stored = logs.lock().add(entry);
                    hub.broadcast_log(&stored);
                }
                Err(e) => eprintln!("[udp:logs] entrée invalide de {addr}: {e}"),
            }
        });
    }

    // flux heartbeats : un heartbeat cassé ne coupe jamais les autres devices
    let hb_rx = UdpReceiver::bind(cfg.heartbeat_port, "heartbeat").await?;
    println!("[monitor] heartbeats UDP on port {}", hb_rx.local_port());
    {
        let devices = devices.clone();
        let hub = hub.clone();
        hb_rx.spawn(move |value, addr| {
            match serde_json::from_value::<HeartbeatIn>(value) {
                Ok(hb) => match devices.lock().update_device(hb) {
                    Ok(snapshot) => hub.broadcast_heartbeat(&snapshot),
                    Err(e) => eprintln!("[udp:heartbeat] rejeté de {addr}: {e}"),
                },
                Err(e) => eprintln!("[udp:heartbeat] heartbeat invalide de {addr}: {e}"),
            }
        });
    }

    let app_state = AppState {
        logs,
        devices,
        hub: hub.clone(),
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], cfg.http_port))).await?;
    let addr = listener.local_addr()?;
    println!("[monitor] listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(log_rx, hb_rx, hub))
        .await?;
    println!("[monitor] arrêt propre");
    Ok(())
}

/// Ordre d'arrêt : receivers d'abord (plus aucun broadcast entrant),
/// puis déconnexion des clients WebSocket, puis le listener HTTP.
async fn shutdown(log_rx: UdpReceiver, hb_rx: UdpReceiver, hub: WsHub) {
    let _ = tokio::signal::ctrl_c().await;
    println!("[monitor] ctrl-c reçu, arrêt");
    log_rx.close();
    hb_rx.close();
    hub.close_all();
}
