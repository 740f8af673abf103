/**
 * API REST LUMEN MONITOR - Surface HTTP du kernel de télémétrie
 *
 * RÔLE :
 * Expose l'état agrégé (devices + logs) au dashboard navigateur et aux
 * scripts d'exploitation. Lecture seule : l'écriture passe par UDP.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes /api/status, /api/logs, /api/devices
 * - Dashboard HTML embarqué servi sur / et /index.html
 * - Upgrade WebSocket sur /ws (snapshot init puis push continu)
 * - CORS * sur toutes les réponses, préflight OPTIONS en 204
 *
 * UTILITÉ :
 * 🎯 Dashboard temps réel de l'installation LED
 * 🎯 Debug terrain : curl /api/devices pendant un accrochage
 * 🎯 Intégration externe : monitoring, scripts
 */

use crate::devices::DeviceAggregator;
use crate::logbuffer::{LogBuffer, LogQuery};
use crate::state::Shared;
use crate::ws::{self, WsHub};
use axum::extract::{Query, Request, State, WebSocketUpgrade};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

#[derive(Clone)]
pub struct AppState {
    pub logs: Shared<LogBuffer>,
    pub devices: Shared<DeviceAggregator>,
    pub hub: WsHub,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/index.html", get(dashboard))
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs))
        .route("/api/devices", get(get_devices))
        .route("/ws", get(ws_upgrade))
        .with_state(app_state)
        .layer(middleware::from_fn(cors))
}

// CORS ouvert : le dashboard peut être servi d'ailleurs pendant le dev
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            ],
        )
            .into_response();
    }
    let mut res = next.run(req).await;
    res.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    res
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// GET /api/status (vue d'ensemble pour le dashboard)
async fn get_status(State(app): State<AppState>) -> Json<Value> {
    let health = app.devices.lock().get_system_health();
    let (size, max_size) = {
        let logs = app.logs.lock();
        (logs.len(), logs.max_size())
    };
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "systemHealth": &health,
        "devices": &health.devices,
        "logBufferSize": size,
        "logBufferMaxSize": max_size,
        "timestamp": timestamp,
    }))
}

// GET /api/logs?level=&component=&limit=&offset=
async fn get_logs(State(app): State<AppState>, Query(q): Query<LogQuery>) -> Json<Value> {
    let logs = app.logs.lock();
    let hits = logs.query(&q);
    let total = logs.total_matching(&q);
    Json(json!({ "logs": hits, "total": total }))
}

// GET /api/devices
async fn get_devices(State(app): State<AppState>) -> Json<Value> {
    let devices = app.devices.lock().get_all_devices();
    Json(json!({ "devices": devices }))
}

// GET /ws (upgrade) : snapshot init puis relais des broadcasts
async fn ws_upgrade(State(app): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let init = build_init(&app);
    let hub = app.hub.clone();
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, hub, init))
}

fn build_init(app: &AppState) -> String {
    let devices = app.devices.lock().get_all_devices();
    let recent = app.logs.lock().query(&LogQuery {
        limit: Some(ws::INIT_RECENT_LOGS),
        ..Default::default()
    });
    json!({ "type": "init", "devices": devices, "recentLogs": recent }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeartbeatIn, LogEntry};
    use crate::state::new_state;

    fn test_state() -> AppState {
        AppState {
            logs: new_state(LogBuffer::new(100)),
            devices: new_state(DeviceAggregator::default()),
            hub: WsHub::new(),
        }
    }

    fn log(component: &str, msg: &str) -> LogEntry {
        LogEntry {
            received_at: None,
            level: Some("info".into()),
            component: Some(component.into()),
            msg: Some(msg.into()),
            source: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn status_reports_health_and_buffer_counters() {
        let state = test_state();
        state
            .devices
            .lock()
            .update_device(HeartbeatIn {
                id: Some("LEFT".into()),
                seq: Some(1),
                uptime_ms: None,
                free_heap: None,
                extra: Default::default(),
            })
            .unwrap();
        state.logs.lock().add(log("fx", "boot"));

        let Json(v) = get_status(State(state)).await;
        assert_eq!(v["systemHealth"]["status"], "healthy");
        assert_eq!(v["devices"][0]["id"], "LEFT");
        assert_eq!(v["logBufferSize"], 1);
        assert_eq!(v["logBufferMaxSize"], 100);
        assert!(v["timestamp"].is_string());
    }

    #[tokio::test]
    async fn logs_endpoint_filters_and_counts() {
        let state = test_state();
        {
            let mut logs = state.logs.lock();
            logs.add(log("sender", "hello"));
            logs.add(log("fx", "other"));
            logs.add(log("sender", "world"));
        }
        let q = LogQuery {
            component: Some("sender".into()),
            limit: Some(1),
            ..Default::default()
        };
        let Json(v) = get_logs(State(state), Query(q)).await;
        assert_eq!(v["total"], 2);
        assert_eq!(v["logs"].as_array().unwrap().len(), 1);
        assert_eq!(v["logs"][0]["msg"], "world");
    }

    #[tokio::test]
    async fn devices_endpoint_is_empty_without_heartbeats() {
        let state = test_state();
        let Json(v) = get_devices(State(state)).await;
        assert_eq!(v["devices"], json!([]));
    }

    #[tokio::test]
    async fn init_snapshot_carries_devices_and_recent_logs() {
        let state = test_state();
        state.logs.lock().add(log("fx", "boot"));
        let init: Value = serde_json::from_str(&build_init(&state)).unwrap();
        assert_eq!(init["type"], "init");
        assert_eq!(init["recentLogs"][0]["msg"], "boot");
        assert_eq!(init["devices"], json!([]));
    }
}
