/**
 * WS HUB - Canal push temps réel vers les dashboards navigateur
 *
 * RÔLE : Registre des clients WebSocket connectés + fan-out des événements
 * log et heartbeat. Le handshake Upgrade et le framing RFC 6455 sont portés
 * par la feature `ws` d'axum (tungstenite), y compris ping/pong et masking.
 *
 * FONCTIONNEMENT :
 * - Un tokio::sync::broadcast partagé : chaque client connecté tient un
 *   Receiver, le nombre d'abonnés EST le nombre de clients
 * - Envoi fire-and-forget : un client lent saute des messages (Lagged),
 *   un client disparu est désabonné en silence, jamais d'erreur remontée
 *   au broadcaster
 * - Les trames entrantes des clients sont lues puis ignorées : le canal
 *   est volontairement push-only
 */

use crate::devices::DeviceSnapshot;
use crate::models::LogEntry;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

/// Nombre de logs récents envoyés dans le snapshot init à la connexion.
pub const INIT_RECENT_LOGS: usize = 50;

#[derive(Debug, Clone)]
pub enum HubEvent {
    Data(String),
    Shutdown,
}

#[derive(Clone)]
pub struct WsHub {
    tx: broadcast::Sender<HubEvent>,
}

impl WsHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    fn send<T: Serialize>(&self, payload: &T) {
        if let Ok(txt) = serde_json::to_string(payload) {
            // Err = aucun client connecté, rien à faire
            let _ = self.tx.send(HubEvent::Data(txt));
        }
    }

    pub fn broadcast_log(&self, entry: &LogEntry) {
        self.send(&json!({ "type": "log", "entry": entry }));
    }

    pub fn broadcast_heartbeat(&self, device: &DeviceSnapshot) {
        self.send(&json!({ "type": "heartbeat", "device": device }));
    }

    /// Déconnecte tous les clients et vide le registre. Idempotent.
    pub fn close_all(&self) {
        let _ = self.tx.send(HubEvent::Shutdown);
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Boucle d'un client connecté : snapshot init, puis relais des broadcasts
/// jusqu'à déconnexion ou close_all.
pub async fn handle_socket(socket: WebSocket, hub: WsHub, init: String) {
    // s'abonner avant d'envoyer l'init pour ne rien rater entre les deux
    let mut rx = hub.subscribe();
    let (mut sender, mut receiver) = socket.split();

    if sender.send(Message::Text(init.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Ok(HubEvent::Data(txt)) => {
                    if sender.send(Message::Text(txt.into())).await.is_err() {
                        break; // client parti, désabonnement silencieux
                    }
                }
                Ok(HubEvent::Shutdown) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // trames client décodées mais non traitées
                Some(Err(_)) => break,
            },
        }
    }
}
