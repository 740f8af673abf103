use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
}

/// Récepteur UDP d'un flux de datagrammes JSON (logs ou heartbeats).
/// Un datagramme qui ne parse pas est loggé et jeté, la socket continue :
/// une trame corrompue ne doit jamais tuer l'ingestion.
pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    tag: &'static str,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpReceiver {
    /// port 0 = port éphémère choisi par l'OS, lisible via local_port().
    /// Un échec de bind est fatal au démarrage, jamais en cours de route.
    pub async fn bind(port: u16, tag: &'static str) -> Result<Self, ReceiverError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| ReceiverError::Bind { port, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ReceiverError::Bind { port, source })?;
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            tag,
            task: Mutex::new(None),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Démarre la boucle de lecture : chaque datagramme parsé avec succès
    /// est passé au callback avec l'adresse de l'émetteur.
    pub fn spawn<F>(&self, mut on_message: F)
    where
        F: FnMut(Value, SocketAddr) + Send + 'static,
    {
        let socket = self.socket.clone();
        let tag = self.tag;
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => match serde_json::from_slice::<Value>(&buf[..len]) {
                        Ok(value) => on_message(value, addr),
                        Err(_) => {
                            eprintln!("[udp:{tag}] datagramme non-JSON de {addr}, ignoré");
                        }
                    },
                    Err(e) => {
                        // erreur transitoire (ICMP port unreachable, etc.)
                        eprintln!("[udp:{tag}] recv error: {e}");
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);
    }

    /// Idempotent : le deuxième close est un no-op.
    pub fn close(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            println!("[udp:{}] receiver closed", self.tag);
        }
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.close();
    }
}
