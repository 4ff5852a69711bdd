use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::application::dtos::session_dto::SessionCreatedEvent;
use crate::application::ports::auth_ports::SessionEventPort;

/// Difunde las sesiones nuevas a cualquier suscriptor (alertas de seguridad, auditoría)
pub struct BroadcastSessionNotifier {
    sender: broadcast::Sender<SessionCreatedEvent>,
}

impl BroadcastSessionNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionCreatedEvent> {
        self.sender.subscribe()
    }

    /// Logs every new session until the channel closes
    pub fn spawn_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => info!(
                        user_id = %event.user_id,
                        session_id = %event.session_id,
                        device = %event.device_type,
                        "New session from {}",
                        event.ip_address.as_deref().unwrap_or("unknown address")
                    ),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Session logger skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[async_trait]
impl SessionEventPort for BroadcastSessionNotifier {
    async fn session_created(&self, event: SessionCreatedEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("Session event delivered to {} subscribers", receivers),
            Err(_) => debug!("Session event dropped, no subscribers"),
        }
    }
}
