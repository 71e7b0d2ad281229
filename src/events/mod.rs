use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ListingCreated(Uuid),
    ListingUpdated(Uuid),
    ListingDeleted(Uuid),
    CheckoutSessionCreated {
        listing_id: Uuid,
        session_id: String,
    },
    ListingSold {
        listing_id: Uuid,
        transaction_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; delivery is best-effort and never fails the request.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!("Failed to send event: {}", err);
        }
    }
}

/// Consumes events from the channel and logs them. Runs until the channel
/// closes at shutdown.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::ListingCreated(id) => info!(listing_id = %id, "listing created"),
            Event::ListingUpdated(id) => info!(listing_id = %id, "listing updated"),
            Event::ListingDeleted(id) => info!(listing_id = %id, "listing deleted"),
            Event::CheckoutSessionCreated {
                listing_id,
                session_id,
            } => info!(listing_id = %listing_id, session_id = %session_id, "checkout session created"),
            Event::ListingSold {
                listing_id,
                transaction_id,
            } => info!(listing_id = %listing_id, transaction_id = %transaction_id, "listing sold"),
        }
    }
}
