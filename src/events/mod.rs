use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::ServiceError;
use tracing::{info, warn};
use uuid::Uuid;

/// Cart lifecycle events, published after the mutation has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CartCreated(Uuid),
    CartItemAdded {
        cart_id: Uuid,
        product_id: i32,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        product_id: i32,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        product_id: i32,
    },
    CartCleared(Uuid),
    CartDiscarded(Uuid),
    CartsMerged {
        user_cart_id: Uuid,
        anonymous_cart_id: Uuid,
        lines_merged: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    ///
    /// # Errors
    /// Returns `ServiceError::EventError` when the receiving side has been dropped
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "Dropping cart event");
        }
    }
}

/// Drains the event channel until every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CartsMerged {
                user_cart_id,
                anonymous_cart_id,
                lines_merged,
            } => info!(
                %user_cart_id,
                %anonymous_cart_id,
                lines_merged,
                "Anonymous cart merged into user cart"
            ),
            other => info!(event = ?other, "Cart event"),
        }
    }

    info!("Event channel closed; stopping event processing loop");
}
