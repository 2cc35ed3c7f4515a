use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::line::LineClient;

/// Events emitted by services after their primary transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        customer_name: String,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentRecorded {
        order_id: Uuid,
        event_key: String,
        amount: Decimal,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: String,
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

    /// Sends an event asynchronously. Failures are reported, never propagated:
    /// event delivery must not fail the transaction that produced the event.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to send event: {}", e);
        }
    }
}

/// Background event processor.
///
/// Drains the channel and forwards noteworthy events to the shop admin over
/// LINE. Push failures are logged and dropped.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    line: Option<Arc<LineClient>>,
    admin_user_id: Option<String>,
) {
    info!("Event processor started");

    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_number,
                customer_name,
                total_amount,
                ..
            } => {
                info!(order_number = %order_number, "Order created");
                if let (Some(line), Some(admin)) = (&line, &admin_user_id) {
                    let message = LineClient::admin_order_alert(
                        order_number,
                        customer_name,
                        *total_amount,
                    );
                    if let Err(e) = line.push_message(admin, message).await {
                        warn!(order_number = %order_number, error = %e, "Failed to push admin order alert");
                    }
                }
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id = %order_id, old_status = %old_status, new_status = %new_status, "Order status changed");
            }
            Event::PaymentRecorded {
                order_id,
                event_key,
                ..
            } => {
                info!(order_id = %order_id, event_key = %event_key, "Payment recorded");
            }
            Event::PaymentFailed { order_id, reason } => {
                warn!(order_id = %order_id, reason = %reason, "Payment failed");
            }
        }
    }

    info!("Event processor stopped");
}
