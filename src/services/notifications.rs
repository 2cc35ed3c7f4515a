use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        order,
        payment_notification::{
            self, Entity as PaymentNotificationEntity, PaymentNotificationStatus,
        },
        user::Entity as UserEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{line::LineClient, orders::OrderService},
};

/// Service for payment notifications: the per-payment-event records behind
/// both Stripe webhooks and manually uploaded transfer slips.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    line: Arc<LineClient>,
    orders: Arc<OrderService>,
    event_sender: EventSender,
}

impl NotificationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        line: Arc<LineClient>,
        orders: Arc<OrderService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            line,
            orders,
            event_sender,
        }
    }

    /// Record one payment event, at most once per `slip_key`.
    ///
    /// Returns `Some(row)` when this call created the record, `None` when the
    /// key was already recorded (duplicate webhook delivery). The existence
    /// check handles the common case; the unique index on the key column
    /// turns a true concurrent race into a constraint error, which is treated
    /// the same as "already recorded".
    #[instrument(skip(self), fields(order_id = %order_id, slip_key = %slip_key))]
    pub async fn record_payment_event(
        &self,
        order_id: Uuid,
        slip_key: &str,
        amount: Decimal,
        status: PaymentNotificationStatus,
        note: Option<String>,
    ) -> Result<Option<payment_notification::Model>, ServiceError> {
        let existing = PaymentNotificationEntity::find()
            .filter(payment_notification::Column::SlipFilename.eq(slip_key))
            .one(&*self.db)
            .await?;

        if existing.is_some() {
            info!("Payment event already recorded, skipping");
            return Ok(None);
        }

        let model = payment_notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            transfer_amount: Set(amount),
            transfer_date: Set(Utc::now()),
            slip_filename: Set(slip_key.to_string()),
            slip_url: Set(None),
            status: Set(status.to_string()),
            note: Set(note),
            ..Default::default()
        };

        match model.insert(&*self.db).await {
            Ok(created) => {
                self.event_sender
                    .send(Event::PaymentRecorded {
                        order_id,
                        event_key: slip_key.to_string(),
                        amount,
                    })
                    .await;
                Ok(Some(created))
            }
            Err(err) => {
                let service_err = ServiceError::from(err);
                if matches!(service_err, ServiceError::Conflict(_)) {
                    // Lost a race against a concurrent duplicate delivery.
                    info!("Payment event recorded concurrently, skipping");
                    Ok(None)
                } else {
                    Err(service_err)
                }
            }
        }
    }

    /// Record a manually uploaded bank-transfer slip as a pending
    /// notification for admin review.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn record_transfer_slip(
        &self,
        order_id: Uuid,
        amount: Decimal,
        transfer_date: DateTime<Utc>,
        slip_filename: String,
        slip_url: String,
    ) -> Result<payment_notification::Model, ServiceError> {
        let model = payment_notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            transfer_amount: Set(amount),
            transfer_date: Set(transfer_date),
            slip_filename: Set(slip_filename),
            slip_url: Set(Some(slip_url)),
            status: Set(PaymentNotificationStatus::Pending.to_string()),
            note: Set(None),
            ..Default::default()
        };

        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list(
        &self,
        status: Option<PaymentNotificationStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<payment_notification::Model>, u64), ServiceError> {
        let mut query = PaymentNotificationEntity::find()
            .order_by_desc(payment_notification::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(payment_notification::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<payment_notification::Model, ServiceError> {
        PaymentNotificationEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment notification {} not found", id))
            })
    }

    /// Approve or reject a manually submitted payment.
    ///
    /// Only the Pending → Approved transition confirms the linked order and
    /// sends the customer receipt, so re-approving an approved notification
    /// cannot double-confirm or double-push.
    #[instrument(skip(self), fields(id = %id, new_status = %new_status))]
    pub async fn set_status(
        &self,
        id: Uuid,
        new_status: PaymentNotificationStatus,
        note: Option<String>,
    ) -> Result<payment_notification::Model, ServiceError> {
        let existing = self.get(id).await?;
        let was_pending = existing.status()? == PaymentNotificationStatus::Pending;
        let order_id = existing.order_id;
        let amount = existing.transfer_amount;

        let mut active: payment_notification::ActiveModel = existing.into();
        active.status = Set(new_status.to_string());
        if let Some(note) = note {
            active.note = Set(Some(note));
        }
        let updated = active.update(&*self.db).await?;

        if was_pending && new_status == PaymentNotificationStatus::Approved {
            self.orders.confirm_paid(order_id).await?;
            self.send_receipt(order_id, amount).await;
        }

        Ok(updated)
    }

    /// Push a payment receipt to the customer's LINE account.
    ///
    /// Best-effort: the payment is already recorded, so a failed push is
    /// logged and swallowed rather than failing the caller.
    pub async fn send_receipt(&self, order_id: Uuid, amount: Decimal) {
        let result = self.try_send_receipt(order_id, amount).await;
        if let Err(err) = result {
            warn!(order_id = %order_id, error = %err, "Failed to push LINE receipt");
        }
    }

    async fn try_send_receipt(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let order_with_items = self.orders.get_order(order_id).await?;
        let order: &order::Model = &order_with_items.order;

        let Some(user_id) = order.user_id else {
            info!(order_id = %order_id, "Order has no linked LINE account, skipping receipt");
            return Ok(());
        };

        let customer = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let message = LineClient::order_receipt(order, &order_with_items.items, amount);
        self.line
            .push_message(&customer.line_user_id, message)
            .await
    }
}
