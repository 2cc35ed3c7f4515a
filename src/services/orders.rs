use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        discount_code,
        order::{self, Entity as OrderEntity, OrderStatus, PaymentType},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        shipping_option::Entity as ShippingOptionEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::discounts::DiscountService,
};

/// Regenerating a colliding order number is bounded; past this the request fails.
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 10;

/// Share of the total charged up front for deposit orders.
const DEPOSIT_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderItemRequest>,

    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub customer_name: String,

    #[validate(length(min = 1, max = 50, message = "Customer phone is required"))]
    pub customer_phone: String,

    #[validate(email(message = "Customer email must be a valid address"))]
    pub customer_email: Option<String>,

    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub customer_address: String,

    pub shipping_option_id: Uuid,
    pub discount_code: Option<String>,
    pub note: Option<String>,

    /// Filled in by the handler from the session, never by the client
    #[serde(skip)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Service for creating and managing orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    discounts: DiscountService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        discounts: DiscountService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            discounts,
            event_sender,
        }
    }

    /// Create an order.
    ///
    /// Order insert, item inserts, stock decrements and the discount usage
    /// increment all run inside one transaction; any failure aborts the whole
    /// thing, so stock is never decremented without a matching order. The
    /// stock decrement is guarded (`stock >= quantity`) so concurrent orders
    /// cannot oversell regardless of what the pre-check saw.
    #[instrument(skip(self, request), fields(customer = %request.customer_name))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;

        let shipping = ShippingOptionEntity::find_by_id(request.shipping_option_id)
            .one(&*self.db)
            .await?
            .filter(|option| option.is_active)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Order references an unknown shipping option ({})",
                    request.shipping_option_id
                ))
            })?;

        // Quantities per product; a product listed twice gets one combined row.
        let mut quantities: HashMap<Uuid, i32> = HashMap::new();
        for item in &request.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }
            *quantities.entry(item.product_id).or_insert(0) += item.quantity;
        }

        let mut products = Vec::with_capacity(quantities.len());
        for (&product_id, &quantity) in &quantities {
            let model = ProductEntity::find_by_id(product_id)
                .one(&*self.db)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Order references an unknown product ({})",
                        product_id
                    ))
                })?;

            if model.stock < quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for {}: requested {}, available {}",
                    model.name, quantity, model.stock
                )));
            }
            products.push((model, quantity));
        }

        let has_pets = products
            .iter()
            .any(|(p, _)| p.product_type.as_deref() == Some("pet"));

        if shipping.for_pets_only && !has_pets {
            return Err(ServiceError::ValidationError(format!(
                "Shipping option {} is only available for orders with pets",
                shipping.name
            )));
        }

        let subtotal: Decimal = products
            .iter()
            .map(|(p, qty)| p.effective_price() * Decimal::from(*qty))
            .sum();

        // Discount validation happens before the transaction; the usage
        // counter is re-checked when it is incremented inside it.
        let discount = match request.discount_code.as_deref() {
            Some(code) => Some(self.discounts.validate_code(code, subtotal).await?),
            None => None,
        };
        let discount_amount = discount
            .as_ref()
            .map(|(_, quote)| quote.discount_amount)
            .unwrap_or(Decimal::ZERO);

        let total_amount = subtotal - discount_amount + shipping.price;

        // Live animals are paid half up front, remainder on delivery.
        let requires_deposit = has_pets;
        let (payment_type, deposit_amount, remaining_amount) = if requires_deposit {
            let deposit = (total_amount * DEPOSIT_RATE).round_dp(2);
            (
                PaymentType::Deposit,
                Some(deposit),
                Some(total_amount - deposit),
            )
        } else {
            (PaymentType::Full, None, None)
        };

        let order_number = find_free_order_number(&*self.db, random_order_number).await?;
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(request.user_id),
            status: Set(OrderStatus::Pending.to_string()),
            total_amount: Set(total_amount),
            discount_amount: Set(discount_amount),
            discount_code: Set(discount.as_ref().map(|(model, _)| model.code.clone())),
            payment_type: Set(payment_type.to_string()),
            deposit_amount: Set(deposit_amount),
            remaining_amount: Set(remaining_amount),
            shipping_option_id: Set(Some(shipping.id)),
            shipping_method: Set(Some(shipping.name.clone())),
            shipping_fee: Set(shipping.price),
            customer_name: Set(request.customer_name.clone()),
            customer_phone: Set(request.customer_phone),
            customer_email: Set(request.customer_email),
            customer_address: Set(request.customer_address),
            has_pets: Set(has_pets),
            requires_deposit: Set(requires_deposit),
            note: Set(request.note),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(products.len());
        for (product_model, quantity) in &products {
            // Price snapshot: the item keeps the price paid even if the
            // product is repriced later.
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_model.id),
                quantity: Set(*quantity),
                price: Set(product_model.effective_price()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);

            let update = ProductEntity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(*quantity),
                )
                .filter(product::Column::Id.eq(product_model.id))
                .filter(product::Column::Stock.gte(*quantity))
                .exec(&txn)
                .await?;

            if update.rows_affected == 0 {
                // Another order got there first; abort the whole transaction.
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for {}",
                    product_model.name
                )));
            }
        }

        if let Some((code_model, _)) = &discount {
            let update = discount_code::Entity::update_many()
                .col_expr(
                    discount_code::Column::UsageCount,
                    Expr::col(discount_code::Column::UsageCount).add(1),
                )
                .filter(discount_code::Column::Id.eq(code_model.id))
                .filter(
                    Condition::any()
                        .add(discount_code::Column::UsageLimit.is_null())
                        .add(
                            Expr::col(discount_code::Column::UsageCount)
                                .lt(Expr::col(discount_code::Column::UsageLimit)),
                        ),
                )
                .exec(&txn)
                .await?;

            if update.rows_affected == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Discount code {} has reached its usage limit",
                    code_model.code
                )));
            }
        }

        txn.commit().await?;

        info!(order_number = %order_number, total = %total_amount, "Order created");

        self.event_sender
            .send(Event::OrderCreated {
                order_id,
                order_number: order_number.clone(),
                customer_name: request.customer_name,
                total_amount,
            })
            .await;

        Ok(OrderWithItems {
            order: order_model,
            items,
        })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let model = OrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        self.with_items(model).await
    }

    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let model = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", order_number))
            })?;
        self.with_items(model).await
    }

    pub async fn items_of(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    async fn with_items(&self, model: order::Model) -> Result<OrderWithItems, ServiceError> {
        let items = self.items_of(model.id).await?;
        Ok(OrderWithItems {
            order: model,
            items,
        })
    }

    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);

        if let Some(status) = &filter.status {
            let parsed: OrderStatus = status.parse().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown order status: {}", status))
            })?;
            query = query.filter(order::Column::Status.eq(parsed.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Move an order to a new status. Orders are immutable after creation
    /// except for this field.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let model = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = model.status.clone();
        if old_status == new_status.to_string() {
            return Ok(model);
        }

        let mut active: order::ActiveModel = model.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: new_status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Confirm an order after a successful payment, unless it already moved
    /// past the payable states.
    pub async fn confirm_paid(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let model = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        match model.status().ok() {
            Some(OrderStatus::Pending) | Some(OrderStatus::PaymentPending) => {
                self.update_status(order_id, OrderStatus::Confirmed).await
            }
            _ => {
                warn!(order_id = %order_id, status = %model.status, "Payment received for an order that is not awaiting payment");
                Ok(model)
            }
        }
    }
}

fn random_order_number() -> String {
    let timestamp = Utc::now().format("%y%m%d%H%M%S");
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("PS{}{:04}", timestamp, suffix)
}

/// Pick an order number no existing order uses.
///
/// Candidates come from `candidates`; each is checked against the orders
/// table, and generation is retried on collision up to
/// `MAX_ORDER_NUMBER_ATTEMPTS` times before the request fails.
async fn find_free_order_number<C, F>(conn: &C, mut candidates: F) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
    F: FnMut() -> String,
{
    for _ in 0..MAX_ORDER_NUMBER_ATTEMPTS {
        let candidate = candidates();
        let taken = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(candidate.clone()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!(order_number = %candidate, "Order number collision, regenerating");
    }

    Err(ServiceError::InternalError(
        "could not allocate a unique order number".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    async fn test_db() -> DatabaseConnection {
        // One connection keeps the in-memory database shared across queries.
        let mut options = sea_orm::ConnectOptions::new("sqlite::memory:".to_owned());
        options.max_connections(1);
        let db = Database::connect(options)
            .await
            .expect("in-memory sqlite");
        crate::migrator::Migrator::up(&db, None)
            .await
            .expect("migrations");
        db
    }

    async fn seed_order(db: &DatabaseConnection, order_number: &str) {
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(order_number.to_string()),
            user_id: Set(None),
            status: Set(OrderStatus::Pending.to_string()),
            total_amount: Set(Decimal::from(100)),
            discount_amount: Set(Decimal::ZERO),
            discount_code: Set(None),
            payment_type: Set(PaymentType::Full.to_string()),
            deposit_amount: Set(None),
            remaining_amount: Set(None),
            shipping_option_id: Set(None),
            shipping_method: Set(None),
            shipping_fee: Set(Decimal::ZERO),
            customer_name: Set("test".into()),
            customer_phone: Set("000".into()),
            customer_email: Set(None),
            customer_address: Set("addr".into()),
            has_pets: Set(false),
            requires_deposit: Set(false),
            note: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed order");
    }

    #[tokio::test]
    async fn collision_triggers_regeneration() {
        let db = test_db().await;
        seed_order(&db, "PS0001").await;

        let mut attempts = vec!["PS0002".to_string(), "PS0001".to_string()];
        let number = find_free_order_number(&db, || attempts.pop().unwrap())
            .await
            .expect("free number");
        assert_eq!(number, "PS0002");
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_an_internal_error() {
        let db = test_db().await;
        seed_order(&db, "PS0001").await;

        let mut calls = 0usize;
        let result = find_free_order_number(&db, || {
            calls += 1;
            "PS0001".to_string()
        })
        .await;

        assert!(matches!(result, Err(ServiceError::InternalError(_))));
        assert_eq!(calls, MAX_ORDER_NUMBER_ATTEMPTS);
    }

    #[test]
    fn order_numbers_carry_prefix_and_random_suffix() {
        let a = random_order_number();
        assert!(a.starts_with("PS"));
        assert_eq!(a.len(), "PS".len() + 12 + 4);
    }
}
