use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        payment_notification::{
            self, Entity as PaymentNotificationEntity, PaymentNotificationStatus,
        },
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
};

const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LowStockProduct {
    pub id: uuid::Uuid,
    pub name: String,
    pub stock: i32,
}

/// Counters shown on the back-office dashboard.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DashboardStats {
    pub total_orders: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    /// Sum of totals over paid orders
    pub revenue: Decimal,
    pub pending_payment_notifications: u64,
    pub active_products: u64,
    pub low_stock_products: Vec<LowStockProduct>,
}

#[derive(FromQueryResult)]
struct RevenueRow {
    revenue: Option<Decimal>,
}

/// Read-only aggregate queries for the admin dashboard.
#[derive(Clone)]
pub struct StatsService {
    db: Arc<DatabaseConnection>,
}

impl StatsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardStats, ServiceError> {
        let total_orders = OrderEntity::find().count(&*self.db).await?;

        let mut orders_by_status = BTreeMap::new();
        for status in [
            OrderStatus::Pending,
            OrderStatus::PaymentPending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let count = OrderEntity::find()
                .filter(order::Column::Status.eq(status.to_string()))
                .count(&*self.db)
                .await?;
            orders_by_status.insert(status.to_string(), count);
        }

        let paid_statuses = [
            OrderStatus::Confirmed.to_string(),
            OrderStatus::Processing.to_string(),
            OrderStatus::Shipped.to_string(),
            OrderStatus::Delivered.to_string(),
        ];
        let revenue = OrderEntity::find()
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "revenue")
            .filter(order::Column::Status.is_in(paid_statuses))
            .into_model::<RevenueRow>()
            .one(&*self.db)
            .await?
            .and_then(|row| row.revenue)
            .unwrap_or(Decimal::ZERO);

        let pending_payment_notifications = PaymentNotificationEntity::find()
            .filter(
                payment_notification::Column::Status
                    .eq(PaymentNotificationStatus::Pending.to_string()),
            )
            .count(&*self.db)
            .await?;

        let active_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .count(&*self.db)
            .await?;

        let low_stock_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Stock.lte(LOW_STOCK_THRESHOLD))
            .order_by_asc(product::Column::Stock)
            .limit(20)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| LowStockProduct {
                id: p.id,
                name: p.name,
                stock: p.stock,
            })
            .collect();

        Ok(DashboardStats {
            total_orders,
            orders_by_status,
            revenue,
            pending_payment_notifications,
            active_products,
            low_stock_products,
        })
    }
}
