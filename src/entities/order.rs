use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Order lifecycle. Stored as a string column; `Display`/`FromStr` give the
/// canonical wire form.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting manual bank-transfer confirmation
    Pending,
    /// Created, awaiting a Stripe checkout completion
    PaymentPending,
    /// Payment received
    Confirmed,
    /// Being packed
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// How the customer chose to pay the order total
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Full,
    /// Deposit now, remainder on delivery (live animals)
    Deposit,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate, utoipa::ToSchema)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    /// Signed-in LINE user who placed the order, if any
    pub user_id: Option<Uuid>,

    pub status: String,

    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub discount_code: Option<String>,

    pub payment_type: String,
    pub deposit_amount: Option<Decimal>,
    pub remaining_amount: Option<Decimal>,

    pub shipping_option_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub shipping_fee: Decimal,

    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: String,

    /// Order contains live animals; restricts shipping options
    pub has_pets: bool,
    pub requires_deposit: bool,

    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::payment_notification::Entity")]
    PaymentNotifications,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::shipping_option::Entity",
        from = "Column::ShippingOptionId",
        to = "super::shipping_option::Column::Id"
    )]
    ShippingOption,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::payment_notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentNotifications.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::shipping_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingOption.def()
    }
}

impl Model {
    pub fn status(&self) -> Result<OrderStatus, strum::ParseError> {
        self.status.parse()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(OrderStatus::PaymentPending.to_string(), "PAYMENT_PENDING");
        assert_eq!(
            "PAYMENT_PENDING".parse::<OrderStatus>().unwrap(),
            OrderStatus::PaymentPending
        );
        assert_eq!(
            "confirmed".parse::<OrderStatus>().unwrap(),
            OrderStatus::Confirmed
        );
        assert!("SHIPPED_MAYBE".parse::<OrderStatus>().is_err());
    }
}
