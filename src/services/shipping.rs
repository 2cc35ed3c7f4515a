use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::shipping_option::{self, Entity as ShippingOptionEntity},
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateShippingOptionRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub estimated_days: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub for_pets_only: bool,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateShippingOptionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub estimated_days: Option<String>,
    pub method: Option<String>,
    pub for_pets_only: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Service for delivery methods offered at checkout.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Options offered to a cart. Pet-only couriers are hidden from orders
    /// without live animals; all active options remain available otherwise.
    pub async fn list_for_checkout(
        &self,
        has_pets: bool,
    ) -> Result<Vec<shipping_option::Model>, ServiceError> {
        let mut query = ShippingOptionEntity::find()
            .filter(shipping_option::Column::IsActive.eq(true))
            .order_by_asc(shipping_option::Column::SortOrder);

        if !has_pets {
            query = query.filter(shipping_option::Column::ForPetsOnly.eq(false));
        }

        Ok(query.all(&*self.db).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<shipping_option::Model>, ServiceError> {
        Ok(ShippingOptionEntity::find()
            .order_by_asc(shipping_option::Column::SortOrder)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<shipping_option::Model, ServiceError> {
        ShippingOptionEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipping option {} not found", id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateShippingOptionRequest,
    ) -> Result<shipping_option::Model, ServiceError> {
        request.validate()?;

        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Shipping price cannot be negative".to_string(),
            ));
        }

        let model = shipping_option::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            estimated_days: Set(request.estimated_days),
            method: Set(request.method),
            for_pets_only: Set(request.for_pets_only),
            sort_order: Set(request.sort_order.unwrap_or(0)),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;
        info!(id = %created.id, "Shipping option created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateShippingOptionRequest,
    ) -> Result<shipping_option::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: shipping_option::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Shipping price cannot be negative".to_string(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(estimated_days) = request.estimated_days {
            active.estimated_days = Set(Some(estimated_days));
        }
        if let Some(method) = request.method {
            active.method = Set(Some(method));
        }
        if let Some(for_pets_only) = request.for_pets_only {
            active.for_pets_only = Set(for_pets_only);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(sort_order) = request.sort_order {
            active.sort_order = Set(sort_order);
        }

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing.delete(&*self.db).await?;
        info!(id = %id, "Shipping option deleted");
        Ok(())
    }
}
