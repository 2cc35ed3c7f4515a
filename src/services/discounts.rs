use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::discount_code::{self, DiscountType, Entity as DiscountCodeEntity},
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateDiscountCodeRequest {
    pub value: Option<Decimal>,
    pub min_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

/// Outcome of validating a code against an order subtotal.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DiscountQuote {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
}

/// Service for managing and redeeming discount codes.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validate a code against a subtotal and compute the discount it grants.
    ///
    /// Rejections carry the reason a shopper would need: unknown code,
    /// inactive, outside its validity window, exhausted, or below the
    /// minimum order amount. This runs before the order transaction; the
    /// usage counter is checked again when it is incremented inside it.
    #[instrument(skip(self))]
    pub async fn validate_code(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<(discount_code::Model, DiscountQuote), ServiceError> {
        let normalized = code.trim().to_uppercase();
        let model = DiscountCodeEntity::find()
            .filter(discount_code::Column::Code.eq(normalized.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Discount code {} not found", normalized))
            })?;

        let quote = compute_quote(&model, subtotal, Utc::now())?;
        Ok((model, quote))
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreateDiscountCodeRequest,
    ) -> Result<discount_code::Model, ServiceError> {
        request.validate()?;

        if request.value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount value must be positive".to_string(),
            ));
        }
        if request.discount_type == DiscountType::Percentage
            && request.value > Decimal::from(100)
        {
            return Err(ServiceError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }

        let model = discount_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code.trim().to_uppercase()),
            discount_type: Set(request.discount_type.to_string()),
            value: Set(request.value),
            min_amount: Set(request.min_amount),
            max_discount: Set(request.max_discount),
            usage_limit: Set(request.usage_limit),
            usage_count: Set(0),
            valid_from: Set(request.valid_from),
            valid_until: Set(request.valid_until),
            is_active: Set(request.is_active.unwrap_or(true)),
            description: Set(request.description),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;
        info!(code = %created.code, "Discount code created");
        Ok(created)
    }

    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<discount_code::Model>, u64), ServiceError> {
        let paginator = DiscountCodeEntity::find()
            .order_by_desc(discount_code::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let codes = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((codes, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<discount_code::Model, ServiceError> {
        DiscountCodeEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount code {} not found", id)))
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateDiscountCodeRequest,
    ) -> Result<discount_code::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: discount_code::ActiveModel = existing.into();

        if let Some(value) = request.value {
            if value <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Discount value must be positive".to_string(),
                ));
            }
            active.value = Set(value);
        }
        if let Some(min_amount) = request.min_amount {
            active.min_amount = Set(Some(min_amount));
        }
        if let Some(max_discount) = request.max_discount {
            active.max_discount = Set(Some(max_discount));
        }
        if let Some(usage_limit) = request.usage_limit {
            active.usage_limit = Set(Some(usage_limit));
        }
        if let Some(valid_from) = request.valid_from {
            active.valid_from = Set(Some(valid_from));
        }
        if let Some(valid_until) = request.valid_until {
            active.valid_until = Set(Some(valid_until));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let code = existing.code.clone();
        discount_code::ActiveModel::from(existing)
            .delete(&*self.db)
            .await?;
        info!(code = %code, "Discount code deleted");
        Ok(())
    }
}

/// Compute the discount a code grants on a subtotal, or the reason it does not apply.
pub fn compute_quote(
    model: &discount_code::Model,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<DiscountQuote, ServiceError> {
    if !model.is_active {
        return Err(ServiceError::ValidationError(format!(
            "Discount code {} is no longer active",
            model.code
        )));
    }

    if let Some(valid_from) = model.valid_from {
        if now < valid_from {
            return Err(ServiceError::ValidationError(format!(
                "Discount code {} is not valid yet",
                model.code
            )));
        }
    }
    if let Some(valid_until) = model.valid_until {
        if now > valid_until {
            return Err(ServiceError::ValidationError(format!(
                "Discount code {} has expired",
                model.code
            )));
        }
    }

    if model.is_exhausted() {
        return Err(ServiceError::ValidationError(format!(
            "Discount code {} has reached its usage limit",
            model.code
        )));
    }

    if let Some(min_amount) = model.min_amount {
        if subtotal < min_amount {
            return Err(ServiceError::ValidationError(format!(
                "Order total must be at least {} to use code {}",
                min_amount, model.code
            )));
        }
    }

    let discount_type = model.discount_type()?;
    let raw = match discount_type {
        DiscountType::Percentage => subtotal * model.value / Decimal::from(100),
        DiscountType::FixedAmount => model.value,
    };

    let capped = match (discount_type, model.max_discount) {
        (DiscountType::Percentage, Some(cap)) if raw > cap => cap,
        _ => raw,
    };

    // A discount never exceeds the subtotal it applies to.
    let discount_amount = capped.min(subtotal);

    Ok(DiscountQuote {
        code: model.code.clone(),
        discount_type,
        discount_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn base_code() -> discount_code::Model {
        discount_code::Model {
            id: Uuid::new_v4(),
            code: "WELCOME10".into(),
            discount_type: "PERCENTAGE".into(),
            value: dec!(10),
            min_amount: None,
            max_discount: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            description: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn percentage_quote_is_computed_from_subtotal() {
        let quote = compute_quote(&base_code(), dec!(500), Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, dec!(50));
    }

    #[test]
    fn percentage_quote_is_capped_at_max_discount() {
        let mut code = base_code();
        code.max_discount = Some(dec!(30));
        let quote = compute_quote(&code, dec!(500), Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, dec!(30));
    }

    #[test]
    fn fixed_amount_never_exceeds_subtotal() {
        let mut code = base_code();
        code.discount_type = "FIXED_AMOUNT".into();
        code.value = dec!(100);
        let quote = compute_quote(&code, dec!(80), Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, dec!(80));
    }

    #[test]
    fn exhausted_code_is_rejected() {
        let mut code = base_code();
        code.usage_limit = Some(5);
        code.usage_count = 5;
        let err = compute_quote(&code, dec!(500), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn inactive_and_out_of_window_codes_are_rejected() {
        let now = Utc::now();

        let mut inactive = base_code();
        inactive.is_active = false;
        assert!(compute_quote(&inactive, dec!(500), now).is_err());

        let mut not_yet = base_code();
        not_yet.valid_from = Some(now + Duration::days(1));
        assert!(compute_quote(&not_yet, dec!(500), now).is_err());

        let mut expired = base_code();
        expired.valid_until = Some(now - Duration::days(1));
        assert!(compute_quote(&expired, dec!(500), now).is_err());
    }

    #[test]
    fn minimum_amount_is_enforced() {
        let mut code = base_code();
        code.min_amount = Some(dec!(300));
        assert!(compute_quote(&code, dec!(299), Utc::now()).is_err());
        assert!(compute_quote(&code, dec!(300), Utc::now()).is_ok());
    }
}
