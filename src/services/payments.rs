use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    config::StripeConfig,
    entities::{discount_code, order, order_item},
    errors::ServiceError,
};

/// Checkout session returned by Stripe; the storefront redirects to `url`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCoupon {
    id: String,
}

/// Thin client for the subset of the Stripe API the shop uses: Checkout
/// Sessions and coupons. Requests are form-encoded; the base URL is
/// configurable so tests can point it at a local mock server.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
    currency: String,
    success_url: Option<String>,
    cancel_url: Option<String>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }

    /// Convert a decimal amount to the minor units Stripe expects.
    pub fn to_minor_units(amount: Decimal) -> i64 {
        (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    /// Create a Checkout Session for an order.
    ///
    /// The order id travels in the session and payment-intent metadata so the
    /// webhook handler can find the order again. For deposit orders the
    /// session charges only the deposit amount as a single line item.
    #[instrument(skip(self, order, items), fields(order_number = %order.order_number))]
    pub async fn create_checkout_session(
        &self,
        order: &order::Model,
        items: &[(order_item::Model, String)],
        coupon_id: Option<&str>,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("client_reference_id".into(), order.order_number.clone()),
            ("metadata[order_id]".into(), order.id.to_string()),
            (
                "payment_intent_data[metadata][order_id]".into(),
                order.id.to_string(),
            ),
        ];

        if let Some(url) = &self.success_url {
            params.push(("success_url".into(), url.clone()));
        }
        if let Some(url) = &self.cancel_url {
            params.push(("cancel_url".into(), url.clone()));
        }

        if let Some(deposit) = order.deposit_amount.filter(|_| order.requires_deposit) {
            params.push((
                "line_items[0][price_data][currency]".into(),
                self.currency.clone(),
            ));
            params.push((
                "line_items[0][price_data][product_data][name]".into(),
                format!("Deposit for order {}", order.order_number),
            ));
            params.push((
                "line_items[0][price_data][unit_amount]".into(),
                Self::to_minor_units(deposit).to_string(),
            ));
            params.push(("line_items[0][quantity]".into(), "1".into()));
        } else {
            for (idx, (item, name)) in items.iter().enumerate() {
                params.push((
                    format!("line_items[{}][price_data][currency]", idx),
                    self.currency.clone(),
                ));
                params.push((
                    format!("line_items[{}][price_data][product_data][name]", idx),
                    name.clone(),
                ));
                params.push((
                    format!("line_items[{}][price_data][unit_amount]", idx),
                    Self::to_minor_units(item.price).to_string(),
                ));
                params.push((
                    format!("line_items[{}][quantity]", idx),
                    item.quantity.to_string(),
                ));
            }
            if order.shipping_fee > Decimal::ZERO {
                let idx = items.len();
                params.push((
                    format!("line_items[{}][price_data][currency]", idx),
                    self.currency.clone(),
                ));
                params.push((
                    format!("line_items[{}][price_data][product_data][name]", idx),
                    "Shipping".into(),
                ));
                params.push((
                    format!("line_items[{}][price_data][unit_amount]", idx),
                    Self::to_minor_units(order.shipping_fee).to_string(),
                ));
                params.push((format!("line_items[{}][quantity]", idx), "1".into()));
            }
        }

        if let Some(coupon) = coupon_id {
            params.push(("discounts[0][coupon]".into(), coupon.to_string()));
        }

        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::PaymentFailed(format!(
                "Stripe checkout session creation failed ({}): {}",
                status, body
            )));
        }

        let session = response.json::<CheckoutSession>().await?;
        info!(session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }

    /// Create a one-off Stripe coupon mirroring a shop discount code, so the
    /// discount shows up as a discount on the Stripe-hosted checkout page.
    #[instrument(skip(self, code), fields(code = %code.code))]
    pub async fn create_coupon(
        &self,
        code: &discount_code::Model,
    ) -> Result<String, ServiceError> {
        let mut params: Vec<(String, String)> = vec![
            ("duration".into(), "once".into()),
            ("name".into(), code.code.clone()),
        ];

        match code.discount_type()? {
            discount_code::DiscountType::Percentage => {
                params.push(("percent_off".into(), code.value.to_string()));
            }
            discount_code::DiscountType::FixedAmount => {
                params.push((
                    "amount_off".into(),
                    Self::to_minor_units(code.value).to_string(),
                ));
                params.push(("currency".into(), self.currency.clone()));
            }
        }

        let url = format!("{}/v1/coupons", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ServiceError::PaymentFailed(format!(
                "Stripe coupon creation failed ({})",
                status
            )));
        }

        Ok(response.json::<StripeCoupon>().await?.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_convert_to_minor_units() {
        assert_eq!(StripeClient::to_minor_units(dec!(450)), 45000);
        assert_eq!(StripeClient::to_minor_units(dec!(19.99)), 1999);
        assert_eq!(StripeClient::to_minor_units(dec!(0.01)), 1);
    }
}
