use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::{
    config::LineConfig,
    entities::{order, order_item},
    errors::ServiceError,
};

/// Profile returned by the LINE profile endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "pictureUrl")]
    pub picture_url: Option<String>,
}

/// Thin client for the LINE profile and Messaging APIs.
///
/// Sign-in verification and message pushes both go through here. The base URL
/// is configurable so tests can point it at a local mock server.
#[derive(Clone)]
pub struct LineClient {
    http: reqwest::Client,
    channel_access_token: String,
    api_base: String,
    push_enabled: bool,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            channel_access_token: config.channel_access_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            push_enabled: config.push_enabled,
        }
    }

    /// Verify a user access token by fetching the owner's profile.
    ///
    /// This is the sign-in check: a token LINE does not recognise yields 401.
    #[instrument(skip(self, access_token))]
    pub async fn get_profile(&self, access_token: &str) -> Result<LineProfile, ServiceError> {
        let url = format!("{}/v2/profile", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Unauthorized(
                "LINE access token was rejected".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "LINE profile request failed with status {}",
                response.status()
            )));
        }

        Ok(response.json::<LineProfile>().await?)
    }

    /// Push a message to a LINE user via the Messaging API.
    #[instrument(skip(self, message), fields(to = %to))]
    pub async fn push_message(&self, to: &str, message: Value) -> Result<(), ServiceError> {
        if !self.push_enabled {
            debug!("LINE push disabled; dropping message");
            return Ok(());
        }

        let url = format!("{}/v2/bot/message/push", self.api_base);
        let body = json!({
            "to": to,
            "messages": [message],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "LINE push failed with status {}",
                response.status()
            )));
        }

        info!("LINE message pushed");
        Ok(())
    }

    /// Flex message confirming a received payment, sent to the customer.
    pub fn order_receipt(
        order: &order::Model,
        items: &[order_item::Model],
        paid_amount: Decimal,
    ) -> Value {
        let item_rows: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "type": "box",
                    "layout": "horizontal",
                    "contents": [
                        {"type": "text", "text": format!("x{}", item.quantity), "size": "sm", "flex": 1, "color": "#8c8c8c"},
                        {"type": "text", "text": format!("฿{}", item.price * Decimal::from(item.quantity)), "size": "sm", "flex": 2, "align": "end"}
                    ]
                })
            })
            .collect();

        json!({
            "type": "flex",
            "altText": format!("Payment received for order {}", order.order_number),
            "contents": {
                "type": "bubble",
                "body": {
                    "type": "box",
                    "layout": "vertical",
                    "contents": [
                        {"type": "text", "text": "Payment received", "weight": "bold", "size": "lg", "color": "#1DB446"},
                        {"type": "text", "text": format!("Order {}", order.order_number), "size": "sm", "color": "#8c8c8c", "margin": "md"},
                        {"type": "separator", "margin": "lg"},
                        {"type": "box", "layout": "vertical", "margin": "lg", "spacing": "sm", "contents": item_rows},
                        {"type": "separator", "margin": "lg"},
                        {
                            "type": "box",
                            "layout": "horizontal",
                            "margin": "lg",
                            "contents": [
                                {"type": "text", "text": "Paid", "weight": "bold", "size": "md"},
                                {"type": "text", "text": format!("฿{}", paid_amount), "weight": "bold", "size": "md", "align": "end"}
                            ]
                        }
                    ]
                }
            }
        })
    }

    /// Flex message alerting the shop admin about a new order.
    pub fn admin_order_alert(
        order_number: &str,
        customer_name: &str,
        total_amount: Decimal,
    ) -> Value {
        json!({
            "type": "flex",
            "altText": format!("New order {}", order_number),
            "contents": {
                "type": "bubble",
                "body": {
                    "type": "box",
                    "layout": "vertical",
                    "contents": [
                        {"type": "text", "text": "New order", "weight": "bold", "size": "lg"},
                        {"type": "text", "text": order_number, "size": "sm", "color": "#8c8c8c", "margin": "md"},
                        {
                            "type": "box",
                            "layout": "horizontal",
                            "margin": "lg",
                            "contents": [
                                {"type": "text", "text": customer_name, "size": "sm", "flex": 2},
                                {"type": "text", "text": format!("฿{}", total_amount), "size": "sm", "align": "end", "weight": "bold"}
                            ]
                        }
                    ]
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn receipt_flex_lists_every_item_and_the_paid_total() {
        let order = order::Model {
            id: Uuid::new_v4(),
            order_number: "PS2408071234".into(),
            user_id: None,
            status: "CONFIRMED".into(),
            total_amount: dec!(450),
            discount_amount: dec!(0),
            discount_code: None,
            payment_type: "FULL".into(),
            deposit_amount: None,
            remaining_amount: None,
            shipping_option_id: None,
            shipping_method: None,
            shipping_fee: dec!(50),
            customer_name: "Somchai".into(),
            customer_phone: "0812345678".into(),
            customer_email: None,
            customer_address: "Bangkok".into(),
            has_pets: false,
            requires_deposit: false,
            note: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let items = vec![order_item::Model {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            quantity: 2,
            price: dec!(200),
            created_at: Utc::now(),
        }];

        let flex = LineClient::order_receipt(&order, &items, dec!(450));
        assert_eq!(flex["type"], "flex");
        let alt = flex["altText"].as_str().unwrap();
        assert!(alt.contains("PS2408071234"));

        let body = &flex["contents"]["body"]["contents"];
        let rows = body[3]["contents"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn admin_alert_carries_order_number_and_total() {
        let flex = LineClient::admin_order_alert("PS2408079999", "Suda", dec!(1200));
        assert!(flex["altText"].as_str().unwrap().contains("PS2408079999"));
    }
}
