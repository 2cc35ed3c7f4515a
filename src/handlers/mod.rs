pub mod auth;
pub mod blog;
pub mod categories;
pub mod checkout;
pub mod discount_codes;
pub mod orders;
pub mod payment_notifications;
pub mod products;
pub mod shipping_options;
pub mod stats;
pub mod stripe_webhooks;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::catalog::CatalogService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub discounts: Arc<crate::services::discounts::DiscountService>,
    pub shipping: Arc<crate::services::shipping::ShippingService>,
    pub blog: Arc<crate::services::blog::BlogService>,
    pub users: Arc<crate::services::users::UserService>,
    pub notifications: Arc<crate::services::notifications::NotificationService>,
    pub stats: Arc<crate::services::stats::StatsService>,
    pub stripe: Arc<crate::services::payments::StripeClient>,
    pub line: Arc<crate::services::line::LineClient>,
}

impl AppServices {
    /// Build the service container shared by all HTTP handlers.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, event_sender: EventSender) -> Self {
        let catalog = Arc::new(crate::services::catalog::CatalogService::new(
            db_pool.clone(),
        ));
        let discounts = crate::services::discounts::DiscountService::new(db_pool.clone());
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            discounts.clone(),
            event_sender.clone(),
        ));
        let shipping = Arc::new(crate::services::shipping::ShippingService::new(
            db_pool.clone(),
        ));
        let blog = Arc::new(crate::services::blog::BlogService::new(db_pool.clone()));
        let users = Arc::new(crate::services::users::UserService::new(db_pool.clone()));
        let stats = Arc::new(crate::services::stats::StatsService::new(db_pool.clone()));
        let stripe = Arc::new(crate::services::payments::StripeClient::new(&config.stripe));
        let line = Arc::new(crate::services::line::LineClient::new(&config.line));
        let notifications = Arc::new(crate::services::notifications::NotificationService::new(
            db_pool,
            line.clone(),
            orders.clone(),
            event_sender,
        ));

        Self {
            catalog,
            orders,
            discounts: Arc::new(discounts),
            shipping,
            blog,
            users,
            notifications,
            stats,
            stripe,
            line,
        }
    }
}
