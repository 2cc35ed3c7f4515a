use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Petshop API",
        version = "1.0.0",
        description = r#"
# Petshop storefront & back-office API

Backend for the pet-shop storefront and its admin back office.

## Features

- **Catalog**: categories, products, product images
- **Orders**: atomic order creation with stock decrements and discount redemption
- **Discount codes**: percentage and fixed-amount codes with usage limits
- **Shipping options**: delivery methods, including pet-only couriers
- **Payments**: Stripe Checkout sessions, webhook confirmation, manual transfer slips
- **Blog**: posts and categories for the content pages
- **LINE**: sign-in, admin order alerts and customer receipts

## Authentication

Storefront browsing is public. Session endpoints and the admin back office
take a bearer token minted by `POST /api/auth/line`:

```
Authorization: Bearer <session-token>
```

## Error handling

Errors use a consistent JSON shape with appropriate HTTP status codes:

```json
{
  "error": "Bad Request",
  "message": "Validation error: ...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Categories", description = "Product category endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order management endpoints"),
        (name = "Discounts", description = "Discount code endpoints"),
        (name = "Shipping", description = "Shipping option endpoints"),
        (name = "Checkout", description = "Stripe checkout endpoints"),
        (name = "Webhooks", description = "Payment webhook endpoints"),
        (name = "Payments", description = "Payment notification endpoints"),
        (name = "Blog", description = "Blog endpoints"),
        (name = "Auth", description = "LINE sign-in and sessions"),
        (name = "Uploads", description = "File upload endpoints"),
        (name = "Users", description = "User administration"),
        (name = "Admin", description = "Back-office endpoints")
    ),
    paths(
        // Catalog
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,

        // Discounts
        crate::handlers::discount_codes::validate_code,
        crate::handlers::discount_codes::create_code,

        // Shipping
        crate::handlers::shipping_options::list_options,
        crate::handlers::shipping_options::create_option,

        // Payments
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::stripe_webhooks::stripe_webhook,
        crate::handlers::payment_notifications::set_status,

        // Blog
        crate::handlers::blog::list_posts,
        crate::handlers::blog::get_post,
        crate::handlers::blog::create_post,

        // Auth & users
        crate::handlers::auth::line_sign_in,
        crate::handlers::auth::me,
        crate::handlers::users::set_role,

        // Uploads
        crate::handlers::uploads::upload_payment_slip,
        crate::handlers::uploads::upload_image,
        crate::handlers::uploads::uploads_health,

        // Admin
        crate::handlers::stats::dashboard,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Entities
            crate::entities::category::Model,
            crate::entities::product::Model,
            crate::entities::product_image::Model,
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentType,
            crate::entities::order_item::Model,
            crate::entities::discount_code::Model,
            crate::entities::discount_code::DiscountType,
            crate::entities::shipping_option::Model,
            crate::entities::payment_notification::Model,
            crate::entities::payment_notification::PaymentNotificationStatus,
            crate::entities::user::Model,
            crate::entities::blog_post::Model,
            crate::entities::blog_category::Model,

            // Request/response types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItemRequest,
            crate::services::orders::OrderWithItems,
            crate::services::catalog::CreateProductRequest,
            crate::services::catalog::ProductWithImages,
            crate::services::catalog::CreateCategoryRequest,
            crate::services::discounts::CreateDiscountCodeRequest,
            crate::services::discounts::DiscountQuote,
            crate::services::shipping::CreateShippingOptionRequest,
            crate::services::blog::CreateBlogPostRequest,
            crate::services::payments::CheckoutSession,
            crate::services::stats::DashboardStats,
            crate::handlers::auth::SessionResponse,
            crate::handlers::uploads::UploadedFile,
            crate::handlers::uploads::UploadsHealth,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Petshop API"));
        assert!(json.contains("/api/orders"));
        assert!(json.contains("/api/webhooks/stripe"));
    }
}
