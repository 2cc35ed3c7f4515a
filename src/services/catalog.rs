use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        category::{self, Entity as CategoryEntity},
        product::{self, Entity as ProductEntity},
        product_image::{self, Entity as ProductImageEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub animal_type: Option<String>,
    pub product_type: Option<String>,
    pub search: Option<String>,
    /// Only products with a sale price
    pub on_sale: Option<bool>,
    /// Only products with stock remaining
    pub in_stock: Option<bool>,
    /// Admin listings pass false to see inactive products too
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub discount_percent: Option<i32>,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub stock: Option<i32>,
    pub product_type: Option<String>,
    pub animal_type: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub dimensions: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Vec<NewProductImage>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewProductImage {
    pub url: String,
    pub alt: Option<String>,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Option<Decimal>>,
    pub discount_percent: Option<Option<i32>>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub product_type: Option<String>,
    pub animal_type: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub dimensions: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProductWithImages {
    #[serde(flatten)]
    pub product: product::Model,
    pub images: Vec<product_image::Model>,
}

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Key is required"))]
    pub key: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub animal_type: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub animal_type: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Service for the product catalog: categories, products and their images.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ---- categories ----

    pub async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<category::Model>, ServiceError> {
        let mut query = CategoryEntity::find().order_by_asc(category::Column::SortOrder);
        if !include_inactive {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        Ok(query.all(&*self.db).await?)
    }

    pub async fn get_category_by_key(&self, key: &str) -> Result<category::Model, ServiceError> {
        CategoryEntity::find()
            .filter(category::Column::Key.eq(key))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", key)))
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(request.key.trim().to_lowercase()),
            name: Set(request.name),
            icon: Set(request.icon),
            description: Set(request.description),
            animal_type: Set(request.animal_type),
            sort_order: Set(request.sort_order.unwrap_or(0)),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;
        info!(key = %created.key, "Category created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update_category(
        &self,
        id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        let existing = CategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;

        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(icon) = request.icon {
            active.icon = Set(Some(icon));
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(animal_type) = request.animal_type {
            active.animal_type = Set(Some(animal_type));
        }
        if let Some(sort_order) = request.sort_order {
            active.sort_order = Set(sort_order);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(&*self.db).await?)
    }

    /// Deleting a category detaches its products (FK set-null) rather than
    /// deleting them; the storefront hides products whose category is gone.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = CategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;

        existing.delete(&*self.db).await?;
        Ok(())
    }

    // ---- products ----

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ProductWithImages>, u64), ServiceError> {
        let mut condition = Condition::all();
        if filter.active_only.unwrap_or(true) {
            condition = condition.add(product::Column::IsActive.eq(true));
        }
        if let Some(category) = &filter.category {
            condition = condition.add(product::Column::Category.eq(category.clone()));
        }
        if let Some(animal_type) = &filter.animal_type {
            condition = condition.add(product::Column::AnimalType.eq(animal_type.clone()));
        }
        if let Some(product_type) = &filter.product_type {
            condition = condition.add(product::Column::ProductType.eq(product_type.clone()));
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search.trim());
            condition = condition.add(
                Condition::any()
                    .add(product::Column::Name.like(pattern.clone()))
                    .add(product::Column::Description.like(pattern)),
            );
        }
        if filter.on_sale.unwrap_or(false) {
            condition = condition.add(product::Column::SalePrice.is_not_null());
        }
        if filter.in_stock.unwrap_or(false) {
            condition = condition.add(product::Column::Stock.gt(0));
        }

        let paginator = ProductEntity::find()
            .filter(condition)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut out = Vec::with_capacity(products.len());
        for model in products {
            let images = self.images_for(&model).await?;
            out.push(ProductWithImages {
                product: model,
                images,
            });
        }

        Ok((out, total))
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductWithImages, ServiceError> {
        let model = ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        let images = self.images_for(&model).await?;
        Ok(ProductWithImages {
            product: model,
            images,
        })
    }

    async fn images_for(
        &self,
        model: &product::Model,
    ) -> Result<Vec<product_image::Model>, ServiceError> {
        Ok(model
            .find_related(ProductImageEntity)
            .order_by_desc(product_image::Column::IsMain)
            .order_by_asc(product_image::Column::SortOrder)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductWithImages, ServiceError> {
        request.validate()?;

        if request.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be positive".to_string(),
            ));
        }
        if let Some(sale_price) = request.sale_price {
            if sale_price >= request.price {
                return Err(ServiceError::ValidationError(
                    "Sale price must be below the regular price".to_string(),
                ));
            }
        }

        let category = self.get_category_by_key(request.category.trim()).await?;

        let txn = self.db.begin().await?;

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            sale_price: Set(request.sale_price),
            discount_percent: Set(request.discount_percent),
            category: Set(category.key.clone()),
            category_id: Set(Some(category.id)),
            stock: Set(request.stock.unwrap_or(0)),
            product_type: Set(request.product_type),
            animal_type: Set(request.animal_type),
            size: Set(request.size),
            weight: Set(request.weight),
            dimensions: Set(request.dimensions),
            material: Set(request.material),
            brand: Set(request.brand),
            ..Default::default()
        };
        let created = model.insert(&txn).await?;

        let mut has_main = false;
        for (idx, image) in request.images.into_iter().enumerate() {
            let is_main = image.is_main && !has_main;
            has_main |= is_main;
            product_image::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                url: Set(image.url),
                alt: Set(image.alt),
                is_main: Set(is_main),
                sort_order: Set(idx as i32),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(product_id = %product_id, "Product created");
        self.get_product(product_id).await
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update_product(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductWithImages, ServiceError> {
        let existing = ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be positive".to_string(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(sale_price) = request.sale_price {
            active.sale_price = Set(sale_price);
        }
        if let Some(discount_percent) = request.discount_percent {
            active.discount_percent = Set(discount_percent);
        }
        if let Some(category_key) = request.category {
            let category = self.get_category_by_key(category_key.trim()).await?;
            active.category = Set(category.key);
            active.category_id = Set(Some(category.id));
        }
        if let Some(stock) = request.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock cannot be negative".to_string(),
                ));
            }
            active.stock = Set(stock);
        }
        if let Some(product_type) = request.product_type {
            active.product_type = Set(Some(product_type));
        }
        if let Some(animal_type) = request.animal_type {
            active.animal_type = Set(Some(animal_type));
        }
        if let Some(size) = request.size {
            active.size = Set(Some(size));
        }
        if let Some(weight) = request.weight {
            active.weight = Set(Some(weight));
        }
        if let Some(dimensions) = request.dimensions {
            active.dimensions = Set(Some(dimensions));
        }
        if let Some(material) = request.material {
            active.material = Set(Some(material));
        }
        if let Some(brand) = request.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active.update(&*self.db).await?;
        let images = self.images_for(&updated).await?;
        Ok(ProductWithImages {
            product: updated,
            images,
        })
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        existing.delete(&*self.db).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    // ---- product images ----

    #[instrument(skip(self, image), fields(product_id = %product_id))]
    pub async fn add_product_image(
        &self,
        product_id: Uuid,
        image: NewProductImage,
    ) -> Result<product_image::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if image.is_main {
            self.clear_main_flag(product_id).await?;
        }

        let count = ProductImageEntity::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;

        let model = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(image.url),
            alt: Set(image.alt),
            is_main: Set(image.is_main),
            sort_order: Set(count as i32),
            ..Default::default()
        };

        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self), fields(image_id = %image_id))]
    pub async fn set_main_image(&self, image_id: Uuid) -> Result<product_image::Model, ServiceError> {
        let image = ProductImageEntity::find_by_id(image_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Image {} not found", image_id)))?;

        self.clear_main_flag(image.product_id).await?;

        let mut active: product_image::ActiveModel = image.into();
        active.is_main = Set(true);
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(image_id = %image_id))]
    pub async fn delete_product_image(&self, image_id: Uuid) -> Result<(), ServiceError> {
        let image = ProductImageEntity::find_by_id(image_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Image {} not found", image_id)))?;
        image.delete(&*self.db).await?;
        Ok(())
    }

    async fn clear_main_flag(&self, product_id: Uuid) -> Result<(), ServiceError> {
        use sea_orm::sea_query::Expr;

        ProductImageEntity::update_many()
            .col_expr(product_image::Column::IsMain, Expr::value(false))
            .filter(product_image::Column::ProductId.eq(product_id))
            .filter(product_image::Column::IsMain.eq(true))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
