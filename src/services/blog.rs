use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        blog_category::{self, Entity as BlogCategoryEntity},
        blog_post::{self, Entity as BlogPostEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateBlogPostRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    /// Defaults to a slug derived from the title
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateBlogPostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateBlogCategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateBlogCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Turn a free-form title into a URL slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Service for blog posts and their categories.
#[derive(Clone)]
pub struct BlogService {
    db: Arc<DatabaseConnection>,
}

impl BlogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ---- posts ----

    /// Published posts for the storefront, newest first.
    pub async fn list_published(
        &self,
        category_slug: Option<&str>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<blog_post::Model>, u64), ServiceError> {
        let mut query = BlogPostEntity::find()
            .filter(blog_post::Column::IsPublished.eq(true))
            .order_by_desc(blog_post::Column::PublishedAt);

        if let Some(slug) = category_slug {
            let category = BlogCategoryEntity::find()
                .filter(blog_category::Column::Slug.eq(slug))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Blog category {} not found", slug))
                })?;
            query = query.filter(blog_post::Column::CategoryId.eq(category.id));
        }

        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((posts, total))
    }

    /// All posts for the back office, drafts included.
    pub async fn list_all(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<blog_post::Model>, u64), ServiceError> {
        let paginator = BlogPostEntity::find()
            .order_by_desc(blog_post::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((posts, total))
    }

    /// Fetch a published post by slug and bump its view counter.
    #[instrument(skip(self))]
    pub async fn get_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<blog_post::Model, ServiceError> {
        let post = BlogPostEntity::find()
            .filter(blog_post::Column::Slug.eq(slug))
            .filter(blog_post::Column::IsPublished.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Blog post {} not found", slug)))?;

        let view_count = post.view_count + 1;
        let mut active: blog_post::ActiveModel = post.into();
        active.view_count = Set(view_count);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<blog_post::Model, ServiceError> {
        BlogPostEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Blog post {} not found", id)))
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_post(
        &self,
        request: CreateBlogPostRequest,
    ) -> Result<blog_post::Model, ServiceError> {
        request.validate()?;

        let slug = request
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(&request.title));
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "Slug cannot be empty".to_string(),
            ));
        }

        let tags = if request.tags.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&request.tags).map_err(|e| {
                ServiceError::InternalError(format!("failed to encode tags: {}", e))
            })?)
        };

        let model = blog_post::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title),
            slug: Set(slug),
            excerpt: Set(request.excerpt),
            content: Set(request.content),
            cover_image_url: Set(request.cover_image_url),
            tags: Set(tags),
            category_id: Set(request.category_id),
            is_published: Set(request.is_published),
            published_at: Set(request.is_published.then(Utc::now)),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;
        info!(slug = %created.slug, "Blog post created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update_post(
        &self,
        id: Uuid,
        request: UpdateBlogPostRequest,
    ) -> Result<blog_post::Model, ServiceError> {
        let existing = self.get(id).await?;
        let was_published = existing.is_published;
        let mut active: blog_post::ActiveModel = existing.into();

        if let Some(title) = request.title {
            active.title = Set(title);
        }
        if let Some(slug) = request.slug {
            active.slug = Set(slug);
        }
        if let Some(excerpt) = request.excerpt {
            active.excerpt = Set(Some(excerpt));
        }
        if let Some(content) = request.content {
            active.content = Set(content);
        }
        if let Some(cover_image_url) = request.cover_image_url {
            active.cover_image_url = Set(Some(cover_image_url));
        }
        if let Some(tags) = request.tags {
            let encoded = if tags.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&tags).map_err(|e| {
                    ServiceError::InternalError(format!("failed to encode tags: {}", e))
                })?)
            };
            active.tags = Set(encoded);
        }
        if let Some(category_id) = request.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(is_published) = request.is_published {
            active.is_published = Set(is_published);
            if is_published && !was_published {
                active.published_at = Set(Some(Utc::now()));
            }
        }

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_post(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing.delete(&*self.db).await?;
        info!(id = %id, "Blog post deleted");
        Ok(())
    }

    // ---- categories ----

    pub async fn list_categories(&self) -> Result<Vec<blog_category::Model>, ServiceError> {
        Ok(BlogCategoryEntity::find()
            .filter(blog_category::Column::IsActive.eq(true))
            .order_by_asc(blog_category::Column::SortOrder)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        request: CreateBlogCategoryRequest,
    ) -> Result<blog_category::Model, ServiceError> {
        request.validate()?;

        let slug = request
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(&request.name));

        let model = blog_category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            slug: Set(slug),
            description: Set(request.description),
            sort_order: Set(request.sort_order.unwrap_or(0)),
            ..Default::default()
        };

        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self, request), fields(id = %id))]
    pub async fn update_category(
        &self,
        id: Uuid,
        request: UpdateBlogCategoryRequest,
    ) -> Result<blog_category::Model, ServiceError> {
        let existing = BlogCategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Blog category {} not found", id)))?;

        let mut active: blog_category::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(slug) = request.slug {
            active.slug = Set(slug);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(sort_order) = request.sort_order {
            active.sort_order = Set(sort_order);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = BlogCategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Blog category {} not found", id)))?;
        existing.delete(&*self.db).await?;
        Ok(())
    }
}
