use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    services::line::LineProfile,
};

/// Service for LINE-backed user accounts.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create or refresh the account for a verified LINE profile.
    ///
    /// Runs on every sign-in, so it must be idempotent: an existing account
    /// gets its display name, picture and last-login refreshed; a new LINE
    /// user gets a fresh row.
    #[instrument(skip(self, profile), fields(line_user_id = %profile.user_id))]
    pub async fn upsert_from_line(
        &self,
        profile: &LineProfile,
    ) -> Result<user::Model, ServiceError> {
        let now = Utc::now();

        let existing = UserEntity::find()
            .filter(user::Column::LineUserId.eq(profile.user_id.clone()))
            .one(&*self.db)
            .await?;

        match existing {
            Some(found) => {
                let mut active: user::ActiveModel = found.into();
                active.display_name = Set(profile.display_name.clone());
                active.picture_url = Set(profile.picture_url.clone());
                active.last_login_at = Set(Some(now));
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let model = user::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    line_user_id: Set(profile.user_id.clone()),
                    display_name: Set(profile.display_name.clone()),
                    picture_url: Set(profile.picture_url.clone()),
                    email: Set(None),
                    last_login_at: Set(Some(now)),
                    ..Default::default()
                };
                let created = model.insert(&*self.db).await?;
                info!(user_id = %created.id, "User created on first LINE sign-in");
                Ok(created)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let paginator = UserEntity::find()
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    /// Grant or revoke back-office access.
    #[instrument(skip(self), fields(id = %id, is_admin = is_admin))]
    pub async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<user::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: user::ActiveModel = existing.into();
        active.is_admin = Set(is_admin);
        let updated = active.update(&*self.db).await?;
        info!(user_id = %id, is_admin = is_admin, "User role updated");
        Ok(updated)
    }
}
