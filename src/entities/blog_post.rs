use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, utoipa::ToSchema)]
#[sea_orm(table_name = "blog_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,

    #[sea_orm(unique)]
    pub slug: String,

    pub excerpt: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub cover_image_url: Option<String>,

    /// JSON-encoded array of tag strings
    pub tags: Option<String>,

    pub category_id: Option<Uuid>,

    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::blog_category::Entity",
        from = "Column::CategoryId",
        to = "super::blog_category::Column::Id"
    )]
    Category,
}

impl Related<super::blog_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Model {
    /// Decode the JSON-encoded tags column.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
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
            if let ActiveValue::NotSet = active_model.is_published {
                active_model.is_published = Set(false);
            }
            if let ActiveValue::NotSet = active_model.view_count {
                active_model.view_count = Set(0);
            }
            active_model.created_at = Set(now);
        }

        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_decodes_json_and_tolerates_garbage() {
        let mut model = Model {
            id: Uuid::new_v4(),
            title: "t".into(),
            slug: "t".into(),
            excerpt: None,
            content: "c".into(),
            cover_image_url: None,
            tags: Some(r#"["dogs","nutrition"]"#.into()),
            category_id: None,
            is_published: true,
            published_at: None,
            view_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(model.tag_list(), vec!["dogs", "nutrition"]);

        model.tags = Some("not-json".into());
        assert!(model.tag_list().is_empty());

        model.tags = None;
        assert!(model.tag_list().is_empty());
    }
}
