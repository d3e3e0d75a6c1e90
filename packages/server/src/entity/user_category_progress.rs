use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-category completion totals. Unique per (user_id, category).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_category_progress")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub category: String,
    pub completed_items: i32,
    pub total_points_earned: i32,
    pub last_accessed_at: DateTimeUtc,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
