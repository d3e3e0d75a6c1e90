use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only activity log entry.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_activity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub activity_type: String,
    pub entity_type: String,
    pub entity_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub points_earned: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
