use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_streak")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<DateTimeUtc>,
    pub streak_start_date: Option<DateTimeUtc>,

    #[sea_orm(unique)]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
