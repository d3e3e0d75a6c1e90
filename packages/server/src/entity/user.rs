use common::UserRole;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,

    // Mutated only by the progress path.
    pub tasks_completed: i32,
    pub points_earned: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub attempts: HasMany<super::task_attempt::Entity>,

    #[sea_orm(has_many)]
    pub activities: HasMany<super::user_activity::Entity>,

    #[sea_orm(has_one)]
    pub streak: HasOne<super::user_streak::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
