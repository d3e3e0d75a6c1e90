use common::AttemptStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable record of one validation run.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task_attempt")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub language: String,
    #[sea_orm(column_type = "Text")]
    pub code: String,
    pub status: AttemptStatus,
    pub score: i32,
    pub tests_passed: i32,
    pub tests_failed: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub execution_time: i64, // summed wall milliseconds
    pub memory_used: Option<i64>, // summed kilobytes, when the sandbox reports it

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub task_id: i32,
    #[sea_orm(belongs_to, from = "task_id", to = "id")]
    pub task: HasOne<super::task::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
