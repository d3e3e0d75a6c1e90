use common::Difficulty;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::json::{CodeMap, StringList};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub content: String, // in Markdown
    pub category: String,
    pub difficulty: Difficulty,
    pub points: i32,
    pub time_limit: Option<i32>,   // in milliseconds
    pub memory_limit: Option<i32>, // in megabytes

    /// Empty means every registered language is accepted.
    #[sea_orm(column_type = "JsonBinary")]
    pub supported_languages: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub initial_code: CodeMap,

    pub is_public: bool,
    pub is_active: bool,

    pub created_by_id: i32,
    #[sea_orm(belongs_to, from = "created_by_id", to = "id")]
    pub creator: HasOne<super::user::Entity>,

    #[sea_orm(has_many)]
    pub test_cases: HasMany<super::test_case::Entity>,

    #[sea_orm(has_many)]
    pub attempts: HasMany<super::task_attempt::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Set on soft delete; such rows are invisible everywhere.
    pub deleted_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether submissions in `language` are admitted.
    pub fn accepts_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty() || self.supported_languages.contains(language)
    }

    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}
