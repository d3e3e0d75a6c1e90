use common::Difficulty;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::json::StringList;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "theory_card")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub question: String,
    #[sea_orm(column_type = "Text")]
    pub answer: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: StringList,
    pub is_active: bool,

    pub created_by_id: i32,
    #[sea_orm(belongs_to, from = "created_by_id", to = "id")]
    pub creator: HasOne<super::user::Entity>,

    #[sea_orm(has_many)]
    pub progress: HasMany<super::user_theory_progress::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
