use common::ReviewAnswer;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SM-2 state of one card for one user. Unique per (user_id, theory_card_id).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_theory_progress")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub interval: i32, // in days
    pub repetitions: i32,
    pub ease_factor: f64,
    pub next_review_at: DateTimeUtc,
    pub last_answer: Option<ReviewAnswer>,
    pub review_count: i32,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub theory_card_id: i32,
    #[sea_orm(belongs_to, from = "theory_card_id", to = "id")]
    pub theory_card: HasOne<super::theory_card::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
