use chrono::{DateTime, Utc};
use common::{Difficulty, ReviewAnswer};
use serde::{Deserialize, Serialize};

use crate::entity::{theory_card, user_theory_progress};
use crate::error::AppError;

use super::shared::{validate_tags, validate_text};

fn default_true() -> bool {
    true
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTheoryCardRequest {
    #[schema(example = "What does SM-2 stand for?")]
    pub question: String,
    #[schema(example = "SuperMemo 2")]
    pub answer: String,
    #[schema(example = "algorithms")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TheoryCardResponse {
    pub id: i32,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_by_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<theory_card::Model> for TheoryCardResponse {
    fn from(m: theory_card::Model) -> Self {
        Self {
            id: m.id,
            question: m.question,
            answer: m.answer,
            category: m.category,
            difficulty: m.difficulty,
            tags: m.tags.0,
            is_active: m.is_active,
            created_by_id: m.created_by_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReviewRequest {
    /// Self-graded recall quality.
    pub answer: ReviewAnswer,
}

/// Scheduling state of one card for the caller.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgressResponse {
    pub theory_card_id: i32,
    /// Days until the next review.
    #[schema(example = 6)]
    pub interval: i32,
    pub repetitions: i32,
    #[schema(example = 2.5)]
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
    pub last_answer: Option<ReviewAnswer>,
    pub review_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<user_theory_progress::Model> for ProgressResponse {
    fn from(m: user_theory_progress::Model) -> Self {
        Self {
            theory_card_id: m.theory_card_id,
            interval: m.interval,
            repetitions: m.repetitions,
            ease_factor: m.ease_factor,
            next_review_at: m.next_review_at,
            last_answer: m.last_answer,
            review_count: m.review_count,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct DueQuery {
    /// Page size, 1-50 (default 10).
    #[param(example = 10)]
    pub limit: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DueCardResponse {
    #[serde(flatten)]
    pub card: TheoryCardResponse,
    pub progress: ProgressResponse,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DueCardsResponse {
    pub data: Vec<DueCardResponse>,
}

impl From<Vec<(user_theory_progress::Model, theory_card::Model)>> for DueCardsResponse {
    fn from(rows: Vec<(user_theory_progress::Model, theory_card::Model)>) -> Self {
        Self {
            data: rows
                .into_iter()
                .map(|(progress, card)| DueCardResponse {
                    card: card.into(),
                    progress: progress.into(),
                })
                .collect(),
        }
    }
}

pub fn validate_create_card(req: &CreateTheoryCardRequest) -> Result<(), AppError> {
    validate_text(&req.question, "Question", true)?;
    validate_text(&req.answer, "Answer", true)?;
    let category = req.category.trim();
    if category.is_empty() || category.chars().count() > 64 {
        return Err(AppError::Validation("Category must be 1-64 characters".into()));
    }
    validate_tags(&req.tags)
}
