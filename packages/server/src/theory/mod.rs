//! Spaced-repetition review of theory cards.

pub mod scheduler;

use chrono::{DateTime, Utc};
use common::ReviewAnswer;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use serde_json::json;
use tracing::{info, instrument};

use crate::entity::{theory_card, user, user_theory_progress};
use crate::error::AppError;
use crate::progress::{self, activity::NewActivity};
pub use scheduler::ReviewState;

pub const DEFAULT_DUE_LIMIT: u64 = 10;
pub const MAX_DUE_LIMIT: u64 = 50;

impl From<&user_theory_progress::Model> for ReviewState {
    fn from(row: &user_theory_progress::Model) -> Self {
        Self {
            interval: row.interval,
            repetitions: row.repetitions,
            ease_factor: row.ease_factor,
        }
    }
}

/// Apply a review and persist the new schedule, then log the activity and
/// advance the streak on a best-effort basis.
#[instrument(skip(db))]
pub async fn review(
    db: &DatabaseConnection,
    user_id: i32,
    card_id: i32,
    answer: ReviewAnswer,
) -> Result<user_theory_progress::Model, AppError> {
    let card = theory_card::Entity::find_by_id(card_id)
        .filter(theory_card::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Theory card not found".into()))?;

    let now = Utc::now();
    let saved = save_review(db, user_id, card.id, answer, now).await?;
    info!(
        interval = saved.interval,
        repetitions = saved.repetitions,
        ease = saved.ease_factor,
        "Card reviewed"
    );

    progress::append_activity(
        db,
        NewActivity {
            user_id,
            activity_type: "theory_review",
            entity_type: "theory_card",
            entity_id: Some(card.id),
            description: format!("Reviewed card in {}", card.category),
            points_earned: 0,
            metadata: json!({ "answer": answer, "interval": saved.interval }),
        },
        now,
    )
    .await;
    progress::advance_streak(db, user_id, now).await;

    Ok(saved)
}

async fn save_review(
    db: &DatabaseConnection,
    user_id: i32,
    card_id: i32,
    answer: ReviewAnswer,
    now: DateTime<Utc>,
) -> Result<user_theory_progress::Model, DbErr> {
    let txn = db.begin().await?;

    // The progress row may not exist yet, so the user row serialises the
    // read-then-insert of concurrent first reviews.
    user::Entity::find_by_id(user_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

    let existing = user_theory_progress::Entity::find()
        .filter(user_theory_progress::Column::UserId.eq(user_id))
        .filter(user_theory_progress::Column::TheoryCardId.eq(card_id))
        .one(&txn)
        .await?;

    let previous = existing.as_ref().map(ReviewState::from).unwrap_or_default();
    let next = previous.apply(answer);

    let saved = match existing {
        Some(row) => {
            let review_count = row.review_count + 1;
            let mut active: user_theory_progress::ActiveModel = row.into();
            active.interval = Set(next.interval);
            active.repetitions = Set(next.repetitions);
            active.ease_factor = Set(next.ease_factor);
            active.next_review_at = Set(next.next_review_at(now));
            active.last_answer = Set(Some(answer));
            active.review_count = Set(review_count);
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
        None => {
            user_theory_progress::ActiveModel {
                user_id: Set(user_id),
                theory_card_id: Set(card_id),
                interval: Set(next.interval),
                repetitions: Set(next.repetitions),
                ease_factor: Set(next.ease_factor),
                next_review_at: Set(next.next_review_at(now)),
                last_answer: Set(Some(answer)),
                review_count: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;
    Ok(saved)
}

/// Clamp a caller-supplied page size into `1..=MAX_DUE_LIMIT`.
pub fn due_limit(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_DUE_LIMIT)
        .clamp(1, MAX_DUE_LIMIT)
}

/// Active cards whose review is due for the user, soonest first.
pub async fn due_cards<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    now: DateTime<Utc>,
    limit: u64,
) -> Result<Vec<(user_theory_progress::Model, theory_card::Model)>, DbErr> {
    let rows = user_theory_progress::Entity::find()
        .filter(user_theory_progress::Column::UserId.eq(user_id))
        .filter(user_theory_progress::Column::NextReviewAt.lte(now))
        .find_also_related(theory_card::Entity)
        .filter(theory_card::Column::IsActive.eq(true))
        .order_by_asc(user_theory_progress::Column::NextReviewAt)
        .order_by_asc(user_theory_progress::Column::Id)
        .limit(limit)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(progress, card)| card.map(|card| (progress, card)))
        .collect())
}
