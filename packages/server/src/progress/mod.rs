//! Attempt persistence and the progress side effects that follow it.
//!
//! The attempt insert and the counter updates share one transaction; the
//! counters run inside a savepoint so their failure never takes the attempt
//! down with it. Activity and streak updates run after commit and are
//! best-effort.

pub mod activity;
pub mod streak;

use chrono::{DateTime, Utc};
use common::AttemptStatus;
use common::retry::{RetryPolicy, retry_with_backoff};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::entity::{task, task_attempt, user, user_category_progress};
use crate::judge::Summary;
use activity::NewActivity;

#[derive(Debug, Clone, Copy)]
pub struct AttemptInput<'a> {
    pub user_id: i32,
    pub language: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub attempt_id: i32,
    pub status: AttemptStatus,
    /// Points credited to the user by this attempt.
    pub points_awarded: i32,
}

/// Persist an attempt and advance the user's progress.
///
/// Only a failure to store the attempt itself is returned as an error.
#[instrument(skip(db, task, input, summary), fields(user_id = input.user_id, task_id = task.id))]
pub async fn record(
    db: &DatabaseConnection,
    task: &task::Model,
    input: AttemptInput<'_>,
    summary: &Summary,
    count_repeat_completions: bool,
) -> Result<Recorded, DbErr> {
    let now = Utc::now();
    let status = AttemptStatus::from_success(summary.success);

    let txn = db.begin().await?;

    // Serialises this user's progress writes.
    user::Entity::find_by_id(input.user_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {}", input.user_id)))?;

    let first_completion = task_attempt::Entity::find()
        .filter(task_attempt::Column::UserId.eq(input.user_id))
        .filter(task_attempt::Column::TaskId.eq(task.id))
        .filter(task_attempt::Column::Status.eq(AttemptStatus::Completed))
        .count(&txn)
        .await?
        == 0;

    let attempt = task_attempt::ActiveModel {
        user_id: Set(input.user_id),
        task_id: Set(task.id),
        language: Set(input.language.to_string()),
        code: Set(input.code.to_string()),
        status: Set(status),
        score: Set(summary.score),
        tests_passed: Set(summary.passed),
        tests_failed: Set(summary.failed),
        error_message: Set(summary.error_message.clone()),
        execution_time: Set(summary.wall_ms as i64),
        memory_used: Set(summary.memory_kb.map(|kb| kb as i64)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let counts = summary.success && (first_completion || count_repeat_completions);
    let mut points_awarded = 0;
    if counts {
        match credit_completion(&txn, input.user_id, task, now).await {
            Ok(()) => points_awarded = task.points,
            Err(e) => warn!(
                attempt_id = attempt.id,
                error = %e,
                "Progress update failed; attempt kept"
            ),
        }
    }

    txn.commit().await?;
    info!(attempt_id = attempt.id, status = %status, points_awarded, "Attempt recorded");

    let description = if summary.success {
        format!("Solved task \"{}\"", task.title)
    } else {
        format!("Attempted task \"{}\"", task.title)
    };
    append_activity(
        db,
        NewActivity {
            user_id: input.user_id,
            activity_type: "task_attempt",
            entity_type: "task",
            entity_id: Some(task.id),
            description,
            points_earned: points_awarded,
            metadata: json!({
                "attempt_id": attempt.id,
                "status": status,
                "score": summary.score,
                "language": input.language,
            }),
        },
        now,
    )
    .await;
    advance_streak(db, input.user_id, now).await;

    Ok(Recorded {
        attempt_id: attempt.id,
        status,
        points_awarded,
    })
}

/// Counter and category updates inside a savepoint of `txn`. On failure the
/// savepoint is rolled back and `txn` stays usable.
async fn credit_completion(
    txn: &DatabaseTransaction,
    user_id: i32,
    task: &task::Model,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let savepoint = txn.begin().await?;
    match apply_credit(&savepoint, user_id, task, now).await {
        Ok(()) => savepoint.commit().await,
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}

async fn apply_credit(
    savepoint: &DatabaseTransaction,
    user_id: i32,
    task: &task::Model,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    user::Entity::update_many()
        .col_expr(
            user::Column::TasksCompleted,
            Expr::col(user::Column::TasksCompleted).add(1),
        )
        .col_expr(
            user::Column::PointsEarned,
            Expr::col(user::Column::PointsEarned).add(task.points),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(now))
        .filter(user::Column::Id.eq(user_id))
        .exec(savepoint)
        .await?;

    let existing = user_category_progress::Entity::find()
        .filter(user_category_progress::Column::UserId.eq(user_id))
        .filter(user_category_progress::Column::Category.eq(task.category.as_str()))
        .one(savepoint)
        .await?;
    match existing {
        Some(row) => {
            let completed = row.completed_items + 1;
            let points = row.total_points_earned + task.points;
            let mut active: user_category_progress::ActiveModel = row.into();
            active.completed_items = Set(completed);
            active.total_points_earned = Set(points);
            active.last_accessed_at = Set(now);
            active.updated_at = Set(now);
            active.update(savepoint).await?;
        }
        None => {
            user_category_progress::ActiveModel {
                user_id: Set(user_id),
                category: Set(task.category.clone()),
                completed_items: Set(1),
                total_points_earned: Set(task.points),
                last_accessed_at: Set(now),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(savepoint)
            .await?;
        }
    }

    Ok(())
}

/// Best-effort activity append; failures are logged only.
pub async fn append_activity(db: &DatabaseConnection, entry: NewActivity, now: DateTime<Utc>) {
    let user_id = entry.user_id;
    if let Err(e) = activity::append(db, entry, now).await {
        warn!(user_id, error = %e, "Failed to append user activity");
    }
}

/// Best-effort streak advancement with retry; failures are logged only.
pub async fn advance_streak(db: &DatabaseConnection, user_id: i32, now: DateTime<Utc>) {
    let result = retry_with_backoff(RetryPolicy::default(), "streak", || {
        streak::record_activity(db, user_id, now)
    })
    .await;
    if let Err(e) = result {
        warn!(user_id, error = %e, "Failed to advance streak");
    }
}
