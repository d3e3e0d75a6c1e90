//! Daily streak advancement.

use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::debug;

use crate::entity::{user, user_streak};

/// Streak counters as stored on `user_streak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub current: i32,
    pub longest: i32,
    pub last_activity: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Next streak state for an activity at `now`, counted in UTC calendar days.
///
/// Keeps `longest >= current >= 0` for any input.
pub fn advance(previous: Option<StreakState>, now: DateTime<Utc>) -> StreakState {
    let today = start_of_day(now);
    let fresh = |longest: i32| StreakState {
        current: 1,
        longest: Ord::max(longest, 1),
        last_activity: Some(now),
        started: Some(today),
    };

    let Some(prev) = previous else {
        return fresh(1);
    };
    let Some(last) = prev.last_activity else {
        return fresh(prev.longest);
    };

    let diff = (today.date_naive() - last.date_naive()).num_days();
    match diff {
        // Same day, or a clock that went backwards.
        d if d <= 0 => StreakState {
            last_activity: Some(Ord::max(now, last)),
            ..prev
        },
        1 => {
            let current = Ord::max(prev.current, 0) + 1;
            StreakState {
                current,
                longest: Ord::max(prev.longest, current),
                last_activity: Some(now),
                started: prev.started.or(Some(today)),
            }
        }
        _ => fresh(prev.longest),
    }
}

impl From<&user_streak::Model> for StreakState {
    fn from(row: &user_streak::Model) -> Self {
        Self {
            current: row.current_streak,
            longest: row.longest_streak,
            last_activity: row.last_activity_date,
            started: row.streak_start_date,
        }
    }
}

/// Advance and persist the user's streak, mirroring it onto the user row.
///
/// The user row is locked for the duration so concurrent activities of one
/// user apply in sequence.
pub async fn record_activity(
    db: &DatabaseConnection,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<StreakState, DbErr> {
    let txn = db.begin().await?;

    let owner = user::Entity::find_by_id(user_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

    let existing = user_streak::Entity::find()
        .filter(user_streak::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;
    let next = advance(existing.as_ref().map(StreakState::from), now);

    match existing {
        Some(row) => {
            let mut active: user_streak::ActiveModel = row.into();
            active.current_streak = Set(next.current);
            active.longest_streak = Set(next.longest);
            active.last_activity_date = Set(next.last_activity);
            active.streak_start_date = Set(next.started);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
        None => {
            user_streak::ActiveModel {
                user_id: Set(user_id),
                current_streak: Set(next.current),
                longest_streak: Set(next.longest),
                last_activity_date: Set(next.last_activity),
                streak_start_date: Set(next.started),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    let mut mirror: user::ActiveModel = owner.into();
    mirror.current_streak = Set(next.current);
    mirror.longest_streak = Set(next.longest);
    mirror.last_activity_date = Set(next.last_activity);
    mirror.updated_at = Set(now);
    mirror.update(&txn).await?;

    txn.commit().await?;
    debug!(user_id, current = next.current, longest = next.longest, "Streak advanced");
    Ok(next)
}
