use chrono::{DateTime, Utc};
use sea_orm::*;

use crate::entity::user_activity;

/// One activity log entry to append.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i32,
    pub activity_type: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i32>,
    pub description: String,
    pub points_earned: i32,
    pub metadata: serde_json::Value,
}

pub async fn append<C: ConnectionTrait>(
    db: &C,
    activity: NewActivity,
    now: DateTime<Utc>,
) -> Result<user_activity::Model, DbErr> {
    user_activity::ActiveModel {
        user_id: Set(activity.user_id),
        activity_type: Set(activity.activity_type.to_string()),
        entity_type: Set(activity.entity_type.to_string()),
        entity_id: Set(activity.entity_id),
        description: Set(activity.description),
        points_earned: Set(activity.points_earned),
        metadata: Set(activity.metadata),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}
