use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::{task_attempt, test_case, user_category_progress, user_theory_progress};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't cover composite indexes, so they are
/// created on startup. The unique ones back the per-user upserts.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // One SM-2 row per (user, card).
    create(
        db,
        "idx_theory_progress_user_card",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_theory_progress_user_card")
            .table(user_theory_progress::Entity)
            .col(user_theory_progress::Column::UserId)
            .col(user_theory_progress::Column::TheoryCardId)
            .to_owned(),
        true,
    )
    .await?;

    create(
        db,
        "idx_category_progress_user_category",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_category_progress_user_category")
            .table(user_category_progress::Entity)
            .col(user_category_progress::Column::UserId)
            .col(user_category_progress::Column::Category)
            .to_owned(),
        true,
    )
    .await?;

    // First-completion lookup:
    // SELECT COUNT(*) FROM task_attempt WHERE user_id = ? AND task_id = ? AND status = 'completed'
    create(
        db,
        "idx_attempt_user_task_status",
        Index::create()
            .if_not_exists()
            .name("idx_attempt_user_task_status")
            .table(task_attempt::Entity)
            .col(task_attempt::Column::UserId)
            .col(task_attempt::Column::TaskId)
            .col(task_attempt::Column::Status)
            .to_owned(),
        false,
    )
    .await?;

    create(
        db,
        "idx_test_case_task_position",
        Index::create()
            .if_not_exists()
            .name("idx_test_case_task_position")
            .table(test_case::Entity)
            .col(test_case::Column::TaskId)
            .col(test_case::Column::Position)
            .to_owned(),
        false,
    )
    .await?;

    Ok(())
}

/// Failures on unique indexes are fatal; plain indexes are only a speed-up.
async fn create(
    db: &DatabaseConnection,
    name: &str,
    stmt: IndexCreateStatement,
    required: bool,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    match db.execute_raw(backend.build(&stmt)).await {
        Ok(_) => {
            info!("Ensured index {} exists", name);
            Ok(())
        }
        Err(e) if required => Err(e),
        Err(e) => {
            warn!("Failed to create index {}: {}", name, e);
            Ok(())
        }
    }
}
