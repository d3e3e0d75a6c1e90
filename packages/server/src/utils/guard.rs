//! Ownership and visibility rules for tasks and their test cases.

use sea_orm::sea_query::LockType;
use sea_orm::*;

use crate::entity::{task, test_case};
use crate::error::AppError;

/// Mutations are reserved to the task's creator.
pub fn ensure_owner(task: &task::Model, caller_id: i32) -> Result<(), AppError> {
    if task.created_by_id == caller_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Non-public or inactive tasks are visible to their creator only.
pub fn can_view_task(task: &task::Model, caller_id: Option<i32>) -> bool {
    if task.deleted_at.is_some() {
        return false;
    }
    (task.is_public && task.is_active) || caller_id == Some(task.created_by_id)
}

/// Hidden test cases are visible to the task's creator only.
pub fn can_view_test_case(task: &task::Model, case: &test_case::Model, caller_id: Option<i32>) -> bool {
    case.is_public || caller_id == Some(task.created_by_id)
}

/// Load a task that has not been soft-deleted.
pub async fn find_task<C: ConnectionTrait>(db: &C, id: i32) -> Result<task::Model, AppError> {
    task::Entity::find_by_id(id)
        .filter(task::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Load a task the caller may mutate.
pub async fn find_owned_task<C: ConnectionTrait>(
    db: &C,
    id: i32,
    caller_id: i32,
) -> Result<task::Model, AppError> {
    let task = find_task(db, id).await?;
    ensure_owner(&task, caller_id)?;
    Ok(task)
}

/// Like [`find_owned_task`], holding a row lock for the rest of `txn`.
pub async fn find_owned_task_for_update(
    txn: &DatabaseTransaction,
    id: i32,
    caller_id: i32,
) -> Result<task::Model, AppError> {
    let task = task::Entity::find_by_id(id)
        .filter(task::Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    ensure_owner(&task, caller_id)?;
    Ok(task)
}

/// Load a test case together with its (live) task, enforcing ownership.
pub async fn find_owned_test_case<C: ConnectionTrait>(
    db: &C,
    id: i32,
    caller_id: i32,
) -> Result<(task::Model, test_case::Model), AppError> {
    let case = test_case::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Test case not found".into()))?;
    let task = find_owned_task(db, case.task_id, caller_id).await?;
    Ok((task, case))
}
