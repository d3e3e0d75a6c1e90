use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::json::{CodeMap, StringList};
use crate::entity::{task, test_case};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, OptionalAuthUser};
use crate::extractors::input::AppJson;
use crate::models::shared::normalize_tags;
use crate::models::task::*;
use crate::state::AppState;
use crate::utils::guard::{
    can_view_task, can_view_test_case, find_owned_task, find_owned_task_for_update,
    find_owned_test_case, find_task,
};

#[utoipa::path(
    post,
    path = "/",
    tag = "Tasks",
    operation_id = "createTask",
    summary = "Create a task",
    description = "Creates a task owned by the caller. Every entry of `supported_languages` must be a registered language id; an empty list admits all of them.",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, UNSUPPORTED_LANGUAGE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title = %payload.title))]
pub async fn create_task(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_task(&payload)?;

    let now = chrono::Utc::now();
    let model = task::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        content: Set(payload.content),
        category: Set(payload.category.trim().to_string()),
        difficulty: Set(payload.difficulty),
        points: Set(payload.points),
        time_limit: Set(payload.time_limit),
        memory_limit: Set(payload.memory_limit),
        supported_languages: Set(StringList(payload.supported_languages)),
        tags: Set(StringList(normalize_tags(payload.tags))),
        initial_code: Set(CodeMap(payload.initial_code)),
        is_public: Set(payload.is_public),
        is_active: Set(payload.is_active),
        created_by_id: Set(auth_user.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(task_id = model.id, "Task created");
    Ok((StatusCode::CREATED, Json(TaskResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Tasks",
    operation_id = "getTask",
    summary = "Get a task by ID",
    description = "Public active tasks are visible to everyone. Private or inactive tasks are visible to their creator only and look absent to anyone else.",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task details", body = TaskResponse),
        (status = 401, description = "Invalid token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Task not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, caller), fields(id))]
pub async fn get_task(
    caller: OptionalAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = find_task(&state.db, id).await?;
    if !can_view_task(&task, caller.user_id()) {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(Json(task.into()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Tasks",
    operation_id = "updateTask",
    summary = "Update a task",
    description = "Only provided fields are modified; `null` clears a time or memory cap. Restricted to the task's creator.",
    params(("id" = i32, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, UNSUPPORTED_LANGUAGE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the creator (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Task not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_task(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    validate_update_task(&payload)?;

    if payload == UpdateTaskRequest::default() {
        let existing = find_owned_task(&state.db, id, auth_user.user_id).await?;
        return Ok(Json(existing.into()));
    }

    let txn = state.db.begin().await?;
    let existing = find_owned_task_for_update(&txn, id, auth_user.user_id).await?;
    let mut active: task::ActiveModel = existing.into();

    if let Some(ref title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(content) = payload.content {
        active.content = Set(content);
    }
    if let Some(ref category) = payload.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(difficulty) = payload.difficulty {
        active.difficulty = Set(difficulty);
    }
    if let Some(points) = payload.points {
        active.points = Set(points);
    }
    if let Some(tl) = payload.time_limit {
        active.time_limit = Set(tl);
    }
    if let Some(ml) = payload.memory_limit {
        active.memory_limit = Set(ml);
    }
    if let Some(languages) = payload.supported_languages {
        active.supported_languages = Set(StringList(languages));
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(StringList(normalize_tags(tags)));
    }
    if let Some(code) = payload.initial_code {
        active.initial_code = Set(CodeMap(code));
    }
    if let Some(is_public) = payload.is_public {
        active.is_public = Set(is_public);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Tasks",
    operation_id = "deleteTask",
    summary = "Delete a task",
    description = "Soft-deletes the task. Its attempts are kept; the task stops accepting submissions and disappears from reads. Restricted to the task's creator.",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the creator (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Task not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_task(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let existing = find_owned_task_for_update(&txn, id, auth_user.user_id).await?;

    let now = chrono::Utc::now();
    let mut active: task::ActiveModel = existing.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    info!("Task soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/test-cases",
    tag = "Test Cases",
    operation_id = "listTestCases",
    summary = "List a task's test cases",
    description = "Returns test cases in judging order. Hidden cases are included for the task's creator only.",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Test cases", body = Vec<TestCaseResponse>),
        (status = 401, description = "Invalid token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Task not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, caller), fields(id))]
pub async fn list_test_cases(
    caller: OptionalAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<TestCaseResponse>>, AppError> {
    let task = find_task(&state.db, id).await?;
    let caller_id = caller.user_id();
    if !can_view_task(&task, caller_id) {
        return Err(AppError::NotFound("Task not found".into()));
    }

    let cases = test_case::Entity::find()
        .filter(test_case::Column::TaskId.eq(task.id))
        .order_by_asc(test_case::Column::Position)
        .order_by_asc(test_case::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(
        cases
            .into_iter()
            .filter(|case| can_view_test_case(&task, case, caller_id))
            .map(TestCaseResponse::from)
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/test-cases",
    tag = "Test Cases",
    operation_id = "createTestCase",
    summary = "Add a test case to a task",
    description = "Creates a test case under `task_id`. Position is appended after the last case if omitted. Restricted to the task's creator.",
    request_body = CreateTestCaseRequest,
    responses(
        (status = 201, description = "Test case created", body = TestCaseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the creator (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Task not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(task_id = payload.task_id))]
pub async fn create_test_case(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTestCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_test_case(&payload)?;

    let txn = state.db.begin().await?;
    let task = find_owned_task_for_update(&txn, payload.task_id, auth_user.user_id).await?;

    let position = match payload.position {
        Some(p) => p,
        None => next_position(&txn, task.id).await?,
    };

    let now = chrono::Utc::now();
    let model = test_case::ActiveModel {
        task_id: Set(task.id),
        input: Set(payload.input),
        expected_output: Set(payload.expected_output),
        is_public: Set(payload.is_public),
        is_active: Set(payload.is_active),
        position: Set(position),
        time_limit: Set(payload.time_limit),
        memory_limit: Set(payload.memory_limit),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(TestCaseResponse::from(model))))
}

#[utoipa::path(
    put,
    path = "/test-cases/{id}",
    tag = "Test Cases",
    operation_id = "updateTestCase",
    summary = "Update a test case",
    description = "Only provided fields are modified; `null` clears a time or memory override. Restricted to the task's creator.",
    params(("id" = i32, Path, description = "Test case ID")),
    request_body = UpdateTestCaseRequest,
    responses(
        (status = 200, description = "Test case updated", body = TestCaseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the creator (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Test case or task not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_test_case(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateTestCaseRequest>,
) -> Result<Json<TestCaseResponse>, AppError> {
    validate_update_test_case(&payload)?;

    let (_, existing) = find_owned_test_case(&state.db, id, auth_user.user_id).await?;
    if payload == UpdateTestCaseRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: test_case::ActiveModel = existing.into();
    if let Some(input) = payload.input {
        active.input = Set(input);
    }
    if let Some(expected) = payload.expected_output {
        active.expected_output = Set(expected);
    }
    if let Some(is_public) = payload.is_public {
        active.is_public = Set(is_public);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(position) = payload.position {
        active.position = Set(position);
    }
    if let Some(tl) = payload.time_limit {
        active.time_limit = Set(tl);
    }
    if let Some(ml) = payload.memory_limit {
        active.memory_limit = Set(ml);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&state.db).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/test-cases/{id}",
    tag = "Test Cases",
    operation_id = "deleteTestCase",
    summary = "Delete a test case",
    description = "Permanently deletes the test case. Restricted to the task's creator.",
    params(("id" = i32, Path, description = "Test case ID")),
    responses(
        (status = 204, description = "Test case deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the creator (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Test case or task not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_test_case(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let (_, existing) = find_owned_test_case(&state.db, id, auth_user.user_id).await?;
    test_case::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn next_position<C: ConnectionTrait>(db: &C, task_id: i32) -> Result<i32, AppError> {
    let max_pos: Option<i32> = test_case::Entity::find()
        .filter(test_case::Column::TaskId.eq(task_id))
        .select_only()
        .column_as(test_case::Column::Position.max(), "max_pos")
        .into_tuple::<Option<i32>>()
        .one(db)
        .await?
        .flatten();
    max_pos
        .unwrap_or(-1)
        .checked_add(1)
        .ok_or_else(|| AppError::Validation("Position overflow".into()))
}
