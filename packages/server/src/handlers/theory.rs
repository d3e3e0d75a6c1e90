use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::json::StringList;
use crate::entity::theory_card;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::shared::normalize_tags;
use crate::models::theory::*;
use crate::state::AppState;
use crate::theory;

#[utoipa::path(
    post,
    path = "/",
    tag = "Theory",
    operation_id = "createTheoryCard",
    summary = "Create a theory card",
    request_body = CreateTheoryCardRequest,
    responses(
        (status = 201, description = "Card created", body = TheoryCardResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn create_card(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTheoryCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_card(&payload)?;

    let now = chrono::Utc::now();
    let model = theory_card::ActiveModel {
        question: Set(payload.question),
        answer: Set(payload.answer),
        category: Set(payload.category.trim().to_string()),
        difficulty: Set(payload.difficulty),
        tags: Set(StringList(normalize_tags(payload.tags))),
        is_active: Set(payload.is_active),
        created_by_id: Set(auth_user.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(TheoryCardResponse::from(model))))
}

#[utoipa::path(
    post,
    path = "/{id}/review",
    tag = "Theory",
    operation_id = "reviewTheoryCard",
    summary = "Grade recall of a card",
    description = "Applies the SM-2 update for the caller and schedules the next review. The first review of a card starts from interval 1, 0 repetitions and ease 2.5.",
    params(("id" = i32, Path, description = "Theory card ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Updated schedule", body = ProgressResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Card not found or inactive (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, user_id = auth_user.user_id))]
pub async fn review_card(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let progress = theory::review(&state.db, auth_user.user_id, id, payload.answer).await?;
    Ok(Json(progress.into()))
}

#[utoipa::path(
    get,
    path = "/review",
    tag = "Theory",
    operation_id = "listDueTheoryCards",
    summary = "Cards due for review",
    description = "Active cards the caller has reviewed before whose next review time has passed, soonest first.",
    params(DueQuery),
    responses(
        (status = 200, description = "Due cards", body = DueCardsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn due_cards(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DueQuery>,
) -> Result<Json<DueCardsResponse>, AppError> {
    let limit = theory::due_limit(query.limit);
    let rows = theory::due_cards(&state.db, auth_user.user_id, chrono::Utc::now(), limit).await?;
    Ok(Json(rows.into()))
}
