use axum::Json;
use axum::extract::State;
use common::ExecClass;
use executor::{ExecRequest, languages};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::AppJson;
use crate::judge::{self, Submission};
use crate::models::code::*;
use crate::progress::{self, AttemptInput};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/execute",
    tag = "Code",
    operation_id = "executeCode",
    summary = "Run a program once",
    description = "Compiles and runs the program in a sandbox with the given stdin. Nothing is persisted. Caps default to the language profile and are clamped to the server maximum.",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Program ran (check `status`)", body = ExecuteResponse),
        (status = 400, description = "Bad body or unknown language (VALIDATION_ERROR, UNSUPPORTED_LANGUAGE)", body = ErrorBody),
        (status = 500, description = "Sandbox unavailable (SANDBOX_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(language = %payload.language))]
pub async fn execute(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    validate_execute(&payload)?;

    let result = state
        .executor
        .execute(ExecRequest {
            code: &payload.code,
            language: &payload.language,
            stdin: payload.input.as_deref().unwrap_or_default(),
            wall_ms: payload.time_limit,
            memory_mb: payload.memory_limit,
        })
        .await?;

    if result.class == ExecClass::SandboxError {
        return Err(AppError::Sandbox(result.stderr));
    }

    Ok(Json(result.into()))
}

#[utoipa::path(
    post,
    path = "/validate",
    tag = "Code",
    operation_id = "validateSolution",
    summary = "Judge a solution against a task",
    description = "Runs the solution against every active test case of the task in order, stores the attempt and advances the caller's progress. Inputs and expected outputs of hidden cases are withheld unless the caller created the task.",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Submission judged", body = ValidateResponse),
        (status = 400, description = "Unknown task, bad body or unsupported language (VALIDATION_ERROR, UNSUPPORTED_LANGUAGE)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 500, description = "Sandbox unavailable (SANDBOX_ERROR)", body = ErrorBody),
        (status = 504, description = "Judging took too long (DEADLINE_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, task_id = payload.task_id))]
pub async fn validate(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    validate_submission(&payload)?;

    let judgement = judge::judge(
        &state.db,
        &state.executor,
        Submission {
            user_id: auth_user.user_id,
            task_id: payload.task_id,
            code: &payload.code,
            language: &payload.language,
        },
        state.config.judge.deadline(),
    )
    .await?;

    let recorded = progress::record(
        &state.db,
        &judgement.task,
        AttemptInput {
            user_id: auth_user.user_id,
            language: &payload.language,
            code: &payload.code,
        },
        &judgement.summary,
        state.config.judge.count_repeat_completions,
    )
    .await?;

    Ok(Json(ValidateResponse::new(
        judgement,
        recorded,
        auth_user.user_id,
    )))
}

#[utoipa::path(
    get,
    path = "/languages",
    tag = "Code",
    operation_id = "listLanguages",
    summary = "List supported languages",
    responses(
        (status = 200, description = "Registered language profiles", body = LanguagesResponse),
    ),
)]
pub async fn list_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: languages::all().to_vec(),
    })
}
