use executor::{ExecResult, LanguageProfile};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::judge::{Judgement, TestCaseVerdict};
use crate::progress::Recorded;

/// Submitted source is capped at 64 KiB.
pub const MAX_CODE_BYTES: usize = 64 * 1024;
/// Custom stdin for ad-hoc runs is capped at 1 MiB.
pub const MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Request body for an ad-hoc run.
#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Program source.
    #[schema(example = "print(input())")]
    pub code: String,
    /// Language id from `GET /code/languages`.
    #[schema(example = "python")]
    pub language: String,
    /// Data fed to stdin.
    #[schema(example = "hello")]
    pub input: Option<String>,
    /// Wall-time cap in milliseconds. Clamped to the server maximum.
    #[schema(example = 2000)]
    pub time_limit: Option<u64>,
    /// Memory cap in megabytes. Clamped to the server maximum.
    #[schema(example = 256)]
    pub memory_limit: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    /// Captured stdout.
    pub output: String,
    /// Captured stderr, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time in milliseconds.
    #[schema(example = 42)]
    pub execution_time: u64,
    /// Peak memory in kilobytes, when the sandbox reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
    /// One of `success`, `timeout`, `memory`, `error`.
    #[schema(example = "success")]
    pub status: &'static str,
    pub exit_code: Option<i32>,
}

impl From<ExecResult> for ExecuteResponse {
    fn from(r: ExecResult) -> Self {
        Self {
            error: (!r.stderr.is_empty()).then_some(r.stderr),
            output: r.stdout,
            execution_time: r.wall_ms,
            memory_used: r.memory_kb,
            status: r.class.response_status(),
            exit_code: r.exit_code,
        }
    }
}

/// Request body for judging a submission against a task.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ValidateRequest {
    #[schema(example = 1)]
    pub task_id: i32,
    #[schema(example = "import sys\na, b = map(int, sys.stdin.read().split())\nprint(a + b)")]
    pub code: String,
    #[schema(example = "python")]
    pub language: String,
}

/// Outcome of one test case. `input` and `expectedOutput` are withheld for
/// hidden cases unless the caller created the task.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestResultDto {
    pub test_case_id: i32,
    pub is_public: bool,
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub actual_output: String,
    pub passed: bool,
    #[schema(example = "success")]
    pub status: &'static str,
    pub execution_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResultDto {
    fn from_verdict(v: TestCaseVerdict, reveal_hidden: bool) -> Self {
        let reveal = v.is_public || reveal_hidden;
        Self {
            test_case_id: v.test_case_id,
            is_public: v.is_public,
            input: reveal.then_some(v.input),
            expected_output: reveal.then_some(v.expected),
            actual_output: v.actual,
            passed: v.passed,
            status: v.class.response_status(),
            execution_time: v.wall_ms,
            memory_used: v.memory_kb,
            error: v.error,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub success: bool,
    /// Integer percentage of passed cases.
    #[schema(example = 100)]
    pub score: i32,
    pub tests_passed: i32,
    pub tests_failed: i32,
    pub total_tests: i32,
    pub test_results: Vec<TestResultDto>,
    /// Summed wall time in milliseconds.
    pub execution_time: u64,
    /// Summed peak memory in kilobytes, when the sandbox reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Id of the stored attempt.
    pub attempt_id: i32,
    /// Points credited by this submission (0 on repeats and failures).
    pub points_earned: i32,
}

impl ValidateResponse {
    pub fn new(judgement: Judgement, recorded: Recorded, caller_id: i32) -> Self {
        let reveal_hidden = judgement.task.created_by_id == caller_id;
        let summary = judgement.summary;
        Self {
            success: summary.success,
            score: summary.score,
            tests_passed: summary.passed,
            tests_failed: summary.failed,
            total_tests: summary.total,
            test_results: judgement
                .verdicts
                .into_iter()
                .map(|v| TestResultDto::from_verdict(v, reveal_hidden))
                .collect(),
            execution_time: summary.wall_ms,
            memory_used: summary.memory_kb,
            error_message: summary.error_message,
            attempt_id: recorded.attempt_id,
            points_earned: recorded.points_awarded,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageProfile>,
}

fn validate_code(code: &str) -> Result<(), AppError> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("Code must not be empty".into()));
    }
    if code.len() > MAX_CODE_BYTES {
        return Err(AppError::Validation("Code must be at most 64KB".into()));
    }
    Ok(())
}

fn validate_language_field(language: &str) -> Result<(), AppError> {
    if language.trim().is_empty() {
        return Err(AppError::Validation("Language must not be empty".into()));
    }
    Ok(())
}

pub fn validate_execute(req: &ExecuteRequest) -> Result<(), AppError> {
    validate_code(&req.code)?;
    validate_language_field(&req.language)?;
    if req.input.as_ref().is_some_and(|i| i.len() > MAX_INPUT_BYTES) {
        return Err(AppError::Validation("Input must be at most 1MB".into()));
    }
    if req.time_limit == Some(0) || req.memory_limit == Some(0) {
        return Err(AppError::Validation("Limits must be positive".into()));
    }
    Ok(())
}

pub fn validate_submission(req: &ValidateRequest) -> Result<(), AppError> {
    validate_code(&req.code)?;
    validate_language_field(&req.language)
}
