//! Runs a submission against a task's active test cases and folds the
//! per-case outcomes into one verdict.

use std::time::Duration;

use common::ExecClass;
use executor::{ExecRequest, ExecResult, Executor, languages};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{task, test_case};
use crate::error::AppError;

/// Upper bound on the detail copied from stderr into a verdict message.
const ERROR_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub user_id: i32,
    pub task_id: i32,
    pub code: &'a str,
    pub language: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseVerdict {
    pub test_case_id: i32,
    pub is_public: bool,
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    pub class: ExecClass,
    pub wall_ms: u64,
    pub memory_kb: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: i32,
    pub passed: i32,
    pub failed: i32,
    pub success: bool,
    pub score: i32,
    pub wall_ms: u64,
    /// `None` unless at least one case reported memory.
    pub memory_kb: Option<u64>,
    /// First non-empty per-case error, only when the submission failed.
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Judgement {
    pub task: task::Model,
    pub verdicts: Vec<TestCaseVerdict>,
    pub summary: Summary,
}

/// Trim surrounding whitespace on both sides, then compare exactly.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    expected.trim() == actual.trim()
}

pub fn aggregate(verdicts: &[TestCaseVerdict]) -> Summary {
    let total = verdicts.len() as i32;
    let passed = verdicts.iter().filter(|v| v.passed).count() as i32;
    let failed = total - passed;
    let success = failed == 0 && passed > 0;
    let score = if total > 0 { passed * 100 / total } else { 0 };

    let wall_ms = verdicts.iter().map(|v| v.wall_ms).sum();
    let memory_kb = verdicts
        .iter()
        .filter_map(|v| v.memory_kb)
        .reduce(|a, b| a + b);

    let error_message = if success {
        None
    } else {
        verdicts
            .iter()
            .filter_map(|v| v.error.as_deref())
            .find(|e| !e.is_empty())
            .map(str::to_owned)
    };

    Summary {
        total,
        passed,
        failed,
        success,
        score,
        wall_ms,
        memory_kb,
        error_message,
    }
}

/// Short, class-tagged message for a failed execution.
fn failure_message(result: &ExecResult) -> Option<String> {
    let tag = result.class.failure_message()?;
    let detail = match result.class {
        ExecClass::TimeLimit => Some(format!("limit {} ms", result.wall_limit_ms)),
        ExecClass::CompileError | ExecClass::RuntimeError => result
            .stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.chars().take(ERROR_DETAIL_CHARS).collect()),
        _ => None,
    };
    Some(match detail {
        Some(detail) => format!("{tag}: {detail}"),
        None => tag.to_string(),
    })
}

fn verdict_for(case: &test_case::Model, result: ExecResult) -> TestCaseVerdict {
    let passed = result.class.is_ok() && outputs_match(&case.expected_output, &result.stdout);
    let error = failure_message(&result);
    TestCaseVerdict {
        test_case_id: case.id,
        is_public: case.is_public,
        input: case.input.clone(),
        expected: case.expected_output.clone(),
        actual: result.stdout,
        passed,
        class: result.class,
        wall_ms: result.wall_ms,
        memory_kb: result.memory_kb,
        error,
    }
}

/// Load a live task and check the language against the registry and the
/// task's supported set. Nothing is executed or persisted on rejection.
pub async fn load_task<C: ConnectionTrait>(
    db: &C,
    task_id: i32,
    language: &str,
) -> Result<(task::Model, Vec<test_case::Model>), AppError> {
    let task = task::Entity::find_by_id(task_id)
        .one(db)
        .await?
        .filter(task::Model::is_live)
        .ok_or_else(|| AppError::Validation(format!("Task {task_id} not found")))?;

    if !languages::is_registered(language) || !task.accepts_language(language) {
        return Err(AppError::UnsupportedLanguage(language.to_string()));
    }

    let cases = test_case::Entity::find()
        .filter(test_case::Column::TaskId.eq(task.id))
        .filter(test_case::Column::IsActive.eq(true))
        .order_by_asc(test_case::Column::Position)
        .order_by_asc(test_case::Column::Id)
        .all(db)
        .await?;

    Ok((task, cases))
}

/// Run every case in declared order, one at a time. A sandbox failure
/// aborts the run so that no verdict is derived from it.
pub async fn run_cases(
    executor: &Executor,
    task: &task::Model,
    cases: &[test_case::Model],
    code: &str,
    language: &str,
) -> Result<Vec<TestCaseVerdict>, AppError> {
    let mut verdicts = Vec::with_capacity(cases.len());
    for case in cases {
        let wall_ms = case.time_limit.or(task.time_limit).map(|v| Ord::max(v, 1) as u64);
        let memory_mb = case.memory_limit.or(task.memory_limit).map(|v| Ord::max(v, 1) as u64);

        let result = executor
            .execute(ExecRequest {
                code,
                language,
                stdin: &case.input,
                wall_ms,
                memory_mb,
            })
            .await?;
        if result.class == ExecClass::SandboxError {
            return Err(AppError::Sandbox(format!(
                "test case {}: {}",
                case.id,
                result.stderr.trim()
            )));
        }
        verdicts.push(verdict_for(case, result));
    }
    Ok(verdicts)
}

/// Load, run and aggregate. `deadline` bounds the execution phase; when it
/// fires the in-flight sandbox is dropped (and so killed) and nothing is returned.
#[instrument(skip(db, executor, submission), fields(user_id = submission.user_id, task_id = submission.task_id, language = submission.language))]
pub async fn judge(
    db: &DatabaseConnection,
    executor: &Executor,
    submission: Submission<'_>,
    deadline: Option<Duration>,
) -> Result<Judgement, AppError> {
    let (task, cases) = load_task(db, submission.task_id, submission.language).await?;

    let run = run_cases(executor, &task, &cases, submission.code, submission.language);
    let verdicts = match deadline {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| AppError::DeadlineExceeded)??,
        None => run.await?,
    };

    let summary = aggregate(&verdicts);
    info!(
        total = summary.total,
        passed = summary.passed,
        score = summary.score,
        "Submission judged"
    );
    Ok(Judgement {
        task,
        verdicts,
        summary,
    })
}
