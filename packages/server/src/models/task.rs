use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::Difficulty;
use serde::{Deserialize, Serialize};

use crate::entity::{task, test_case};
use crate::error::AppError;

use super::shared::{
    double_option, validate_initial_code, validate_languages, validate_limits,
    validate_optional_position, validate_tags, validate_text, validate_title,
};

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "general".into()
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    #[schema(example = "A + B")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Statement in Markdown.
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_category")]
    #[schema(example = "algorithms")]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    #[schema(example = 10)]
    pub points: i32,
    /// Default wall-time cap in milliseconds.
    #[schema(example = 1000)]
    pub time_limit: Option<i32>,
    /// Default memory cap in megabytes.
    #[schema(example = 256)]
    pub memory_limit: Option<i32>,
    /// Empty admits every registered language.
    #[serde(default)]
    #[schema(example = json!(["python"]))]
    pub supported_languages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Starter code keyed by language id.
    #[serde(default)]
    pub initial_code: BTreeMap<String, String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub points: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub time_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub memory_limit: Option<Option<i32>>,
    pub supported_languages: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub initial_code: Option<BTreeMap<String, String>>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub points: i32,
    pub time_limit: Option<i32>,
    pub memory_limit: Option<i32>,
    pub supported_languages: Vec<String>,
    pub tags: Vec<String>,
    pub initial_code: BTreeMap<String, String>,
    pub is_public: bool,
    pub is_active: bool,
    pub created_by_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<task::Model> for TaskResponse {
    fn from(m: task::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            content: m.content,
            category: m.category,
            difficulty: m.difficulty,
            points: m.points,
            time_limit: m.time_limit,
            memory_limit: m.memory_limit,
            supported_languages: m.supported_languages.0,
            tags: m.tags.0,
            initial_code: m.initial_code.0,
            is_public: m.is_public,
            is_active: m.is_active,
            created_by_id: m.created_by_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTestCaseRequest {
    #[schema(example = 1)]
    pub task_id: i32,
    /// May be empty.
    #[serde(default)]
    #[schema(example = "2 3\n")]
    pub input: String,
    #[schema(example = "5")]
    pub expected_output: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Judging order; appended after the last case when omitted.
    pub position: Option<i32>,
    /// Overrides the task's time cap (milliseconds).
    pub time_limit: Option<i32>,
    /// Overrides the task's memory cap (megabytes).
    pub memory_limit: Option<i32>,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTestCaseRequest {
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
    pub position: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub time_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub memory_limit: Option<Option<i32>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TestCaseResponse {
    pub id: i32,
    pub task_id: i32,
    pub input: String,
    pub expected_output: String,
    pub is_public: bool,
    pub is_active: bool,
    pub position: i32,
    pub time_limit: Option<i32>,
    pub memory_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<test_case::Model> for TestCaseResponse {
    fn from(m: test_case::Model) -> Self {
        Self {
            id: m.id,
            task_id: m.task_id,
            input: m.input,
            expected_output: m.expected_output,
            is_public: m.is_public,
            is_active: m.is_active,
            position: m.position,
            time_limit: m.time_limit,
            memory_limit: m.memory_limit,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn validate_category(category: &str) -> Result<(), AppError> {
    let category = category.trim();
    if category.is_empty() || category.chars().count() > 64 {
        return Err(AppError::Validation("Category must be 1-64 characters".into()));
    }
    Ok(())
}

fn validate_points(points: i32) -> Result<(), AppError> {
    if points < 0 {
        return Err(AppError::Validation("Points must be >= 0".into()));
    }
    Ok(())
}

pub fn validate_create_task(req: &CreateTaskRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    validate_text(&req.description, "Description", false)?;
    validate_text(&req.content, "Content", false)?;
    validate_category(&req.category)?;
    validate_points(req.points)?;
    validate_limits(req.time_limit, req.memory_limit)?;
    validate_languages(&req.supported_languages)?;
    validate_tags(&req.tags)?;
    validate_initial_code(&req.initial_code)
}

pub fn validate_update_task(req: &UpdateTaskRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(ref description) = req.description {
        validate_text(description, "Description", false)?;
    }
    if let Some(ref content) = req.content {
        validate_text(content, "Content", false)?;
    }
    if let Some(ref category) = req.category {
        validate_category(category)?;
    }
    if let Some(points) = req.points {
        validate_points(points)?;
    }
    validate_limits(req.time_limit.flatten(), req.memory_limit.flatten())?;
    if let Some(ref languages) = req.supported_languages {
        validate_languages(languages)?;
    }
    if let Some(ref tags) = req.tags {
        validate_tags(tags)?;
    }
    if let Some(ref code) = req.initial_code {
        validate_initial_code(code)?;
    }
    Ok(())
}

pub fn validate_create_test_case(req: &CreateTestCaseRequest) -> Result<(), AppError> {
    validate_text(&req.input, "Input", false)?;
    validate_text(&req.expected_output, "Expected output", true)?;
    validate_optional_position(req.position)?;
    validate_limits(req.time_limit, req.memory_limit)
}

pub fn validate_update_test_case(req: &UpdateTestCaseRequest) -> Result<(), AppError> {
    if let Some(ref input) = req.input {
        validate_text(input, "Input", false)?;
    }
    if let Some(ref expected) = req.expected_output {
        validate_text(expected, "Expected output", true)?;
    }
    validate_optional_position(req.position)?;
    validate_limits(req.time_limit.flatten(), req.memory_limit.flatten())
}
