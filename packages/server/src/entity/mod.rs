pub mod json;
pub mod task;
pub mod task_attempt;
pub mod test_case;
pub mod theory_card;
pub mod user;
pub mod user_activity;
pub mod user_category_progress;
pub mod user_streak;
pub mod user_theory_progress;
