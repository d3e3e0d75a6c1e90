use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use common::AttemptStatus;
use server::config::JudgeConfig;
use server::entity::{task_attempt, user_activity, user_category_progress};

use crate::common::{TestApp, routes};

const SUM: &str = "import sys; a,b=map(int,sys.stdin.read().split()); print(a+b)";

async fn attempts_for(app: &TestApp, user_id: i32) -> Vec<task_attempt::Model> {
    task_attempt::Entity::find()
        .filter(task_attempt::Column::UserId.eq(user_id))
        .all(&app.db)
        .await
        .expect("DB query failed")
}

/// Task with the single case `2 3 -> 5`.
async fn sum_task(app: &TestApp, token: &str) -> i32 {
    let task_id = app.create_task(token, json!({})).await;
    app.create_test_case(token, task_id, "2 3\n", "5", true).await;
    task_id
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn correct_solution_completes_and_credits_the_user() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["score"], 100);
        assert_eq!(res.body["testsPassed"], 1);
        assert_eq!(res.body["testsFailed"], 0);
        assert_eq!(res.body["totalTests"], 1);
        assert_eq!(res.body["pointsEarned"], 10);
        assert_eq!(res.body["testResults"][0]["status"], "success");
        assert_eq!(res.body["testResults"][0]["actualOutput"], "5\n");
        assert!(res.body.get("errorMessage").is_none());
        assert!(res.body.get("memoryUsed").is_none());

        let attempts = attempts_for(&app, uid).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Completed);
        assert_eq!(attempts[0].id, res.body["attemptId"].as_i64().unwrap() as i32);
        assert_eq!(attempts[0].memory_used, None);

        let user = app.user(uid).await;
        assert_eq!(user.tasks_completed, 1);
        assert_eq!(user.points_earned, 10);
        assert_eq!(user.current_streak, 1);
        assert_eq!(user.longest_streak, 1);
        assert!(user.last_activity_date.is_some());

        let category = user_category_progress::Entity::find()
            .filter(user_category_progress::Column::UserId.eq(uid))
            .one(&app.db)
            .await
            .unwrap()
            .expect("category progress row");
        assert_eq!(category.category, "math");
        assert_eq!(category.completed_items, 1);
        assert_eq!(category.total_points_earned, 10);

        let activities = user_activity::Entity::find()
            .filter(user_activity::Column::UserId.eq(uid))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(activities, 1);
    }

    #[tokio::test]
    async fn wrong_answer_is_rejected_without_credit() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, "print(6)", "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["score"], 0);
        assert_eq!(res.body["testsPassed"], 0);
        assert_eq!(res.body["testsFailed"], 1);
        assert_eq!(res.body["pointsEarned"], 0);
        assert_eq!(res.body["testResults"][0]["passed"], false);

        let attempts = attempts_for(&app, uid).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Rejected);
        assert_eq!(attempts[0].tests_failed, 1);

        let user = app.user(uid).await;
        assert_eq!(user.tasks_completed, 0);
        assert_eq!(user.points_earned, 0);
        // Any recorded attempt counts as activity for the day.
        assert_eq!(user.current_streak, 1);
        assert!(user.last_activity_date.is_some());
    }

    #[tokio::test]
    async fn endless_loop_is_reported_as_timeout() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = app.create_task(&author, json!({"time_limit": 1000})).await;
        app.create_test_case(&author, task_id, "", "done", true).await;

        let res = app.submit(&token, task_id, "while True: pass", "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], false);
        let result = &res.body["testResults"][0];
        assert_eq!(result["status"], "timeout");
        assert_eq!(result["passed"], false);
        assert_eq!(result["executionTime"], 1000);
        let message = res.body["errorMessage"].as_str().unwrap();
        assert_eq!(message, "time limit exceeded: limit 1000 ms");

        let attempts = attempts_for(&app, uid).await;
        assert_eq!(attempts[0].error_message.as_deref(), Some(message));
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected_before_anything_is_stored() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, "int main() {}", "cpp").await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "UNSUPPORTED_LANGUAGE");

        let res = app.submit(&token, task_id, "10 PRINT", "basic").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "UNSUPPORTED_LANGUAGE");

        assert!(attempts_for(&app, uid).await.is_empty());
    }

    #[tokio::test]
    async fn empty_language_set_accepts_any_registered_language() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (_, token) = app.create_user("alice").await;
        let task_id = app
            .create_task(&author, json!({"supported_languages": []}))
            .await;
        app.create_test_case(&author, task_id, "hi", "hi", true).await;

        let res = app.submit(&token, task_id, "cat", "cpp").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], true);
    }

    #[tokio::test]
    async fn missing_or_deleted_task_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;

        let res = app.submit(&token, 9999, SUM, "python").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let task_id = sum_task(&app, &author).await;
        let del = app.delete_with_token(&routes::task(task_id), &author).await;
        assert_eq!(del.status, 204);
        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 400);

        assert!(attempts_for(&app, uid).await.is_empty());
    }

    #[tokio::test]
    async fn inactive_cases_are_skipped_and_score_rounds_down() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (_, token) = app.create_user("alice").await;
        let task_id = app.create_task(&author, json!({})).await;
        app.create_test_case(&author, task_id, "1 1", "2", true).await;
        app.create_test_case(&author, task_id, "2 2", "4", true).await;
        app.create_test_case(&author, task_id, "3 3", "7", true).await;
        let off = app.create_test_case(&author, task_id, "0 0", "1", true).await;
        let res = app
            .put_with_token(&routes::test_case(off), &json!({"is_active": false}), &author)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["totalTests"], 3);
        assert_eq!(res.body["testsPassed"], 2);
        assert_eq!(res.body["score"], 66);
        assert_eq!(res.body["success"], false);
    }

    #[tokio::test]
    async fn task_without_active_cases_never_completes() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = app.create_task(&author, json!({})).await;

        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["totalTests"], 0);
        assert_eq!(app.user(uid).await.tasks_completed, 0);
    }

    #[tokio::test]
    async fn runtime_error_message_comes_from_stderr() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (_, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, "raise ValueError()", "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["testResults"][0]["status"], "error");
        let message = res.body["errorMessage"].as_str().unwrap();
        assert!(message.starts_with("runtime error"), "{message}");
    }

    #[tokio::test]
    async fn validation_requires_authentication() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::VALIDATE,
                &json!({"task_id": 1, "code": SUM, "language": "python"}),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app
            .post_with_token(
                routes::VALIDATE,
                &json!({"task_id": 1, "code": SUM, "language": "python"}),
                "not-a-jwt",
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn sandbox_failure_is_a_server_error_and_stores_nothing() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, "# SANDBOX_DOWN", "python").await;
        assert_eq!(res.status, 500, "{}", res.text);
        assert_eq!(res.body["code"], "SANDBOX_ERROR");
        assert!(attempts_for(&app, uid).await.is_empty());
    }

    #[tokio::test]
    async fn submission_deadline_aborts_without_storing() {
        let app = TestApp::spawn_with(JudgeConfig {
            submission_deadline_ms: 300,
            ..JudgeConfig::default()
        })
        .await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let res = app.submit(&token, task_id, "# SLEEP", "python").await;
        assert_eq!(res.status, 504, "{}", res.text);
        assert_eq!(res.body["code"], "DEADLINE_EXCEEDED");
        assert!(attempts_for(&app, uid).await.is_empty());
    }
}

mod counting {
    use super::*;

    #[tokio::test]
    async fn repeat_success_is_stored_but_not_counted_again() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        let first = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(first.body["pointsEarned"], 10);
        let second = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(second.status, 200, "{}", second.text);
        assert_eq!(second.body["success"], true);
        assert_eq!(second.body["pointsEarned"], 0);

        let attempts = attempts_for(&app, uid).await;
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Completed));

        let user = app.user(uid).await;
        assert_eq!(user.tasks_completed, 1);
        assert_eq!(user.points_earned, 10);
        // Same day, so the streak stays put.
        assert_eq!(user.current_streak, 1);
    }

    #[tokio::test]
    async fn repeat_success_counts_when_configured() {
        let app = TestApp::spawn_with(JudgeConfig {
            count_repeat_completions: true,
            ..JudgeConfig::default()
        })
        .await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        app.submit(&token, task_id, SUM, "python").await;
        let second = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(second.body["pointsEarned"], 10);

        let user = app.user(uid).await;
        assert_eq!(user.tasks_completed, 2);
        assert_eq!(user.points_earned, 20);
    }

    #[tokio::test]
    async fn failure_before_success_still_counts_the_first_completion() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        app.submit(&token, task_id, "print(6)", "python").await;
        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.body["pointsEarned"], 10);
        assert_eq!(app.user(uid).await.tasks_completed, 1);
    }

    #[tokio::test]
    async fn failed_counter_update_keeps_the_attempt() {
        use sea_orm::{ActiveModelTrait, Set};
        use server::entity::user;

        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (uid, token) = app.create_user("alice").await;
        let task_id = sum_task(&app, &author).await;

        // Crediting 10 more points overflows the integer column.
        let mut active: user::ActiveModel = app.user(uid).await.into();
        active.points_earned = Set(i32::MAX);
        active.update(&app.db).await.unwrap();

        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["pointsEarned"], 0);

        let attempts = attempts_for(&app, uid).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Completed);
        assert_eq!(attempts[0].id, res.body["attemptId"].as_i64().unwrap() as i32);

        let user = app.user(uid).await;
        assert_eq!(user.tasks_completed, 0);
        assert_eq!(user.points_earned, i32::MAX);
        let categories = user_category_progress::Entity::find()
            .filter(user_category_progress::Column::UserId.eq(uid))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(categories, 0);
    }
}

mod redaction {
    use super::*;

    #[tokio::test]
    async fn hidden_case_data_is_withheld_from_other_users() {
        let app = TestApp::spawn().await;
        let (_, author) = app.create_user("author").await;
        let (_, token) = app.create_user("alice").await;
        let task_id = app.create_task(&author, json!({})).await;
        app.create_test_case(&author, task_id, "2 3", "5", true).await;
        app.create_test_case(&author, task_id, "40 2", "42", false).await;

        let res = app.submit(&token, task_id, SUM, "python").await;
        assert_eq!(res.status, 200, "{}", res.text);
        let results = res.body["testResults"].as_array().unwrap();
        assert_eq!(results[0]["input"], "2 3");
        assert_eq!(results[1]["isPublic"], false);
        assert!(results[1]["input"].is_null());
        assert!(results[1]["expectedOutput"].is_null());
        assert_eq!(results[1]["actualOutput"], "42\n");

        let own = app.submit(&author, task_id, SUM, "python").await;
        assert_eq!(own.body["testResults"][1]["expectedOutput"], "42");
    }
}

mod execution {
    use super::*;

    #[tokio::test]
    async fn execute_echoes_stdin() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::EXECUTE,
                &json!({"code": "print(input())", "language": "python", "input": "hello"}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["output"], "hello");
        assert_eq!(res.body["status"], "success");
        assert_eq!(res.body["exitCode"], 0);
        assert!(res.body.get("error").is_none());
    }

    #[tokio::test]
    async fn execute_clamps_and_reports_timeouts() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::EXECUTE,
                &json!({"code": "while True: pass", "language": "python", "timeLimit": 999999}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "timeout");
        // Clamped to the server maximum.
        assert_eq!(res.body["executionTime"], 30000);
        assert!(res.body["exitCode"].is_null());
    }

    #[tokio::test]
    async fn execute_rejects_unknown_language_and_bad_bodies() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(routes::EXECUTE, &json!({"code": "x", "language": "cobol"}))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "UNSUPPORTED_LANGUAGE");

        let res = app
            .post_without_token(routes::EXECUTE, &json!({"language": "python"}))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn execute_surfaces_sandbox_failure_as_500() {
        let app = TestApp::spawn().await;
        let res = app
            .post_without_token(
                routes::EXECUTE,
                &json!({"code": "# SANDBOX_DOWN", "language": "python"}),
            )
            .await;
        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "SANDBOX_ERROR");
    }

    #[tokio::test]
    async fn languages_lists_public_profiles() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::LANGUAGES).await;
        assert_eq!(res.status, 200);
        let languages = res.body["languages"].as_array().unwrap();
        let ids: Vec<&str> = languages.iter().map(|l| l["id"].as_str().unwrap()).collect();
        for id in ["python", "javascript", "java", "cpp", "go", "rust"] {
            assert!(ids.contains(&id), "missing {id}");
        }
        assert!(languages[0].get("image").is_none());
        assert!(languages[0]["runCmd"].is_string());
    }
}
