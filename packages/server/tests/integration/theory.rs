use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;
use server::entity::{theory_card, user_activity, user_theory_progress};

use crate::common::{TestApp, routes};

async fn create_card(app: &TestApp, token: &str, question: &str) -> i32 {
    let res = app
        .post_with_token(
            routes::THEORY,
            &json!({
                "question": question,
                "answer": "An answer",
                "category": "algorithms",
                "tags": ["sm2"],
            }),
            token,
        )
        .await;
    assert_eq!(res.status, 201, "create card failed: {}", res.text);
    res.id()
}

/// Moves the caller's schedule for `card_id` into the past so it shows up as due.
async fn make_due(app: &TestApp, user_id: i32, card_id: i32, hours_ago: i64) {
    let row = user_theory_progress::Entity::find()
        .filter(user_theory_progress::Column::UserId.eq(user_id))
        .filter(user_theory_progress::Column::TheoryCardId.eq(card_id))
        .one(&app.db)
        .await
        .unwrap()
        .expect("progress row");
    let mut active: user_theory_progress::ActiveModel = row.into();
    active.next_review_at = Set(chrono::Utc::now() - chrono::Duration::hours(hours_ago));
    active.update(&app.db).await.unwrap();
}

mod cards {
    use super::*;

    #[tokio::test]
    async fn create_card_returns_created() {
        let app = TestApp::spawn().await;
        let (uid, token) = app.create_user("mentor").await;

        let res = app
            .post_with_token(
                routes::THEORY,
                &json!({
                    "question": "What is a borrow?",
                    "answer": "A reference",
                    "category": " rust ",
                    "difficulty": "advanced",
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["category"], "rust");
        assert_eq!(res.body["difficulty"], "advanced");
        assert_eq!(res.body["is_active"], true);
        assert_eq!(res.body["created_by_id"], uid);
    }

    #[tokio::test]
    async fn create_card_rejects_blank_fields_and_anonymous_callers() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("mentor").await;

        let res = app
            .post_with_token(
                routes::THEORY,
                &json!({"question": " ", "answer": "a", "category": "c"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .post_without_token(
                routes::THEORY,
                &json!({"question": "q", "answer": "a", "category": "c"}),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod review {
    use super::*;

    #[tokio::test]
    async fn review_sequence_follows_sm2_intervals() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("learner").await;
        let card = create_card(&app, &token, "Q1").await;

        let mut intervals = Vec::new();
        for answer in ["good", "good", "good", "again", "good"] {
            let res = app
                .post_with_token(&routes::theory_review(card), &json!({"answer": answer}), &token)
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
            assert!(res.body["ease_factor"].as_f64().unwrap() >= 1.3);
            assert_eq!(res.body["last_answer"], answer);
            intervals.push(res.body["interval"].as_i64().unwrap());
        }
        assert_eq!(intervals, vec![1, 6, 15, 1, 1]);

        let rows = user_theory_progress::Entity::find()
            .filter(user_theory_progress::Column::TheoryCardId.eq(card))
            .all(&app.db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].review_count, 5);
        assert_eq!(rows[0].repetitions, 1);
        assert!(rows[0].next_review_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn progress_is_tracked_per_user() {
        let app = TestApp::spawn().await;
        let (_, alice) = app.create_user("alice").await;
        let (_, bob) = app.create_user("bob").await;
        let card = create_card(&app, &alice, "Q").await;

        for _ in 0..2 {
            app.post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &alice)
                .await;
        }
        let res = app
            .post_with_token(&routes::theory_review(card), &json!({"answer": "easy"}), &bob)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["interval"], 1);
        assert_eq!(res.body["review_count"], 1);
        assert!((res.body["ease_factor"].as_f64().unwrap() - 2.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_first_reviews_share_one_progress_row() {
        let app = TestApp::spawn().await;
        let (uid, token) = app.create_user("learner").await;
        let card = create_card(&app, &token, "Q").await;

        let path = routes::theory_review(card);
        let body = json!({"answer": "good"});
        let (a, b) = tokio::join!(
            app.post_with_token(&path, &body, &token),
            app.post_with_token(&path, &body, &token),
        );
        assert_eq!(a.status, 200, "{}", a.text);
        assert_eq!(b.status, 200, "{}", b.text);

        let rows = user_theory_progress::Entity::find()
            .filter(user_theory_progress::Column::UserId.eq(uid))
            .filter(user_theory_progress::Column::TheoryCardId.eq(card))
            .all(&app.db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].review_count, 2);
        assert_eq!(rows[0].interval, 6);
    }

    #[tokio::test]
    async fn review_rejects_missing_inactive_and_malformed() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("learner").await;
        let card = create_card(&app, &token, "Q").await;

        let res = app
            .post_with_token(&routes::theory_review(9999), &json!({"answer": "good"}), &token)
            .await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");

        let res = app
            .post_with_token(&routes::theory_review(card), &json!({"answer": "perfect"}), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let row = theory_card::Entity::find_by_id(card)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: theory_card::ActiveModel = row.into();
        active.is_active = Set(false);
        active.update(&app.db).await.unwrap();

        let res = app
            .post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &token)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn review_logs_activity_and_starts_streak() {
        let app = TestApp::spawn().await;
        let (uid, token) = app.create_user("learner").await;
        let card = create_card(&app, &token, "Q").await;

        app.post_with_token(&routes::theory_review(card), &json!({"answer": "hard"}), &token)
            .await;
        app.post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &token)
            .await;

        let reviews = user_activity::Entity::find()
            .filter(user_activity::Column::UserId.eq(uid))
            .filter(user_activity::Column::ActivityType.eq("theory_review"))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(reviews, 2);

        let user = app.user(uid).await;
        assert_eq!(user.current_streak, 1);
        assert_eq!(user.points_earned, 0);
        assert_eq!(user.tasks_completed, 0);
    }
}

mod due {
    use super::*;

    #[tokio::test]
    async fn freshly_reviewed_cards_are_not_due() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("learner").await;
        let card = create_card(&app, &token, "Q").await;
        app.post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &token)
            .await;

        let res = app.get_with_token(routes::THEORY_DUE, &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"], json!([]));
    }

    #[tokio::test]
    async fn due_cards_come_back_soonest_first_with_progress() {
        let app = TestApp::spawn().await;
        let (uid, token) = app.create_user("learner").await;
        let (_, other) = app.create_user("other").await;
        let first = create_card(&app, &token, "First").await;
        let second = create_card(&app, &token, "Second").await;
        let never_reviewed = create_card(&app, &token, "Never").await;

        for card in [first, second] {
            app.post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &token)
                .await;
        }
        make_due(&app, uid, first, 1).await;
        make_due(&app, uid, second, 5).await;

        let res = app.get_with_token(routes::THEORY_DUE, &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], second);
        assert_eq!(data[0]["question"], "Second");
        assert_eq!(data[0]["progress"]["theory_card_id"], second);
        assert_eq!(data[0]["progress"]["interval"], 1);
        assert_eq!(data[1]["id"], first);
        assert!(data.iter().all(|c| c["id"] != never_reviewed));

        // Another user's schedule is separate.
        let res = app.get_with_token(routes::THEORY_DUE, &other).await;
        assert_eq!(res.body["data"], json!([]));
    }

    #[tokio::test]
    async fn due_list_honours_limit_and_skips_inactive_cards() {
        let app = TestApp::spawn().await;
        let (uid, token) = app.create_user("learner").await;

        let mut cards = Vec::new();
        for i in 0..3 {
            let card = create_card(&app, &token, &format!("Q{i}")).await;
            app.post_with_token(&routes::theory_review(card), &json!({"answer": "good"}), &token)
                .await;
            make_due(&app, uid, card, 10 - i).await;
            cards.push(card);
        }

        let res = app
            .get_with_token(&format!("{}?limit=2", routes::THEORY_DUE), &token)
            .await;
        assert_eq!(res.body["data"].as_array().unwrap().len(), 2);

        let res = app
            .get_with_token(&format!("{}?limit=0", routes::THEORY_DUE), &token)
            .await;
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);

        let row = theory_card::Entity::find_by_id(cards[0])
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: theory_card::ActiveModel = row.into();
        active.is_active = Set(false);
        active.update(&app.db).await.unwrap();

        let res = app.get_with_token(routes::THEORY_DUE, &token).await;
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|c| c["id"] != cards[0]));
    }

    #[tokio::test]
    async fn due_list_requires_auth_and_a_numeric_limit() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("learner").await;

        let res = app.get_without_token(routes::THEORY_DUE).await;
        assert_eq!(res.status, 401);

        let res = app
            .get_with_token(&format!("{}?limit=lots", routes::THEORY_DUE), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}
