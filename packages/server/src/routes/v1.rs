use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/code", code_routes())
        .nest("/tasks", task_routes())
        .nest("/content/theory", theory_routes())
}

fn code_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::code::execute))
        .routes(routes!(handlers::code::validate))
        .routes(routes!(handlers::code::list_languages))
}

fn task_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::task::create_task))
        .routes(routes!(
            handlers::task::get_task,
            handlers::task::update_task,
            handlers::task::delete_task
        ))
        .routes(routes!(handlers::task::list_test_cases))
        .routes(routes!(handlers::task::create_test_case))
        .routes(routes!(
            handlers::task::update_test_case,
            handlers::task::delete_test_case
        ))
}

fn theory_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::theory::create_card))
        .routes(routes!(handlers::theory::due_cards))
        .routes(routes!(handlers::theory::review_card))
}
