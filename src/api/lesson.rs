use crate::db::queries::lesson::{
    get_lesson, get_survey_eligibility, lesson_action, list_lessons, rate_lesson_handler,
    run_sweep_handler,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn lesson_routes() -> Router<PgPool> {
    Router::new()
        .route("/lessons", get(list_lessons))
        .route("/lessons/sweep", post(run_sweep_handler))
        .route("/lessons/{lesson_id}", get(get_lesson))
        .route("/lessons/{lesson_id}/action", post(lesson_action))
        .route("/lessons/{lesson_id}/rating", post(rate_lesson_handler))
        .route(
            "/lessons/{lesson_id}/survey-eligibility",
            get(get_survey_eligibility),
        )
}
