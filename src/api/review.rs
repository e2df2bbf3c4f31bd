use crate::db::queries::review::{get_lesson_review, get_tutor_reviews};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn review_routes() -> Router<PgPool> {
    Router::new()
        .route("/reviews/lesson/{lesson_id}", get(get_lesson_review))
        .route("/reviews/tutor/{tutor_id}", get(get_tutor_reviews))
}
