use crate::db::queries::lesson_request::{
    create_lesson_request, decide_lesson_request, get_lesson_request, list_lesson_requests,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_lesson_request).get(list_lesson_requests))
        .route("/requests/{request_id}", get(get_lesson_request))
        .route("/requests/{request_id}/decision", post(decide_lesson_request))
}
