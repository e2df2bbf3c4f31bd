use crate::db::queries::change_request::{
    cancel_change_request, create_change_request, list_change_requests, resolve_change_request,
};
use axum::{
    routing::{delete, post},
    Router,
};
use sqlx::PgPool;

pub fn change_request_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/lessons/{lesson_id}/change-requests",
            post(create_change_request).get(list_change_requests),
        )
        .route(
            "/change-requests/{change_request_id}/resolution",
            post(resolve_change_request),
        )
        .route(
            "/change-requests/{change_request_id}",
            delete(cancel_change_request),
        )
}
