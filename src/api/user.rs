use crate::db::queries::user::{get_tutor, get_user};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users/{id}", get(get_user))
        .route("/tutors/{id}", get(get_tutor))
}
