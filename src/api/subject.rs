use crate::db::queries::subject::{get_all_subjects, get_subject};
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn subject_routes() -> Router<PgPool> {
    Router::new()
        .route("/subjects", get(get_all_subjects))
        .route("/subjects/{id}", get(get_subject))
}
