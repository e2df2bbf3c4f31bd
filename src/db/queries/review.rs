// src/db/queries/review.rs
//
// Review store reads. Writes happen through the lesson rating path, which
// also republishes the tutor's aggregate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use bigdecimal::BigDecimal;
use sqlx::PgPool;

use crate::db::models::review::Review;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};

const REVIEW_COLUMNS: &str =
    "id, lesson_id, tutor_id, student_id, rating, comment, created_at, updated_at";

pub async fn get_review_for_lesson(
    pool: &PgPool,
    lesson_id: i32,
) -> ServiceResult<Option<Review>> {
    let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE lesson_id = $1");
    Ok(sqlx::query_as::<_, Review>(&query)
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?)
}

/// Mean rating over all of a tutor's reviews; `None` when unrated.
pub async fn get_average_for_tutor(
    pool: &PgPool,
    tutor_id: i32,
) -> ServiceResult<Option<BigDecimal>> {
    let avg: Option<BigDecimal> =
        sqlx::query_scalar("SELECT AVG(rating) FROM reviews WHERE tutor_id = $1")
            .bind(tutor_id)
            .fetch_one(pool)
            .await?;
    Ok(avg)
}

#[utoipa::path(
    get,
    path = "/reviews/lesson/{lesson_id}",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Review for the lesson, if any", body = Review),
        (status = 404, description = "No review for this lesson")
    ),
    tag = "Reviews",
    security(("bearerAuth" = []))
)]
pub async fn get_lesson_review(
    State(pool): State<PgPool>,
    Path(lesson_id): Path<i32>,
) -> Result<ApiResponse<Review>, ApiResponse<()>> {
    let review = get_review_for_lesson(&pool, lesson_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No review recorded for lesson {lesson_id}"))
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Review retrieved",
        review,
    ))
}

#[utoipa::path(
    get,
    path = "/reviews/tutor/{tutor_id}",
    params(
        ("tutor_id" = i32, Path, description = "Tutor user ID")
    ),
    responses(
        (status = 200, description = "All reviews for the tutor", body = Vec<Review>),
        (status = 500, description = "Failed to retrieve reviews")
    ),
    tag = "Reviews",
    security(("bearerAuth" = []))
)]
pub async fn get_tutor_reviews(
    State(pool): State<PgPool>,
    Path(tutor_id): Path<i32>,
) -> Result<ApiResponse<Vec<Review>>, ApiResponse<()>> {
    let query = format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE tutor_id = $1 ORDER BY created_at DESC"
    );
    let reviews = sqlx::query_as::<_, Review>(&query)
        .bind(tutor_id)
        .fetch_all(&pool)
        .await
        .map_err(ServiceError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Reviews retrieved",
        reviews,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_lesson_review, get_tutor_reviews),
    components(schemas(Review)),
    tags(
        (name = "Reviews", description = "Review store reads")
    )
)]
pub struct ReviewDoc;
