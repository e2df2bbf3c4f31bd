use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgPool;

use crate::db::models::user::{TutorProfile, UserInfo};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};

const USER_INFO_COLUMNS: &str = "id, username, role";

const TUTOR_PROFILE_COLUMNS: &str = "tp.user_id, u.username, tp.headline, tp.price_per_hour, \
    tp.rating_avg";

/// Directory lookup: user by id.
pub async fn find_user(pool: &PgPool, user_id: i32) -> ServiceResult<UserInfo> {
    let query = format!("SELECT {USER_INFO_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, UserInfo>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
}

/// Directory lookup: tutor profile by user id. Fails if the user is not a
/// tutor or has no profile row.
pub async fn find_tutor(pool: &PgPool, tutor_id: i32) -> ServiceResult<TutorProfile> {
    let query = format!(
        "SELECT {TUTOR_PROFILE_COLUMNS}
         FROM tutor_profiles tp
         JOIN users u ON u.id = tp.user_id
         WHERE tp.user_id = $1 AND u.role = 'tutor'"
    );
    sqlx::query_as::<_, TutorProfile>(&query)
        .bind(tutor_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Tutor {tutor_id} not found")))
}

/// Convenience username lookup for notification texts.
pub async fn get_username(pool: &PgPool, user_id: i32) -> ServiceResult<String> {
    sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
}

/// Republish a tutor's aggregate rating as the mean over all their reviews.
pub async fn refresh_tutor_rating(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tutor_id: i32,
) -> ServiceResult<()> {
    sqlx::query(
        "UPDATE tutor_profiles
         SET rating_avg = (SELECT AVG(rating) FROM reviews WHERE tutor_id = $1)
         WHERE user_id = $1",
    )
    .bind(tutor_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Retrieve a single user", body = UserInfo),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user = find_user(&pool, id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "User retrieved successfully",
        user,
    ))
}

#[utoipa::path(
    get,
    path = "/tutors/{id}",
    params(
        ("id" = i32, Path, description = "Tutor user ID")
    ),
    responses(
        (status = 200, description = "Retrieve a tutor profile", body = TutorProfile),
        (status = 404, description = "Tutor not found")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_tutor(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<TutorProfile>, ApiResponse<()>> {
    let tutor = find_tutor(&pool, id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Tutor retrieved successfully",
        tutor,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_user, get_tutor),
    components(schemas(UserInfo, TutorProfile)),
    tags(
        (name = "Users", description = "User and tutor directory lookups")
    )
)]
pub struct UserDoc;
