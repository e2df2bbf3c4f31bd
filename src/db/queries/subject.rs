use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use sqlx::PgPool;

use crate::db::models::subject::Subject;
use crate::middleware::auth::SubjectCache;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};

/// Catalog lookup with the moka TTL cache in front of the table.
pub async fn find_subject(
    pool: &PgPool,
    cache: &SubjectCache,
    subject_id: i32,
) -> ServiceResult<Subject> {
    if let Some(subject) = cache.get(&subject_id) {
        return Ok(subject);
    }

    let subject = sqlx::query_as::<_, Subject>("SELECT id, name FROM subjects WHERE id = $1")
        .bind(subject_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Subject {subject_id} not found")))?;

    cache.insert(subject_id, subject.clone());
    Ok(subject)
}

#[utoipa::path(
    get,
    path = "/subjects",
    responses(
        (status = 200, description = "List all subjects", body = [Subject]),
        (status = 500, description = "Failed to retrieve subjects")
    ),
    tag = "Subjects",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_subjects(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<Subject>>, ApiResponse<()>> {
    let subjects = sqlx::query_as::<_, Subject>("SELECT id, name FROM subjects ORDER BY name")
        .fetch_all(&pool)
        .await
        .map_err(ServiceError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Subjects retrieved successfully",
        subjects,
    ))
}

#[utoipa::path(
    get,
    path = "/subjects/{id}",
    params(
        ("id" = i32, Path, description = "Subject ID")
    ),
    responses(
        (status = 200, description = "Retrieve a single subject", body = Subject),
        (status = 404, description = "Subject not found")
    ),
    tag = "Subjects",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_subject(
    State(pool): State<PgPool>,
    Extension(cache): Extension<SubjectCache>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Subject>, ApiResponse<()>> {
    let subject = find_subject(&pool, &cache, id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Subject retrieved successfully",
        subject,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_all_subjects, get_subject),
    components(schemas(Subject)),
    tags(
        (name = "Subjects", description = "Subject catalog lookups")
    )
)]
pub struct SubjectDoc;
