// src/db/queries/lesson_request.rs
//
// Lesson Request Ledger: the pending-negotiation phase between a student and
// a tutor. A request is created `pending` and reaches exactly one terminal
// state; acceptance materializes the confirmed lesson in the same
// transaction.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::lesson::Lesson;
use crate::db::models::lesson_request::{
    LessonRequest, NewLessonRequest, RequestAction, RequestDecision, RequestStatus,
};
use crate::db::queries::lesson::materialize_lesson;
use crate::db::queries::subject::find_subject;
use crate::db::queries::user::{find_tutor, get_username};
use crate::middleware::auth::{ActorRole, SubjectCache};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};
use crate::utils::notification::{
    notification_types, notify_lesson_request_created, notify_request_decided,
};
use crate::utils::time::{scheduled_for, split_instant};

const REQUEST_COLUMNS: &str =
    "id, student_id, tutor_id, subject_id, scheduled_time, status, created_at";

pub async fn get_lesson_request_by_id(
    pool: &PgPool,
    request_id: i32,
) -> ServiceResult<LessonRequest> {
    let query = format!("SELECT {REQUEST_COLUMNS} FROM lesson_requests WHERE id = $1");
    sqlx::query_as::<_, LessonRequest>(&query)
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Lesson request {request_id} not found")))
}

/// Create a new lesson request for a student.
///
/// The scheduled instant must be strictly in the future, the tutor and
/// subject must exist, and the student may not already have a pending
/// request with the same tutor on the same calendar day. The duplicate
/// guard is part of the insert statement itself; the partial unique index
/// on `(student_id, tutor_id, date, 'pending')` closes the remaining race.
pub async fn create_request(
    pool: &PgPool,
    cache: &SubjectCache,
    student_id: i32,
    payload: &NewLessonRequest,
) -> ServiceResult<LessonRequest> {
    if payload.scheduled_time <= Utc::now().naive_utc() {
        return Err(ServiceError::Validation(
            "Lesson must be scheduled in the future".to_string(),
        ));
    }

    find_tutor(pool, payload.tutor_id).await?;
    find_subject(pool, cache, payload.subject_id).await?;

    let query = format!(
        "INSERT INTO lesson_requests (student_id, tutor_id, subject_id, scheduled_time)
         SELECT $1, $2, $3, $4
         WHERE NOT EXISTS (
             SELECT 1 FROM lesson_requests
             WHERE student_id = $1
               AND tutor_id = $2
               AND status = 'pending'
               AND scheduled_time::date = $4::date
         )
         RETURNING {REQUEST_COLUMNS}"
    );
    let request = sqlx::query_as::<_, LessonRequest>(&query)
        .bind(student_id)
        .bind(payload.tutor_id)
        .bind(payload.subject_id)
        .bind(payload.scheduled_time)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict(
                "A pending request with this tutor already exists for that day".to_string(),
            )
        })?;

    // Fire-and-forget: a failed notification never fails the request.
    let (date, start) = split_instant(request.scheduled_time);
    let student_name = get_username(pool, student_id)
        .await
        .unwrap_or_else(|_| format!("user {student_id}"));
    if let Err(e) = notify_lesson_request_created(
        pool,
        request.tutor_id,
        &student_name,
        request.id,
        &scheduled_for(date, start),
    )
    .await
    {
        tracing::warn!(request_id = request.id, error = %e, "Failed to notify tutor of new request");
    }

    Ok(request)
}

/// Apply a decision to a pending request.
///
/// Accept/Reject belong to the request's tutor; Cancel to either participant.
/// Admins may do any of the three. The status write is a compare-and-set on
/// `pending`, so two racing deciders produce exactly one winner; the loser
/// observes a state error. Accepting materializes the lesson in the same
/// transaction.
pub async fn decide_request(
    pool: &PgPool,
    request_id: i32,
    action: RequestAction,
    actor_id: i32,
    actor_role: ActorRole,
) -> ServiceResult<(LessonRequest, Option<Lesson>)> {
    let request = get_lesson_request_by_id(pool, request_id).await?;

    let authorized = match action {
        RequestAction::Accept | RequestAction::Reject => {
            actor_role.is_admin() || actor_id == request.tutor_id
        }
        RequestAction::Cancel => {
            actor_role.is_admin()
                || actor_id == request.tutor_id
                || actor_id == request.student_id
        }
    };
    if !authorized {
        return Err(ServiceError::Authorization(
            "You do not have permission to decide this request".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let query = format!(
        "UPDATE lesson_requests
         SET status = $2
         WHERE id = $1 AND status = 'pending'
         RETURNING {REQUEST_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, LessonRequest>(&query)
        .bind(request_id)
        .bind(action.target_status())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ServiceError::State(format!(
                "Lesson request {request_id} is not pending and can no longer be decided"
            ))
        })?;

    let lesson = match action {
        RequestAction::Accept => Some(materialize_lesson(&mut tx, &updated).await?),
        RequestAction::Reject | RequestAction::Cancel => None,
    };

    tx.commit().await?;

    notify_decision(pool, &updated, action, actor_id).await;

    Ok((updated, lesson))
}

/// Best-effort decision notification to the non-acting participant.
async fn notify_decision(pool: &PgPool, request: &LessonRequest, action: RequestAction, actor_id: i32) {
    let (notification_type, outcome) = match action {
        RequestAction::Accept => (notification_types::LESSON_REQUEST_ACCEPTED, "accepted"),
        RequestAction::Reject => (notification_types::LESSON_REQUEST_REJECTED, "rejected"),
        RequestAction::Cancel => (notification_types::LESSON_REQUEST_CANCELLED, "cancelled"),
    };
    let target = if actor_id == request.student_id {
        request.tutor_id
    } else {
        request.student_id
    };
    let actor_name = get_username(pool, actor_id)
        .await
        .unwrap_or_else(|_| format!("user {actor_id}"));
    if let Err(e) = notify_request_decided(
        pool,
        target,
        &actor_name,
        request.id,
        notification_type,
        outcome,
    )
    .await
    {
        tracing::warn!(request_id = request.id, error = %e, "Failed to notify request decision");
    }
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewLessonRequest,
    responses(
        (status = 201, description = "Lesson request created successfully", body = LessonRequest),
        (status = 400, description = "Scheduled time is not in the future"),
        (status = 403, description = "Only students can create lesson requests"),
        (status = 404, description = "Tutor or subject not found"),
        (status = 409, description = "Duplicate pending request for that day")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_lesson_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(cache): Extension<SubjectCache>,
    Json(payload): Json<NewLessonRequest>,
) -> Result<ApiResponse<LessonRequest>, ApiResponse<()>> {
    let student_id = claims.user_id()?;
    if !claims.actor_role().is_student() {
        return Err(ServiceError::Authorization(
            "Only students can create lesson requests".to_string(),
        )
        .into());
    }

    let request = create_request(&pool, &cache, student_id, &payload).await?;
    Ok(ApiResponse::created("Lesson request created", request))
}

#[utoipa::path(
    get,
    path = "/requests",
    responses(
        (status = 200, description = "List the caller's lesson requests", body = Vec<LessonRequest>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_lesson_requests(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<LessonRequest>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    let role = claims.actor_role();

    let query = if role.is_admin() {
        format!("SELECT {REQUEST_COLUMNS} FROM lesson_requests ORDER BY created_at DESC")
    } else if role.is_tutor() {
        format!(
            "SELECT {REQUEST_COLUMNS} FROM lesson_requests WHERE tutor_id = $1 ORDER BY created_at DESC"
        )
    } else {
        format!(
            "SELECT {REQUEST_COLUMNS} FROM lesson_requests WHERE student_id = $1 ORDER BY created_at DESC"
        )
    };

    let mut q = sqlx::query_as::<_, LessonRequest>(&query);
    if !role.is_admin() {
        q = q.bind(user_id);
    }
    let requests = q.fetch_all(&pool).await.map_err(ServiceError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Lesson requests retrieved",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(
        ("request_id" = i32, Path, description = "Lesson request ID")
    ),
    responses(
        (status = 200, description = "Lesson request retrieved", body = LessonRequest),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Lesson request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_lesson_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<LessonRequest>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    let request = get_lesson_request_by_id(&pool, request_id).await?;

    if !claims.actor_role().is_admin()
        && user_id != request.student_id
        && user_id != request.tutor_id
    {
        return Err(ServiceError::Authorization(
            "You are not a participant of this request".to_string(),
        )
        .into());
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Lesson request retrieved",
        request,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/decision",
    params(
        ("request_id" = i32, Path, description = "Lesson request ID")
    ),
    request_body = RequestDecision,
    responses(
        (status = 200, description = "Decision applied", body = LessonRequest),
        (status = 403, description = "Caller may not decide this request"),
        (status = 404, description = "Lesson request not found"),
        (status = 409, description = "Request already decided")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn decide_lesson_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i32>,
    Json(decision): Json<RequestDecision>,
) -> Result<ApiResponse<LessonRequest>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let (request, _lesson) = decide_request(
        &pool,
        request_id,
        decision.action,
        actor_id,
        claims.actor_role(),
    )
    .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Decision applied",
        request,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_lesson_request,
        list_lesson_requests,
        get_lesson_request,
        decide_lesson_request
    ),
    components(schemas(LessonRequest, NewLessonRequest, RequestDecision, RequestStatus, RequestAction)),
    tags(
        (name = "Requests", description = "Endpoints for the lesson request negotiation phase")
    )
)]
pub struct RequestDoc;
