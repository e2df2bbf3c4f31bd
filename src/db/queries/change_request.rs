// src/db/queries/change_request.rs
//
// Change-Request Negotiator: single-flight reschedule negotiation on an
// existing lesson. Proposals are append-only history; at most one pending
// proposal exists per lesson, and only the non-proposing participant may
// resolve it.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::change_request::{
    ChangeRequestResolution, ChangeRequestStatus, LessonChangeRequest, NewChangeRequest,
    ResolveChangeRequest,
};
use crate::db::models::lesson::Lesson;
use crate::db::queries::lesson::{apply_reschedule, get_lesson_by_id};
use crate::db::queries::user::get_username;
use crate::middleware::auth::ActorRole;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};
use crate::utils::notification::{notify_change_proposed, notify_change_resolved};
use crate::utils::time::{scheduled_for, CalendarDate, WallClockTime};

const CHANGE_REQUEST_COLUMNS: &str = "id, lesson_id, requester_id, proposed_date, \
    proposed_time, comment, status, reason, created_at";

pub async fn get_change_request_by_id(
    pool: &PgPool,
    change_request_id: i32,
) -> ServiceResult<LessonChangeRequest> {
    let query =
        format!("SELECT {CHANGE_REQUEST_COLUMNS} FROM lesson_change_requests WHERE id = $1");
    sqlx::query_as::<_, LessonChangeRequest>(&query)
        .bind(change_request_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Change request {change_request_id} not found"))
        })
}

/// Propose moving an existing lesson to a new date/time.
///
/// The guard against a second outstanding proposal is part of the insert
/// statement; the partial unique index on pending rows closes the remaining
/// race window (a raced duplicate surfaces as a conflict either way).
pub async fn propose_change(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    payload: &NewChangeRequest,
) -> ServiceResult<LessonChangeRequest> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;

    if lesson.is_completed {
        return Err(ServiceError::State(format!(
            "Lesson {lesson_id} is completed and can no longer be rescheduled"
        )));
    }
    if actor_id != lesson.tutor_id && actor_id != lesson.student_id {
        return Err(ServiceError::Authorization(
            "Only lesson participants can propose a reschedule".to_string(),
        ));
    }

    let query = format!(
        "INSERT INTO lesson_change_requests
             (lesson_id, requester_id, proposed_date, proposed_time, comment)
         SELECT $1, $2, $3, $4, $5
         WHERE NOT EXISTS (
             SELECT 1 FROM lesson_change_requests
             WHERE lesson_id = $1 AND status = 'pending'
         )
         RETURNING {CHANGE_REQUEST_COLUMNS}"
    );
    let change = sqlx::query_as::<_, LessonChangeRequest>(&query)
        .bind(lesson_id)
        .bind(actor_id)
        .bind(payload.proposed_date)
        .bind(payload.proposed_time)
        .bind(&payload.comment)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict(format!(
                "A pending change request already exists for lesson {lesson_id}"
            ))
        })?;

    let other = if actor_id == lesson.tutor_id {
        lesson.student_id
    } else {
        lesson.tutor_id
    };
    let proposer_name = get_username(pool, actor_id)
        .await
        .unwrap_or_else(|_| format!("user {actor_id}"));
    let proposed_for = scheduled_for(
        CalendarDate::from_naive(change.proposed_date),
        WallClockTime::from_naive(change.proposed_time),
    );
    if let Err(e) = notify_change_proposed(
        pool,
        other,
        &proposer_name,
        lesson_id,
        change.id,
        &proposed_for,
    )
    .await
    {
        tracing::warn!(change_request_id = change.id, error = %e, "Failed to notify reschedule proposal");
    }

    Ok(change)
}

/// Resolve a pending change request as the non-proposing participant.
///
/// Self-approval is forbidden. Acceptance applies the reschedule to the
/// parent lesson in the same transaction; rejection leaves the lesson
/// untouched and stamps the optional reason.
pub async fn resolve_change(
    pool: &PgPool,
    change_request_id: i32,
    actor_id: i32,
    role: ActorRole,
    resolution: ChangeRequestResolution,
    reason: Option<&str>,
) -> ServiceResult<(LessonChangeRequest, Option<Lesson>)> {
    let change = get_change_request_by_id(pool, change_request_id).await?;
    let lesson = get_lesson_by_id(pool, change.lesson_id).await?;

    if actor_id == change.requester_id {
        return Err(ServiceError::Authorization(
            "You cannot resolve your own change request".to_string(),
        ));
    }
    let is_other_participant = (actor_id == lesson.tutor_id || actor_id == lesson.student_id)
        && actor_id != change.requester_id;
    if !role.is_admin() && !is_other_participant {
        return Err(ServiceError::Authorization(
            "Only the other lesson participant can resolve this change request".to_string(),
        ));
    }

    let target_status = match resolution {
        ChangeRequestResolution::Accept => ChangeRequestStatus::Accepted,
        ChangeRequestResolution::Reject => ChangeRequestStatus::Rejected,
    };

    let mut tx = pool.begin().await?;

    let query = format!(
        "UPDATE lesson_change_requests
         SET status = $2, reason = $3
         WHERE id = $1 AND status = 'pending'
         RETURNING {CHANGE_REQUEST_COLUMNS}"
    );
    let resolved = sqlx::query_as::<_, LessonChangeRequest>(&query)
        .bind(change_request_id)
        .bind(target_status)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ServiceError::State(format!(
                "Change request {change_request_id} is not pending and can no longer be resolved"
            ))
        })?;

    let lesson = match resolution {
        ChangeRequestResolution::Accept => Some(
            apply_reschedule(
                &mut tx,
                resolved.lesson_id,
                resolved.proposed_date,
                resolved.proposed_time,
            )
            .await?,
        ),
        ChangeRequestResolution::Reject => None,
    };

    tx.commit().await?;

    let outcome = match resolution {
        ChangeRequestResolution::Accept => "accepted",
        ChangeRequestResolution::Reject => "rejected",
    };
    let resolver_name = get_username(pool, actor_id)
        .await
        .unwrap_or_else(|_| format!("user {actor_id}"));
    if let Err(e) = notify_change_resolved(
        pool,
        resolved.requester_id,
        &resolver_name,
        resolved.lesson_id,
        resolved.id,
        outcome,
    )
    .await
    {
        tracing::warn!(change_request_id = resolved.id, error = %e, "Failed to notify reschedule resolution");
    }

    Ok((resolved, lesson))
}

/// Withdraw a pending proposal as its requester. The row is deleted; the
/// lesson never knew about it.
pub async fn cancel_change(
    pool: &PgPool,
    change_request_id: i32,
    actor_id: i32,
) -> ServiceResult<()> {
    let change = get_change_request_by_id(pool, change_request_id).await?;

    if actor_id != change.requester_id {
        return Err(ServiceError::Authorization(
            "Only the requester can cancel a change request".to_string(),
        ));
    }

    let deleted: Option<i32> = sqlx::query_scalar(
        "DELETE FROM lesson_change_requests WHERE id = $1 AND status = 'pending' RETURNING id",
    )
    .bind(change_request_id)
    .fetch_optional(pool)
    .await?;

    if deleted.is_none() {
        return Err(ServiceError::State(format!(
            "Change request {change_request_id} is no longer pending and cannot be cancelled"
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/change-requests",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    request_body = NewChangeRequest,
    responses(
        (status = 201, description = "Change request created", body = LessonChangeRequest),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "A pending change request already exists")
    ),
    tag = "Change Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_change_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
    Json(payload): Json<NewChangeRequest>,
) -> Result<ApiResponse<LessonChangeRequest>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let change = propose_change(&pool, lesson_id, actor_id, &payload).await?;
    Ok(ApiResponse::created("Change request created", change))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/change-requests",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Change request history for the lesson", body = Vec<LessonChangeRequest>),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "Change Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_change_requests(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
) -> Result<ApiResponse<Vec<LessonChangeRequest>>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let role = claims.actor_role();
    let lesson = get_lesson_by_id(&pool, lesson_id).await?;

    if !role.is_admin() && actor_id != lesson.tutor_id && actor_id != lesson.student_id {
        return Err(ServiceError::Authorization(
            "You are not a participant of this lesson".to_string(),
        )
        .into());
    }

    let query = format!(
        "SELECT {CHANGE_REQUEST_COLUMNS} FROM lesson_change_requests
         WHERE lesson_id = $1
         ORDER BY created_at DESC"
    );
    let changes = sqlx::query_as::<_, LessonChangeRequest>(&query)
        .bind(lesson_id)
        .fetch_all(&pool)
        .await
        .map_err(ServiceError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Change requests retrieved",
        changes,
    ))
}

#[utoipa::path(
    post,
    path = "/change-requests/{change_request_id}/resolution",
    params(
        ("change_request_id" = i32, Path, description = "Change request ID")
    ),
    request_body = ResolveChangeRequest,
    responses(
        (status = 200, description = "Change request resolved", body = LessonChangeRequest),
        (status = 403, description = "Self-approval or non-participant"),
        (status = 404, description = "Change request not found"),
        (status = 409, description = "Change request already resolved")
    ),
    tag = "Change Requests",
    security(("bearerAuth" = []))
)]
pub async fn resolve_change_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(change_request_id): Path<i32>,
    Json(payload): Json<ResolveChangeRequest>,
) -> Result<ApiResponse<LessonChangeRequest>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let (resolved, _lesson) = resolve_change(
        &pool,
        change_request_id,
        actor_id,
        claims.actor_role(),
        payload.action,
        payload.reason.as_deref(),
    )
    .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Change request resolved",
        resolved,
    ))
}

#[utoipa::path(
    delete,
    path = "/change-requests/{change_request_id}",
    params(
        ("change_request_id" = i32, Path, description = "Change request ID")
    ),
    responses(
        (status = 200, description = "Change request cancelled"),
        (status = 403, description = "Only the requester can cancel"),
        (status = 404, description = "Change request not found"),
        (status = 409, description = "Change request already resolved")
    ),
    tag = "Change Requests",
    security(("bearerAuth" = []))
)]
pub async fn cancel_change_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(change_request_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    cancel_change(&pool, change_request_id, actor_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Change request cancelled",
        (),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_change_request,
        list_change_requests,
        resolve_change_request,
        cancel_change_request
    ),
    components(schemas(LessonChangeRequest, NewChangeRequest, ResolveChangeRequest, ChangeRequestStatus, ChangeRequestResolution)),
    tags(
        (name = "Change Requests", description = "Endpoints for reschedule negotiation on confirmed lessons")
    )
)]
pub struct ChangeRequestDoc;
