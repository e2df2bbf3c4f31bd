// src/db/queries/lesson.rs
//
// Lesson Ledger: confirmed, scheduled sessions. Rows are created exactly
// once per accepted request, mutated only by reschedule and the one-way
// completion latch, and never deleted. Every state write is a conditional
// update so racing writers resolve to one winner.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::api::auth::Claims;
use crate::db::models::lesson::{
    Lesson, LessonAction, RateLesson, SurveyEligibility, SweepReport,
};
use crate::db::models::lesson_request::LessonRequest;
use crate::db::models::lesson_view::{
    ConfirmedLessonRow, LessonSource, LessonView, PendingRequestRow, ViewerRole,
};
use crate::db::models::review::Review;
use crate::db::queries::user::refresh_tutor_rating;
use crate::middleware::auth::ActorRole;
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};
use crate::utils::lesson_view::build_lesson_view;
use crate::utils::time::{split_instant, WallClockTime, LESSON_DURATION_MINUTES};

const LESSON_COLUMNS: &str = "id, request_id, tutor_id, student_id, lesson_date, start_time, \
    end_time, is_completed, created_at";

const REVIEW_COLUMNS: &str =
    "id, lesson_id, tutor_id, student_id, rating, comment, created_at, updated_at";

/// Joined row shape consumed by the presentation formatter.
const CONFIRMED_VIEW_BASE: &str = "SELECT l.id, l.request_id, l.tutor_id, l.student_id, \
    l.lesson_date, l.start_time, l.end_time, l.is_completed, \
    r.status AS request_status, \
    s.name AS subject_name, \
    tu.username AS tutor_name, \
    su.username AS student_name, \
    tp.price_per_hour, \
    rv.rating AS review_rating, \
    rv.comment AS review_comment, \
    rv.created_at AS review_created_at \
    FROM lessons l \
    LEFT JOIN lesson_requests r ON r.id = l.request_id \
    LEFT JOIN subjects s ON s.id = r.subject_id \
    JOIN users tu ON tu.id = l.tutor_id \
    JOIN users su ON su.id = l.student_id \
    LEFT JOIN tutor_profiles tp ON tp.user_id = l.tutor_id \
    LEFT JOIN reviews rv ON rv.lesson_id = l.id AND rv.student_id = l.student_id";

const PENDING_VIEW_BASE: &str = "SELECT q.id, q.student_id, q.tutor_id, q.scheduled_time, \
    q.status, \
    s.name AS subject_name, \
    tu.username AS tutor_name, \
    su.username AS student_name, \
    tp.price_per_hour \
    FROM lesson_requests q \
    JOIN users tu ON tu.id = q.tutor_id \
    JOIN users su ON su.id = q.student_id \
    LEFT JOIN subjects s ON s.id = q.subject_id \
    LEFT JOIN tutor_profiles tp ON tp.user_id = q.tutor_id";

pub async fn get_lesson_by_id(pool: &PgPool, lesson_id: i32) -> ServiceResult<Lesson> {
    let query = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1");
    sqlx::query_as::<_, Lesson>(&query)
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Lesson {lesson_id} not found")))
}

fn ensure_participant(lesson: &Lesson, actor_id: i32, role: ActorRole) -> ServiceResult<()> {
    if role.is_admin() || actor_id == lesson.tutor_id || actor_id == lesson.student_id {
        Ok(())
    } else {
        Err(ServiceError::Authorization(
            "You are not a participant of this lesson".to_string(),
        ))
    }
}

/// Materialize the confirmed lesson for an accepted request.
///
/// The request's scheduled instant is decomposed into date + start time and
/// the end time is the fixed 60-minute offset. `lessons.request_id` is
/// unique, so a second materialization for the same request fails with a
/// conflict regardless of interleaving.
pub async fn materialize_lesson(
    tx: &mut Transaction<'_, Postgres>,
    request: &LessonRequest,
) -> ServiceResult<Lesson> {
    let (date, start) = split_instant(request.scheduled_time);
    let end = start.add_minutes(LESSON_DURATION_MINUTES);

    let query = format!(
        "INSERT INTO lessons (request_id, tutor_id, student_id, lesson_date, start_time, end_time)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {LESSON_COLUMNS}"
    );
    sqlx::query_as::<_, Lesson>(&query)
        .bind(request.id)
        .bind(request.tutor_id)
        .bind(request.student_id)
        .bind(date.as_naive())
        .bind(start.as_naive())
        .bind(end.as_naive())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                ServiceError::Conflict(format!(
                    "A lesson already exists for request {}",
                    request.id
                ))
            }
            _ => ServiceError::Database(e),
        })
}

/// Flip the completion latch. `actor` is `None` for the sweeper, which needs
/// no standing; user calls require the lesson's tutor or an admin.
///
/// The update is a compare-and-set on `is_completed = FALSE`: when the
/// sweeper races a user completion, the last valid transition wins and the
/// loser observes a state error.
pub async fn mark_lesson_completed(
    pool: &PgPool,
    lesson_id: i32,
    actor: Option<(i32, ActorRole)>,
) -> ServiceResult<Lesson> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    if let Some((actor_id, role)) = actor {
        if !role.is_admin() && actor_id != lesson.tutor_id {
            return Err(ServiceError::Authorization(
                "Only the tutor can mark this lesson completed".to_string(),
            ));
        }
    }

    let query = format!(
        "UPDATE lessons
         SET is_completed = TRUE
         WHERE id = $1 AND is_completed = FALSE
         RETURNING {LESSON_COLUMNS}"
    );
    sqlx::query_as::<_, Lesson>(&query)
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            ServiceError::State(format!("Lesson {lesson_id} is already completed"))
        })
}

/// Overwrite a lesson's timing from a reschedule. The end time is always
/// recomputed from the fixed lesson duration; completed lessons are
/// immutable with respect to timing.
pub async fn apply_reschedule(
    tx: &mut Transaction<'_, Postgres>,
    lesson_id: i32,
    new_date: NaiveDate,
    new_start_time: NaiveTime,
) -> ServiceResult<Lesson> {
    let start = WallClockTime::from_naive(new_start_time);
    let end = start.add_minutes(LESSON_DURATION_MINUTES);

    let query = format!(
        "UPDATE lessons
         SET lesson_date = $2, start_time = $3, end_time = $4
         WHERE id = $1 AND is_completed = FALSE
         RETURNING {LESSON_COLUMNS}"
    );
    sqlx::query_as::<_, Lesson>(&query)
        .bind(lesson_id)
        .bind(new_date)
        .bind(start.as_naive())
        .bind(end.as_naive())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            ServiceError::State(format!(
                "Lesson {lesson_id} is completed and can no longer be rescheduled"
            ))
        })
}

/// Participant-facing reschedule (the lesson-action path).
pub async fn reschedule_lesson(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    role: ActorRole,
    new_date: NaiveDate,
    new_start_time: NaiveTime,
) -> ServiceResult<Lesson> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    ensure_participant(&lesson, actor_id, role)?;

    let mut tx = pool.begin().await?;
    let updated = apply_reschedule(&mut tx, lesson_id, new_date, new_start_time).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Cancel a confirmed lesson.
///
/// The lesson row has no cancelled state; cancellation re-routes into the
/// originating request, which is moved to `cancelled`. The lesson then
/// renders as cancelled through the status derivation (see DESIGN.md).
pub async fn cancel_lesson(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    role: ActorRole,
) -> ServiceResult<LessonRequest> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    ensure_participant(&lesson, actor_id, role)?;

    if lesson.is_completed {
        return Err(ServiceError::State(format!(
            "Lesson {lesson_id} is completed and can no longer be cancelled"
        )));
    }
    let Some(request_id) = lesson.request_id else {
        return Err(ServiceError::State(format!(
            "Lesson {lesson_id} has no originating request to cancel"
        )));
    };

    let updated = sqlx::query_as::<_, LessonRequest>(
        "UPDATE lesson_requests
         SET status = 'cancelled'
         WHERE id = $1 AND status = 'accepted'
         RETURNING id, student_id, tutor_id, subject_id, scheduled_time, status, created_at",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        ServiceError::State(format!("Lesson {lesson_id} is already cancelled"))
    })?;

    Ok(updated)
}

/// Rate a completed lesson as its student; re-rating updates in place.
/// The tutor's aggregate rating is recomputed in the same transaction.
pub async fn rate_lesson(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    role: ActorRole,
    payload: &RateLesson,
) -> ServiceResult<Review> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ServiceError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    if !role.is_admin() && actor_id != lesson.student_id {
        return Err(ServiceError::Authorization(
            "Only the student can rate this lesson".to_string(),
        ));
    }
    if !lesson.is_completed {
        return Err(ServiceError::State(
            "Only completed lessons can be rated".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let query = format!(
        "INSERT INTO reviews (lesson_id, tutor_id, student_id, rating, comment)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (lesson_id, student_id)
         DO UPDATE SET rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = NOW()
         RETURNING {REVIEW_COLUMNS}"
    );
    let review = sqlx::query_as::<_, Review>(&query)
        .bind(lesson_id)
        .bind(lesson.tutor_id)
        .bind(lesson.student_id)
        .bind(payload.rating)
        .bind(&payload.comment)
        .fetch_one(&mut *tx)
        .await?;

    refresh_tutor_rating(&mut tx, lesson.tutor_id).await?;

    tx.commit().await?;
    Ok(review)
}

/// True when a lesson's scheduled window has fully passed.
fn is_past_due(lesson_date: NaiveDate, end_time: NaiveTime, now: NaiveDateTime) -> bool {
    lesson_date < now.date() || (lesson_date == now.date() && end_time < now.time())
}

/// One auto-completion pass: flip every past-due confirmed lesson.
///
/// Per-item failures are logged and skipped so one bad row never blocks the
/// rest of the batch; nothing is retried.
pub async fn run_sweep(pool: &PgPool) -> ServiceResult<SweepReport> {
    let now = Utc::now().naive_utc();

    let open: Vec<(i32, NaiveDate, NaiveTime)> = sqlx::query_as(
        "SELECT id, lesson_date, end_time FROM lessons WHERE is_completed = FALSE ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let due: Vec<i32> = open
        .into_iter()
        .filter(|(_, lesson_date, end_time)| is_past_due(*lesson_date, *end_time, now))
        .map(|(id, _, _)| id)
        .collect();

    let total_scanned = due.len();
    let mut completed_ids = Vec::new();

    for lesson_id in due {
        match mark_lesson_completed(pool, lesson_id, None).await {
            Ok(_) => completed_ids.push(lesson_id),
            Err(e) => {
                tracing::warn!(lesson_id, error = %e, "Sweep skipped lesson");
            }
        }
    }

    Ok(SweepReport {
        total_scanned,
        completed_count: completed_ids.len(),
        completed_ids,
    })
}

/// Whether the lesson is survey-eligible for the requesting participant:
/// completed, and no survey recorded by them yet.
pub async fn survey_eligibility(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    role: ActorRole,
) -> ServiceResult<SurveyEligibility> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    ensure_participant(&lesson, actor_id, role)?;

    let has_survey: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM surveys WHERE lesson_id = $1 AND respondent_id = $2)",
    )
    .bind(lesson_id)
    .bind(actor_id)
    .fetch_one(pool)
    .await?;

    Ok(SurveyEligibility {
        lesson_id,
        eligible: lesson.is_completed && !has_survey,
    })
}

fn viewer_for(role: ActorRole) -> ViewerRole {
    if role.is_tutor() {
        ViewerRole::Tutor
    } else {
        ViewerRole::Student
    }
}

/// Merged view: confirmed lessons plus still-pending requests, shaped alike
/// and ordered newest first.
pub async fn list_lessons_for_user(
    pool: &PgPool,
    user_id: i32,
    role: ActorRole,
) -> ServiceResult<Vec<LessonView>> {
    let viewer = viewer_for(role);
    let side = if role.is_tutor() { "tutor_id" } else { "student_id" };

    let confirmed_query = format!("{CONFIRMED_VIEW_BASE} WHERE l.{side} = $1");
    let confirmed = sqlx::query_as::<_, ConfirmedLessonRow>(&confirmed_query)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let pending_query = format!("{PENDING_VIEW_BASE} WHERE q.status = 'pending' AND q.{side} = $1");
    let pending = sqlx::query_as::<_, PendingRequestRow>(&pending_query)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let mut views = Vec::with_capacity(confirmed.len() + pending.len());
    for row in confirmed {
        views.push(build_lesson_view(LessonSource::Confirmed(row), viewer)?);
    }
    for row in pending {
        views.push(build_lesson_view(LessonSource::Pending(row), viewer)?);
    }

    // ISO instants sort lexicographically; newest first.
    views.sort_by(|a, b| b.scheduled_for.cmp(&a.scheduled_for));
    Ok(views)
}

pub async fn get_lesson_view(
    pool: &PgPool,
    lesson_id: i32,
    actor_id: i32,
    role: ActorRole,
) -> ServiceResult<LessonView> {
    let lesson = get_lesson_by_id(pool, lesson_id).await?;
    ensure_participant(&lesson, actor_id, role)?;

    let query = format!("{CONFIRMED_VIEW_BASE} WHERE l.id = $1");
    let row = sqlx::query_as::<_, ConfirmedLessonRow>(&query)
        .bind(lesson_id)
        .fetch_one(pool)
        .await?;

    let viewer = if actor_id == lesson.tutor_id {
        ViewerRole::Tutor
    } else {
        viewer_for(role)
    };
    build_lesson_view(LessonSource::Confirmed(row), viewer)
}

#[utoipa::path(
    get,
    path = "/lessons",
    responses(
        (status = 200, description = "Merged list of confirmed lessons and pending requests", body = Vec<LessonView>),
        (status = 500, description = "Failed to retrieve lessons")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn list_lessons(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<LessonView>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    let views = list_lessons_for_user(&pool, user_id, claims.actor_role()).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Lessons retrieved",
        views,
    ))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Lesson retrieved", body = LessonView),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn get_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
) -> Result<ApiResponse<LessonView>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let view = get_lesson_view(&pool, lesson_id, actor_id, claims.actor_role()).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Lesson retrieved",
        view,
    ))
}

#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/action",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    request_body = LessonAction,
    responses(
        (status = 200, description = "Action applied", body = Lesson),
        (status = 403, description = "Caller may not perform this action"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Action invalid for the lesson's state")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn lesson_action(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
    Json(action): Json<LessonAction>,
) -> Result<ApiResponse<Lesson>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let role = claims.actor_role();

    let lesson = match action {
        LessonAction::Complete => {
            mark_lesson_completed(&pool, lesson_id, Some((actor_id, role))).await?
        }
        LessonAction::Reschedule {
            new_date,
            new_start_time,
        } => reschedule_lesson(&pool, lesson_id, actor_id, role, new_date, new_start_time).await?,
        LessonAction::Cancel => {
            cancel_lesson(&pool, lesson_id, actor_id, role).await?;
            get_lesson_by_id(&pool, lesson_id).await?
        }
    };

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Lesson action applied",
        lesson,
    ))
}

#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/rating",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    request_body = RateLesson,
    responses(
        (status = 200, description = "Rating recorded", body = Review),
        (status = 400, description = "Rating out of range"),
        (status = 403, description = "Only the student can rate"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Lesson is not completed yet")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn rate_lesson_handler(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
    Json(payload): Json<RateLesson>,
) -> Result<ApiResponse<Review>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let review = rate_lesson(&pool, lesson_id, actor_id, claims.actor_role(), &payload).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Rating recorded",
        review,
    ))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/survey-eligibility",
    params(
        ("lesson_id" = i32, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Survey eligibility", body = SurveyEligibility),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn get_survey_eligibility(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i32>,
) -> Result<ApiResponse<SurveyEligibility>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let eligibility =
        survey_eligibility(&pool, lesson_id, actor_id, claims.actor_role()).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Survey eligibility retrieved",
        eligibility,
    ))
}

#[utoipa::path(
    post,
    path = "/lessons/sweep",
    responses(
        (status = 200, description = "Sweep executed", body = SweepReport),
        (status = 403, description = "Operator role required")
    ),
    tag = "Lessons",
    security(("bearerAuth" = []))
)]
pub async fn run_sweep_handler(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<SweepReport>, ApiResponse<()>> {
    if !claims.actor_role().is_admin() {
        return Err(ServiceError::Authorization(
            "Only operators can trigger a sweep".to_string(),
        )
        .into());
    }

    let report = run_sweep(&pool).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Sweep executed",
        report,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        list_lessons,
        get_lesson,
        lesson_action,
        rate_lesson_handler,
        get_survey_eligibility,
        run_sweep_handler
    ),
    components(schemas(Lesson, LessonAction, RateLesson, Review, SweepReport, SurveyEligibility, LessonView)),
    tags(
        (name = "Lessons", description = "Endpoints for confirmed lessons, completion and rating")
    )
)]
pub struct LessonDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    #[test]
    fn past_days_are_due() {
        assert!(is_past_due(
            date("2024-03-14"),
            time("15:00:00"),
            at("2024-03-15T08:00:00")
        ));
    }

    #[test]
    fn today_is_due_only_after_end_time() {
        let now = at("2024-03-15T16:00:00");
        assert!(is_past_due(date("2024-03-15"), time("15:00:00"), now));
        assert!(!is_past_due(date("2024-03-15"), time("16:30:00"), now));
    }

    #[test]
    fn future_days_are_never_due() {
        assert!(!is_past_due(
            date("2024-03-16"),
            time("08:00:00"),
            at("2024-03-15T23:59:59")
        ));
    }

    #[test]
    fn lesson_still_in_progress_is_not_due() {
        // End time exactly equal to now must not complete yet.
        let now = at("2024-03-15T15:00:00");
        assert!(!is_past_due(date("2024-03-15"), time("15:00:00"), now));
    }
}
