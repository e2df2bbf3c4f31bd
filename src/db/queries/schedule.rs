// src/db/queries/schedule.rs
//
// Availability Store: tutor-declared blocked/available slots, plus the
// merged schedule view. A slot occupied by a non-cancelled lesson always
// renders as booked, superseding any declared row at the same
// (date, start_time) key.

use std::collections::BTreeMap;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::schedule::{
    BlockSlotsRequest, NewScheduleSlot, ScheduleQuery, ScheduleSlotView, SlotStatus,
    TutorScheduleSlot,
};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::{ServiceError, ServiceResult};
use crate::utils::time::{CalendarDate, WallClockTime};

const SLOT_COLUMNS: &str = "id, tutor_id, slot_date, start_time, end_time, status, reason, \
    is_recurring, recurring_pattern";

/// A lesson occupying a slot on the tutor's calendar.
#[derive(Debug, sqlx::FromRow)]
pub struct OccupiedSlot {
    pub lesson_id: i32,
    pub lesson_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Upsert the tutor's declared slots; a colliding insert overwrites the
/// declared state instead of duplicating the row.
pub async fn block_slots(
    pool: &PgPool,
    tutor_id: i32,
    slots: &[NewScheduleSlot],
) -> ServiceResult<Vec<TutorScheduleSlot>> {
    for slot in slots {
        if slot.end_time <= slot.start_time {
            return Err(ServiceError::Validation(format!(
                "Slot on {} must end after it starts",
                slot.slot_date
            )));
        }
    }

    let query = format!(
        "INSERT INTO tutor_schedule
             (tutor_id, slot_date, start_time, end_time, status, reason, is_recurring, recurring_pattern)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (tutor_id, slot_date, start_time)
         DO UPDATE SET end_time = EXCLUDED.end_time,
                       status = EXCLUDED.status,
                       reason = EXCLUDED.reason,
                       is_recurring = EXCLUDED.is_recurring,
                       recurring_pattern = EXCLUDED.recurring_pattern
         RETURNING {SLOT_COLUMNS}"
    );

    let mut tx = pool.begin().await?;
    let mut saved = Vec::with_capacity(slots.len());
    for slot in slots {
        let row = sqlx::query_as::<_, TutorScheduleSlot>(&query)
            .bind(tutor_id)
            .bind(slot.slot_date)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.status)
            .bind(&slot.reason)
            .bind(slot.is_recurring)
            .bind(&slot.recurring_pattern)
            .fetch_one(&mut *tx)
            .await?;
        saved.push(row);
    }
    tx.commit().await?;

    Ok(saved)
}

/// Merge declared slots with lesson occupancy into the schedule view.
///
/// Lesson occupancy takes priority: a declared row at an occupied
/// (date, start_time) key is replaced by the booked entry, never shown as
/// available or blocked.
fn merge_schedule(
    tutor_id: i32,
    declared: Vec<TutorScheduleSlot>,
    occupied: Vec<OccupiedSlot>,
) -> Vec<ScheduleSlotView> {
    let mut merged: BTreeMap<(NaiveDate, NaiveTime), ScheduleSlotView> = BTreeMap::new();

    for slot in declared {
        let status = match slot.status {
            SlotStatus::Blocked => "blocked",
            SlotStatus::Available => "available",
        };
        merged.insert(
            (slot.slot_date, slot.start_time),
            ScheduleSlotView {
                slot_id: Some(slot.id),
                tutor_id,
                slot_date: CalendarDate::from_naive(slot.slot_date).to_string(),
                start_time: WallClockTime::from_naive(slot.start_time).to_string(),
                end_time: WallClockTime::from_naive(slot.end_time).to_string(),
                status: status.to_string(),
                reason: slot.reason,
                lesson_id: None,
            },
        );
    }

    for lesson in occupied {
        merged.insert(
            (lesson.lesson_date, lesson.start_time),
            ScheduleSlotView {
                slot_id: None,
                tutor_id,
                slot_date: CalendarDate::from_naive(lesson.lesson_date).to_string(),
                start_time: WallClockTime::from_naive(lesson.start_time).to_string(),
                end_time: WallClockTime::from_naive(lesson.end_time).to_string(),
                status: "booked".to_string(),
                reason: None,
                lesson_id: Some(lesson.lesson_id),
            },
        );
    }

    merged.into_values().collect()
}

/// The merged schedule view for a tutor over an optional date range.
pub async fn get_schedule_view(
    pool: &PgPool,
    tutor_id: i32,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ServiceResult<Vec<ScheduleSlotView>> {
    let declared_query = format!(
        "SELECT {SLOT_COLUMNS} FROM tutor_schedule
         WHERE tutor_id = $1
           AND ($2::date IS NULL OR slot_date >= $2)
           AND ($3::date IS NULL OR slot_date <= $3)"
    );
    let declared = sqlx::query_as::<_, TutorScheduleSlot>(&declared_query)
        .bind(tutor_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    // Cancelled lessons release their slot; their request is terminal.
    let occupied = sqlx::query_as::<_, OccupiedSlot>(
        "SELECT l.id AS lesson_id, l.lesson_date, l.start_time, l.end_time
         FROM lessons l
         LEFT JOIN lesson_requests r ON r.id = l.request_id
         WHERE l.tutor_id = $1
           AND (r.status IS NULL OR r.status NOT IN ('rejected', 'cancelled'))
           AND ($2::date IS NULL OR l.lesson_date >= $2)
           AND ($3::date IS NULL OR l.lesson_date <= $3)",
    )
    .bind(tutor_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(merge_schedule(tutor_id, declared, occupied))
}

#[utoipa::path(
    post,
    path = "/schedule/slots",
    request_body = BlockSlotsRequest,
    responses(
        (status = 201, description = "Slots saved", body = Vec<TutorScheduleSlot>),
        (status = 400, description = "Slot window invalid"),
        (status = 403, description = "Only tutors can declare slots")
    ),
    tag = "Schedule",
    security(("bearerAuth" = []))
)]
pub async fn block_time_slots(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BlockSlotsRequest>,
) -> Result<ApiResponse<Vec<TutorScheduleSlot>>, ApiResponse<()>> {
    let tutor_id = claims.user_id()?;
    if !claims.actor_role().is_tutor() {
        return Err(ServiceError::Authorization(
            "Only tutors can declare schedule slots".to_string(),
        )
        .into());
    }

    let saved = block_slots(&pool, tutor_id, &payload.slots).await?;
    Ok(ApiResponse::created("Schedule slots saved", saved))
}

#[utoipa::path(
    get,
    path = "/schedule/{tutor_id}",
    params(
        ("tutor_id" = i32, Path, description = "Tutor user ID"),
        ScheduleQuery
    ),
    responses(
        (status = 200, description = "Merged schedule view", body = Vec<ScheduleSlotView>),
        (status = 500, description = "Failed to retrieve schedule")
    ),
    tag = "Schedule",
    security(("bearerAuth" = []))
)]
pub async fn get_schedule(
    State(pool): State<PgPool>,
    Path(tutor_id): Path<i32>,
    Query(range): Query<ScheduleQuery>,
) -> Result<ApiResponse<Vec<ScheduleSlotView>>, ApiResponse<()>> {
    let view = get_schedule_view(&pool, tutor_id, range.from, range.to).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Schedule retrieved",
        view,
    ))
}

#[utoipa::path(
    delete,
    path = "/schedule/slots/{slot_id}",
    params(
        ("slot_id" = i32, Path, description = "Schedule slot ID")
    ),
    responses(
        (status = 200, description = "Slot deleted"),
        (status = 404, description = "Slot not found")
    ),
    tag = "Schedule",
    security(("bearerAuth" = []))
)]
pub async fn delete_time_slot(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slot_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let actor_id = claims.user_id()?;
    let role = claims.actor_role();

    let query = if role.is_admin() {
        "DELETE FROM tutor_schedule WHERE id = $1 RETURNING id"
    } else {
        "DELETE FROM tutor_schedule WHERE id = $1 AND tutor_id = $2 RETURNING id"
    };
    let mut q = sqlx::query_scalar::<_, i32>(query).bind(slot_id);
    if !role.is_admin() {
        q = q.bind(actor_id);
    }
    let deleted = q.fetch_optional(&pool).await.map_err(ServiceError::from)?;

    if deleted.is_none() {
        return Err(ServiceError::NotFound(format!("Slot {slot_id} not found")).into());
    }
    Ok(ApiResponse::success(StatusCode::OK, "Slot deleted", ()))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(block_time_slots, get_schedule, delete_time_slot),
    components(schemas(TutorScheduleSlot, NewScheduleSlot, BlockSlotsRequest, ScheduleSlotView, SlotStatus)),
    tags(
        (name = "Schedule", description = "Tutor availability and the merged schedule view")
    )
)]
pub struct ScheduleDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    fn declared(id: i32, d: &str, start: &str, status: SlotStatus) -> TutorScheduleSlot {
        TutorScheduleSlot {
            id,
            tutor_id: 2,
            slot_date: date(d),
            start_time: time(start),
            end_time: time("23:00:00"),
            status,
            reason: Some("personal".to_string()),
            is_recurring: false,
            recurring_pattern: None,
        }
    }

    fn occupied(lesson_id: i32, d: &str, start: &str, end: &str) -> OccupiedSlot {
        OccupiedSlot {
            lesson_id,
            lesson_date: date(d),
            start_time: time(start),
            end_time: time(end),
        }
    }

    #[test]
    fn lesson_occupancy_supersedes_declared_slot() {
        let views = merge_schedule(
            2,
            vec![declared(1, "2024-03-15", "14:00:00", SlotStatus::Available)],
            vec![occupied(9, "2024-03-15", "14:00:00", "15:00:00")],
        );
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].status, "booked");
        assert_eq!(views[0].lesson_id, Some(9));
        assert!(views[0].slot_id.is_none());
        assert!(views[0].reason.is_none());
    }

    #[test]
    fn blocked_slot_without_lesson_stays_blocked() {
        let views = merge_schedule(
            2,
            vec![declared(1, "2024-03-15", "10:00:00", SlotStatus::Blocked)],
            vec![],
        );
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].status, "blocked");
        assert_eq!(views[0].slot_id, Some(1));
    }

    #[test]
    fn merged_view_is_ordered_by_date_then_start() {
        let views = merge_schedule(
            2,
            vec![
                declared(1, "2024-03-16", "09:00:00", SlotStatus::Blocked),
                declared(2, "2024-03-15", "18:00:00", SlotStatus::Available),
            ],
            vec![occupied(9, "2024-03-15", "14:00:00", "15:00:00")],
        );
        let keys: Vec<(&str, &str)> = views
            .iter()
            .map(|v| (v.slot_date.as_str(), v.start_time.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-03-15", "14:00:00"),
                ("2024-03-15", "18:00:00"),
                ("2024-03-16", "09:00:00"),
            ]
        );
    }

    #[test]
    fn lesson_on_an_undeclared_slot_still_shows_booked() {
        let views = merge_schedule(2, vec![], vec![occupied(9, "2024-03-20", "08:00:00", "09:00:00")]);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].status, "booked");
        assert_eq!(views[0].end_time, "09:00:00");
    }
}
