//! Lesson presentation formatter.
//!
//! Converts raw joined lesson/request rows into the client-facing
//! [`LessonView`], deriving duration, the ISO `scheduled_for` instant, the
//! status label and the counterpart identity. Pure; all date/time handling
//! goes through `utils::time` so normalization happens in exactly one place.

use crate::db::models::lesson_request::RequestStatus;
use crate::db::models::lesson_view::{
    ConfirmedLessonRow, CounterpartView, LessonSource, LessonView, PendingRequestRow, ViewerRole,
};
use crate::db::models::review::ReviewSummary;
use crate::utils::error::ServiceError;
use crate::utils::time::{
    scheduled_for, split_instant, CalendarDate, WallClockTime, LESSON_DURATION_MINUTES,
};

/// Fixed reason shown when the tutor declined the originating request.
const REASON_REQUEST_REJECTED: &str = "The tutor declined this lesson request.";
/// Fixed reason shown when a participant withdrew the originating request.
const REASON_REQUEST_CANCELLED: &str = "This lesson request was cancelled.";

/// Derive the status label and optional reason for a lesson view.
///
/// Precedence: a pending request wins, then request-level terminal states,
/// and only then the completion flag. Completion is deliberately consulted
/// last so a cancelled lesson never reads as completed.
fn derive_status(
    request_status: Option<RequestStatus>,
    is_completed: bool,
) -> (&'static str, Option<&'static str>) {
    match request_status {
        Some(RequestStatus::Pending) => ("pending", None),
        Some(RequestStatus::Rejected) => ("cancelled", Some(REASON_REQUEST_REJECTED)),
        Some(RequestStatus::Cancelled) => ("cancelled", Some(REASON_REQUEST_CANCELLED)),
        _ if is_completed => ("completed", None),
        _ => ("scheduled", None),
    }
}

fn counterpart_for(viewer: ViewerRole, row: &ConfirmedLessonRow) -> CounterpartView {
    match viewer {
        ViewerRole::Student => CounterpartView {
            user_id: row.tutor_id,
            name: row.tutor_name.clone(),
            price_per_hour: row.price_per_hour.clone(),
        },
        ViewerRole::Tutor => CounterpartView {
            user_id: row.student_id,
            name: row.student_name.clone(),
            price_per_hour: None,
        },
    }
}

/// Build the client-facing view for a confirmed lesson or pending request.
pub fn build_lesson_view(
    source: LessonSource,
    viewer: ViewerRole,
) -> Result<LessonView, ServiceError> {
    match source {
        LessonSource::Confirmed(row) => build_confirmed_view(row, viewer),
        LessonSource::Pending(row) => build_pending_view(row, viewer),
    }
}

fn build_confirmed_view(
    row: ConfirmedLessonRow,
    viewer: ViewerRole,
) -> Result<LessonView, ServiceError> {
    let date = CalendarDate::from_naive(row.lesson_date);
    let start = WallClockTime::from_naive(row.start_time);
    let end = WallClockTime::from_naive(row.end_time);

    let (status, status_reason) = derive_status(row.request_status, row.is_completed);

    // The review only surfaces on completed lessons; absence is fine.
    let review = match (status, row.review_rating) {
        ("completed", Some(rating)) => Some(ReviewSummary {
            rating,
            comment: row.review_comment.clone(),
            created_at: row.review_created_at,
        }),
        _ => None,
    };

    Ok(LessonView {
        lesson_id: row.id,
        request_id: row.request_id,
        tutor_id: row.tutor_id,
        student_id: row.student_id,
        date: date.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        duration_minutes: start.minutes_until(end),
        scheduled_for: scheduled_for(date, start),
        status: status.to_string(),
        status_reason: status_reason.map(str::to_string),
        subject: row.subject_name.clone(),
        counterpart: counterpart_for(viewer, &row),
        is_completed: row.is_completed,
        review,
    })
}

/// Synthetic view for a request with no materialized lesson yet: the request
/// id stands in for the lesson id, completion is forced false and the
/// 60-minute window is derived exactly as materialization would.
fn build_pending_view(
    row: PendingRequestRow,
    viewer: ViewerRole,
) -> Result<LessonView, ServiceError> {
    let (date, start) = split_instant(row.scheduled_time);
    let end = start.add_minutes(LESSON_DURATION_MINUTES);

    let (status, status_reason) = derive_status(Some(row.status), false);

    let counterpart = match viewer {
        ViewerRole::Student => CounterpartView {
            user_id: row.tutor_id,
            name: row.tutor_name.clone(),
            price_per_hour: row.price_per_hour.clone(),
        },
        ViewerRole::Tutor => CounterpartView {
            user_id: row.student_id,
            name: row.student_name.clone(),
            price_per_hour: None,
        },
    };

    Ok(LessonView {
        lesson_id: row.id,
        request_id: Some(row.id),
        tutor_id: row.tutor_id,
        student_id: row.student_id,
        date: date.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        duration_minutes: start.minutes_until(end),
        scheduled_for: scheduled_for(date, start),
        status: status.to_string(),
        status_reason: status_reason.map(str::to_string),
        subject: row.subject_name.clone(),
        counterpart,
        is_completed: false,
        review: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn confirmed_row() -> ConfirmedLessonRow {
        ConfirmedLessonRow {
            id: 11,
            request_id: Some(42),
            tutor_id: 2,
            student_id: 7,
            lesson_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            start_time: NaiveTime::from_hms_micro_opt(14, 0, 0, 123_456).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            is_completed: false,
            request_status: Some(RequestStatus::Accepted),
            subject_name: Some("Algebra".to_string()),
            tutor_name: "tutor_t".to_string(),
            student_name: "student_s".to_string(),
            price_per_hour: None,
            review_rating: None,
            review_comment: None,
            review_created_at: None,
        }
    }

    fn pending_row() -> PendingRequestRow {
        PendingRequestRow {
            id: 42,
            student_id: 7,
            tutor_id: 2,
            scheduled_time: NaiveDateTime::parse_from_str(
                "2024-03-15T14:00:00",
                "%Y-%m-%dT%H:%M:%S",
            )
            .unwrap(),
            status: RequestStatus::Pending,
            subject_name: Some("Algebra".to_string()),
            tutor_name: "tutor_t".to_string(),
            student_name: "student_s".to_string(),
            price_per_hour: None,
        }
    }

    #[test]
    fn confirmed_view_normalizes_times_and_derives_duration() {
        let view =
            build_lesson_view(LessonSource::Confirmed(confirmed_row()), ViewerRole::Student)
                .unwrap();
        assert_eq!(view.date, "2024-03-15");
        assert_eq!(view.start_time, "14:00:00");
        assert_eq!(view.end_time, "15:00:00");
        assert_eq!(view.duration_minutes, 60);
        assert_eq!(view.scheduled_for, "2024-03-15T14:00:00.000Z");
        assert_eq!(view.status, "scheduled");
        assert!(view.status_reason.is_none());
    }

    #[test]
    fn status_precedence_pending_beats_everything() {
        let mut row = confirmed_row();
        row.request_status = Some(RequestStatus::Pending);
        row.is_completed = true;
        let view = build_lesson_view(LessonSource::Confirmed(row), ViewerRole::Student).unwrap();
        assert_eq!(view.status, "pending");
    }

    #[test]
    fn status_precedence_rejection_beats_completion() {
        let mut row = confirmed_row();
        row.request_status = Some(RequestStatus::Rejected);
        row.is_completed = true;
        row.review_rating = Some(5);
        let view = build_lesson_view(LessonSource::Confirmed(row), ViewerRole::Student).unwrap();
        assert_eq!(view.status, "cancelled");
        assert_eq!(
            view.status_reason.as_deref(),
            Some("The tutor declined this lesson request.")
        );
        // A cancelled lesson never carries a review, even if a row existed.
        assert!(view.review.is_none());
    }

    #[test]
    fn completed_lesson_attaches_review_when_present() {
        let mut row = confirmed_row();
        row.is_completed = true;
        row.review_rating = Some(4);
        row.review_comment = Some("solid".to_string());
        let view = build_lesson_view(LessonSource::Confirmed(row), ViewerRole::Student).unwrap();
        assert_eq!(view.status, "completed");
        let review = view.review.expect("review should be attached");
        assert_eq!(review.rating, 4);
        assert_eq!(review.comment.as_deref(), Some("solid"));
    }

    #[test]
    fn completed_lesson_without_review_is_not_an_error() {
        let mut row = confirmed_row();
        row.is_completed = true;
        let view = build_lesson_view(LessonSource::Confirmed(row), ViewerRole::Student).unwrap();
        assert_eq!(view.status, "completed");
        assert!(view.review.is_none());
    }

    #[test]
    fn directly_created_lesson_with_no_request_is_scheduled() {
        let mut row = confirmed_row();
        row.request_id = None;
        row.request_status = None;
        let view = build_lesson_view(LessonSource::Confirmed(row), ViewerRole::Student).unwrap();
        assert_eq!(view.status, "scheduled");
    }

    #[test]
    fn pending_request_builds_synthetic_sixty_minute_window() {
        let view =
            build_lesson_view(LessonSource::Pending(pending_row()), ViewerRole::Student).unwrap();
        assert_eq!(view.lesson_id, 42);
        assert_eq!(view.request_id, Some(42));
        assert_eq!(view.status, "pending");
        assert!(!view.is_completed);
        assert_eq!(view.start_time, "14:00:00");
        assert_eq!(view.end_time, "15:00:00");
        assert_eq!(view.duration_minutes, 60);
        assert_eq!(view.scheduled_for, "2024-03-15T14:00:00.000Z");
    }

    #[test]
    fn counterpart_depends_on_viewer_side() {
        let as_student =
            build_lesson_view(LessonSource::Confirmed(confirmed_row()), ViewerRole::Student)
                .unwrap();
        assert_eq!(as_student.counterpart.user_id, 2);
        assert_eq!(as_student.counterpart.name, "tutor_t");

        let as_tutor =
            build_lesson_view(LessonSource::Confirmed(confirmed_row()), ViewerRole::Tutor)
                .unwrap();
        assert_eq!(as_tutor.counterpart.user_id, 7);
        assert_eq!(as_tutor.counterpart.name, "student_s");
        assert!(as_tutor.counterpart.price_per_hour.is_none());
    }
}
