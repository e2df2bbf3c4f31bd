// src/db/models/lesson.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A confirmed, scheduled session. Created exactly once per accepted request
/// (`request_id` is unique), mutated only by reschedule and completion,
/// never deleted. `is_completed` is a one-way latch.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Lesson {
    pub id: i32,
    pub request_id: Option<i32>,
    pub tutor_id: i32,
    pub student_id: i32,
    pub lesson_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_completed: bool,
    pub created_at: Option<NaiveDateTime>,
}

/// The closed set of actions on a confirmed lesson.
///
/// Cancel is re-routed into the originating request's status; the lesson row
/// itself has no cancelled state (see DESIGN.md).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LessonAction {
    Complete,
    Reschedule {
        new_date: NaiveDate,
        new_start_time: NaiveTime,
    },
    Cancel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateLesson {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Aggregate result of one auto-completion sweep.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepReport {
    pub total_scanned: usize,
    pub completed_count: usize,
    pub completed_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SurveyEligibility {
    pub lesson_id: i32,
    pub eligible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_actions_deserialize_from_tagged_payloads() {
        let complete: LessonAction = serde_json::from_str(r#"{"action":"complete"}"#).unwrap();
        assert!(matches!(complete, LessonAction::Complete));

        let reschedule: LessonAction = serde_json::from_str(
            r#"{"action":"reschedule","new_date":"2024-03-20","new_start_time":"09:30:00"}"#,
        )
        .unwrap();
        match reschedule {
            LessonAction::Reschedule {
                new_date,
                new_start_time,
            } => {
                assert_eq!(new_date.to_string(), "2024-03-20");
                assert_eq!(new_start_time.to_string(), "09:30:00");
            }
            other => panic!("expected reschedule, got {other:?}"),
        }

        assert!(serde_json::from_str::<LessonAction>(r#"{"action":"delete"}"#).is_err());
    }
}
