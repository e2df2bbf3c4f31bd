// src/db/models/lesson_view.rs
//
// Inputs and output of the lesson presentation formatter. The two row
// shapes form a closed tagged union; the formatter never sniffs shapes at
// runtime.
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::models::lesson_request::RequestStatus;
use crate::db::models::review::ReviewSummary;

/// A confirmed lesson joined with its originating request, participant
/// names, subject and (when present) the student's review.
#[derive(Debug, FromRow)]
pub struct ConfirmedLessonRow {
    pub id: i32,
    pub request_id: Option<i32>,
    pub tutor_id: i32,
    pub student_id: i32,
    pub lesson_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_completed: bool,
    pub request_status: Option<RequestStatus>,
    pub subject_name: Option<String>,
    pub tutor_name: String,
    pub student_name: String,
    pub price_per_hour: Option<BigDecimal>,
    pub review_rating: Option<i32>,
    pub review_comment: Option<String>,
    pub review_created_at: Option<NaiveDateTime>,
}

/// A still-pending request, not yet materialized into a lesson.
#[derive(Debug, FromRow)]
pub struct PendingRequestRow {
    pub id: i32,
    pub student_id: i32,
    pub tutor_id: i32,
    pub scheduled_time: NaiveDateTime,
    pub status: RequestStatus,
    pub subject_name: Option<String>,
    pub tutor_name: String,
    pub student_name: String,
    pub price_per_hour: Option<BigDecimal>,
}

/// Tagged union consumed by the formatter.
#[derive(Debug)]
pub enum LessonSource {
    Confirmed(ConfirmedLessonRow),
    Pending(PendingRequestRow),
}

/// Which side of the lesson the viewer is on; decides the counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Student,
    Tutor,
}

/// The other party of a lesson as the viewer sees them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct CounterpartView {
    pub user_id: i32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)] // ✅ OpenAPI-friendly schema for NUMERIC
    pub price_per_hour: Option<BigDecimal>,
}

/// Client-facing shape shared by confirmed lessons and pending requests.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LessonView {
    /// Lesson id, or the request id for a not-yet-materialized request.
    pub lesson_id: i32,
    pub request_id: Option<i32>,
    pub tutor_id: i32,
    pub student_id: i32,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: i64,
    pub scheduled_for: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub counterpart: CounterpartView,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewSummary>,
}
