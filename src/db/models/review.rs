// src/db/models/review.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A student's rating of a completed lesson. One row per
/// `(lesson_id, student_id)`; re-rating updates in place.
#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct Review {
    pub id: i32,
    pub lesson_id: i32,
    pub tutor_id: i32,
    pub student_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Review fields embedded in a lesson view once the lesson is completed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ReviewSummary {
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}
