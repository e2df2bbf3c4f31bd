// src/db/models/schedule.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Tutor-declared availability state of a slot. Lesson occupancy is not a
/// declared state; it is overlaid by the schedule view generator.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "slot_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Blocked,
    Available,
}

/// A tutor schedule row, upsert-keyed on `(tutor_id, slot_date, start_time)`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TutorScheduleSlot {
    pub id: i32,
    pub tutor_id: i32,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub reason: Option<String>,
    pub is_recurring: bool,
    pub recurring_pattern: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewScheduleSlot {
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub reason: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurring_pattern: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlockSlotsRequest {
    pub slots: Vec<NewScheduleSlot>,
}

#[derive(Debug, Serialize, Deserialize, Default, IntoParams, ToSchema)]
pub struct ScheduleQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// One entry of the merged schedule view: declared blocks overlaid with
/// lesson occupancy. `status` is `booked`, `blocked` or `available`; booked
/// entries carry the occupying lesson id and have no schedule row id.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScheduleSlotView {
    pub slot_id: Option<i32>,
    pub tutor_id: i32,
    pub slot_date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub reason: Option<String>,
    pub lesson_id: Option<i32>,
}
