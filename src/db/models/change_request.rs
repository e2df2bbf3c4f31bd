// src/db/models/change_request.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "change_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A proposal to move an existing lesson to a new date/time.
///
/// At most one pending row exists per lesson; the proposal history is
/// append-only apart from explicit cancellation by the requester while
/// still pending.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LessonChangeRequest {
    pub id: i32,
    pub lesson_id: i32,
    pub requester_id: i32,
    pub proposed_date: NaiveDate,
    pub proposed_time: NaiveTime,
    pub comment: Option<String>,
    pub status: ChangeRequestStatus,
    pub reason: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewChangeRequest {
    pub proposed_date: NaiveDate,
    pub proposed_time: NaiveTime,
    pub comment: Option<String>,
}

/// The closed set of resolutions on a pending change request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestResolution {
    Accept,
    Reject,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolveChangeRequest {
    pub action: ChangeRequestResolution,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_deserializes_from_snake_case() {
        let res: ResolveChangeRequest =
            serde_json::from_str(r#"{"action":"reject","reason":"clash"}"#).unwrap();
        assert_eq!(res.action, ChangeRequestResolution::Reject);
        assert_eq!(res.reason.as_deref(), Some("clash"));
        assert!(serde_json::from_str::<ChangeRequestResolution>("\"cancel\"").is_err());
    }
}
