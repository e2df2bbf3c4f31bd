// src/db/models/lesson_request.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a lesson request. `Pending` is the only non-terminal state;
/// accepted requests materialize a lesson, the other two end the negotiation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lesson_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }
}

/// The closed set of decisions on a pending request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Accept,
    Reject,
    Cancel,
}

impl RequestAction {
    /// Terminal status a pending request transitions into for this action.
    pub fn target_status(self) -> RequestStatus {
        match self {
            RequestAction::Accept => RequestStatus::Accepted,
            RequestAction::Reject => RequestStatus::Rejected,
            RequestAction::Cancel => RequestStatus::Cancelled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LessonRequest {
    pub id: i32,
    pub student_id: i32,
    pub tutor_id: i32,
    pub subject_id: i32,
    pub scheduled_time: NaiveDateTime,
    pub status: RequestStatus,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewLessonRequest {
    pub tutor_id: i32,
    pub subject_id: i32,
    pub scheduled_time: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestDecision {
    pub action: RequestAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn actions_map_to_terminal_statuses() {
        assert_eq!(RequestAction::Accept.target_status(), RequestStatus::Accepted);
        assert_eq!(RequestAction::Reject.target_status(), RequestStatus::Rejected);
        assert_eq!(RequestAction::Cancel.target_status(), RequestStatus::Cancelled);
        assert!(RequestAction::Accept.target_status().is_terminal());
    }

    #[test]
    fn actions_deserialize_from_snake_case() {
        let action: RequestAction = serde_json::from_str("\"accept\"").unwrap();
        assert_eq!(action, RequestAction::Accept);
        assert!(serde_json::from_str::<RequestAction>("\"approve\"").is_err());
    }
}
