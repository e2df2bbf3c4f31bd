use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid target provided: {0}")]
    InvalidTarget(String),

    #[error("Failed to serialize notification data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Notification builder for creating system notifications
pub struct NotificationBuilder {
    title: String,
    body: Option<String>,
    notification_type: String,
    target_user_ids: Vec<i32>,
    action_type: Option<String>,
    action_data: Option<Value>,
    dismissible: bool,
    expires_in_days: Option<i64>,
}

impl NotificationBuilder {
    /// Create a new notification builder with required fields
    pub fn new(title: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            notification_type: notification_type.into(),
            target_user_ids: Vec::new(),
            action_type: None,
            action_data: None,
            dismissible: true,
            expires_in_days: Some(14), // Default to 14 days
        }
    }

    /// Set notification body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a target user to the notification
    pub fn target_user(mut self, user_id: i32) -> Self {
        self.target_user_ids.push(user_id);
        self
    }

    /// Add multiple target users to the notification
    pub fn target_users(mut self, user_ids: Vec<i32>) -> Self {
        self.target_user_ids.extend(user_ids);
        self
    }

    /// Set the action type and data for when notification is clicked
    pub fn action(mut self, action_type: impl Into<String>, action_data: Value) -> Self {
        self.action_type = Some(action_type.into());
        self.action_data = Some(action_data);
        self
    }

    /// Set whether the notification can be dismissed
    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    /// Set expiration time in days (None means no expiration)
    pub fn expires_in_days(mut self, days: Option<i64>) -> Self {
        self.expires_in_days = days;
        self
    }

    fn validate(&self) -> NotificationResult<()> {
        if self.target_user_ids.is_empty() {
            return Err(NotificationError::InvalidTarget(
                "At least one target is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Build and send the notification
    pub async fn send(self, pool: &PgPool) -> NotificationResult<i32> {
        self.validate()?;

        // Calculate expiration date if provided
        let expires_at = self
            .expires_in_days
            .map(|days| (Utc::now() + chrono::Duration::days(days)).naive_utc());

        // Start a transaction
        let mut tx = pool.begin().await?;

        // Insert notification
        let notification_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (
                title, body, type, action_type, action_data,
                global, dismissible, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&self.title)
        .bind(&self.body)
        .bind(&self.notification_type)
        .bind(&self.action_type)
        .bind(&self.action_data)
        .bind(false) // Never global for system notifications
        .bind(self.dismissible)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        // Insert targets
        for user_id in &self.target_user_ids {
            sqlx::query(
                "INSERT INTO notification_targets (notification_id, user_id) VALUES ($1, $2)",
            )
            .bind(notification_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        // Commit transaction
        tx.commit().await?;

        Ok(notification_id)
    }
}

/// Common notification types for system usage
pub mod notification_types {
    pub const LESSON_REQUEST_CREATED: &str = "lesson_request_created";
    pub const LESSON_REQUEST_ACCEPTED: &str = "lesson_request_accepted";
    pub const LESSON_REQUEST_REJECTED: &str = "lesson_request_rejected";
    pub const LESSON_REQUEST_CANCELLED: &str = "lesson_request_cancelled";
    pub const CHANGE_REQUEST_PROPOSED: &str = "change_request_proposed";
    pub const CHANGE_REQUEST_RESOLVED: &str = "change_request_resolved";
}

/// Notify a tutor that a student has asked to book a lesson
pub async fn notify_lesson_request_created(
    pool: &PgPool,
    tutor_id: i32,
    student_name: &str,
    request_id: i32,
    scheduled_for: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Lesson Request: {student_name}"),
        notification_types::LESSON_REQUEST_CREATED,
    )
    .body(format!(
        "{student_name} has requested a lesson on {scheduled_for}"
    ))
    .target_user(tutor_id)
    .action(
        "view_request",
        json!({
            "request_id": request_id,
        }),
    )
    .send(pool)
    .await
}

/// Notify the student (or the other participant) of a request decision
pub async fn notify_request_decided(
    pool: &PgPool,
    target_user_id: i32,
    decided_by_name: &str,
    request_id: i32,
    notification_type: &str,
    outcome: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Lesson Request {outcome}"),
        notification_type,
    )
    .body(format!(
        "{decided_by_name} has {outcome} the lesson request"
    ))
    .target_user(target_user_id)
    .action(
        "view_request",
        json!({
            "request_id": request_id,
        }),
    )
    .send(pool)
    .await
}

/// Notify the other participant that a reschedule was proposed
pub async fn notify_change_proposed(
    pool: &PgPool,
    target_user_id: i32,
    proposed_by_name: &str,
    lesson_id: i32,
    change_request_id: i32,
    proposed_for: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Reschedule Proposed: {proposed_by_name}"),
        notification_types::CHANGE_REQUEST_PROPOSED,
    )
    .body(format!(
        "{proposed_by_name} has proposed moving the lesson to {proposed_for}"
    ))
    .target_user(target_user_id)
    .action(
        "view_change_request",
        json!({
            "lesson_id": lesson_id,
            "change_request_id": change_request_id,
        }),
    )
    .send(pool)
    .await
}

/// Notify the requester that their reschedule proposal was resolved
pub async fn notify_change_resolved(
    pool: &PgPool,
    requester_id: i32,
    resolved_by_name: &str,
    lesson_id: i32,
    change_request_id: i32,
    outcome: &str,
) -> NotificationResult<i32> {
    NotificationBuilder::new(
        format!("Reschedule {outcome}"),
        notification_types::CHANGE_REQUEST_RESOLVED,
    )
    .body(format!(
        "{resolved_by_name} has {outcome} your reschedule proposal"
    ))
    .target_user(requester_id)
    .action(
        "view_lesson",
        json!({
            "lesson_id": lesson_id,
            "change_request_id": change_request_id,
        }),
    )
    .send(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_at_least_one_target() {
        let builder = NotificationBuilder::new("title", notification_types::LESSON_REQUEST_CREATED);
        let err = builder.validate().unwrap_err();
        assert!(matches!(err, NotificationError::InvalidTarget(_)));
    }

    #[test]
    fn builder_accumulates_targets() {
        let builder = NotificationBuilder::new("title", "type")
            .target_user(1)
            .target_users(vec![2, 3]);
        assert!(builder.validate().is_ok());
        assert_eq!(builder.target_user_ids, vec![1, 2, 3]);
    }
}
