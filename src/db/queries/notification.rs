// src/db/queries/notification.rs
//
// Consumer surface of the notification sink: list, count and dismiss.
// Records are produced by the lifecycle trigger points through
// `utils::notification`.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::notification::{
    Notification, NotificationCountResponse, NotificationFilter, NotificationWithState,
};
use crate::utils::api_response::ApiResponse;
use crate::utils::error::ServiceError;

const NOTIFICATION_COLUMNS: &str = "n.id, n.title, n.body, n.type AS type_field, \
    n.action_type, n.action_data, n.global, n.dismissible, n.created_at, n.expires_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    #[sqlx(flatten)]
    notification: Notification,
    dismissed: bool,
}

/// Get notifications relevant to the current user
#[utoipa::path(
    get,
    path = "/notifications",
    params(
        NotificationFilter
    ),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = Vec<NotificationWithState>),
        (status = 500, description = "Failed to retrieve notifications")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> Result<ApiResponse<Vec<NotificationWithState>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let mut query = format!(
        "SELECT DISTINCT {NOTIFICATION_COLUMNS},
                EXISTS(
                    SELECT 1 FROM notification_dismissals d
                    WHERE d.notification_id = n.id AND d.user_id = $1
                ) AS dismissed
         FROM notifications n
         LEFT JOIN notification_targets nt ON nt.notification_id = n.id
         WHERE (n.global = TRUE OR nt.user_id = $1)"
    );

    if !filter.include_dismissed.unwrap_or(false) {
        query.push_str(
            " AND n.id NOT IN (
                SELECT notification_id FROM notification_dismissals WHERE user_id = $1
            )",
        );
    }
    if !filter.include_expired.unwrap_or(false) {
        query.push_str(" AND (n.expires_at IS NULL OR n.expires_at > NOW())");
    }
    if filter.type_field.is_some() {
        query.push_str(" AND n.type = $2");
    }

    query.push_str(" ORDER BY n.created_at DESC");
    query.push_str(&format!(
        " LIMIT {} OFFSET {}",
        filter.limit.unwrap_or(50),
        filter.offset.unwrap_or(0)
    ));

    let mut q = sqlx::query_as::<_, NotificationRow>(&query).bind(user_id);
    if let Some(type_filter) = &filter.type_field {
        q = q.bind(type_filter);
    }
    let rows = q.fetch_all(&pool).await.map_err(ServiceError::from)?;

    let notifications = rows
        .into_iter()
        .map(|row| NotificationWithState {
            notification: row.notification,
            dismissed: row.dismissed,
        })
        .collect();

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications retrieved",
        notifications,
    ))
}

/// Unread/total counts for the current user's notifications
#[utoipa::path(
    get,
    path = "/notifications/count",
    responses(
        (status = 200, description = "Notification counts", body = NotificationCountResponse),
        (status = 500, description = "Failed to count notifications")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_notification_count(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<NotificationCountResponse>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let (total, unread): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(DISTINCT n.id),
                COUNT(DISTINCT n.id) FILTER (
                    WHERE n.id NOT IN (
                        SELECT notification_id FROM notification_dismissals WHERE user_id = $1
                    )
                )
         FROM notifications n
         LEFT JOIN notification_targets nt ON nt.notification_id = n.id
         WHERE (n.global = TRUE OR nt.user_id = $1)
           AND (n.expires_at IS NULL OR n.expires_at > NOW())",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(ServiceError::from)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification counts retrieved",
        NotificationCountResponse { total, unread },
    ))
}

/// Dismiss a notification for the current user
#[utoipa::path(
    post,
    path = "/notifications/{notification_id}/dismiss",
    params(
        ("notification_id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification dismissed"),
        (status = 404, description = "Notification not found or not dismissible")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn dismiss_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let dismissed: Option<i32> = sqlx::query_scalar(
        "INSERT INTO notification_dismissals (notification_id, user_id)
         SELECT n.id, $2 FROM notifications n
         WHERE n.id = $1 AND n.dismissible = TRUE
         ON CONFLICT (notification_id, user_id) DO UPDATE SET dismissed_at = NOW()
         RETURNING notification_id",
    )
    .bind(notification_id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(ServiceError::from)?;

    if dismissed.is_none() {
        return Err(ServiceError::NotFound(format!(
            "Notification {notification_id} not found or not dismissible"
        ))
        .into());
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification dismissed",
        (),
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_notifications, get_notification_count, dismiss_notification),
    components(schemas(Notification, NotificationWithState, NotificationCountResponse)),
    tags(
        (name = "Notifications", description = "Endpoints for consuming lifecycle notifications")
    )
)]
pub struct NotificationDoc;
