use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub role: String,
    pub account_locked: bool,
    pub created_at: Option<NaiveDateTime>,
}

/// Public projection of a user, safe to embed in lesson views.
#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub role: String,
}

/// ✅ Tutor directory entry with marketplace profile fields.
#[derive(Serialize, Deserialize, Debug, FromRow, ToSchema)]
pub struct TutorProfile {
    pub user_id: i32,
    pub username: String,
    pub headline: Option<String>,
    #[schema(value_type = Option<f64>)] // ✅ OpenAPI-friendly schema for NUMERIC
    pub price_per_hour: Option<BigDecimal>,
    #[schema(value_type = Option<f64>)] // ✅ OpenAPI-friendly schema for NUMERIC
    pub rating_avg: Option<BigDecimal>,
}
