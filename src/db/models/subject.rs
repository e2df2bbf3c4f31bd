use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct Subject {
    pub id: i32,
    pub name: String,
}
