use crate::db::queries::schedule::{block_time_slots, delete_time_slot, get_schedule};
use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;

pub fn schedule_routes() -> Router<PgPool> {
    Router::new()
        .route("/schedule/slots", post(block_time_slots))
        .route("/schedule/slots/{slot_id}", delete(delete_time_slot))
        .route("/schedule/{tutor_id}", get(get_schedule))
}
