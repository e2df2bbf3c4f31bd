use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::config::Config;

pub async fn get_db_pool() -> Pool<Postgres> {
    let config = Config::get();
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to the database")
}
