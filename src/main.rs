#![allow(dead_code, unused)]
use axum::middleware::from_fn;
use axum::Extension;
use axum::Router;
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod background;
mod config;
mod db;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::change_request::ChangeRequestDoc;
use crate::db::queries::lesson::LessonDoc;
use crate::db::queries::lesson_request::RequestDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::review::ReviewDoc;
use crate::db::queries::schedule::ScheduleDoc;
use crate::db::queries::subject::SubjectDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_subject_cache, jwt_middleware};

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking.and(std::io::stdout))
        .init();

    let subject_cache = create_subject_cache();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to the database");

    let merged_doc = AuthDoc::openapi()
        .merge_from(RequestDoc::openapi())
        .merge_from(LessonDoc::openapi())
        .merge_from(ChangeRequestDoc::openapi())
        .merge_from(ScheduleDoc::openapi())
        .merge_from(ReviewDoc::openapi())
        .merge_from(NotificationDoc::openapi())
        .merge_from(UserDoc::openapi())
        .merge_from(SubjectDoc::openapi());

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::lesson_request::request_routes())
        .merge(api::lesson::lesson_routes())
        .merge(api::change_request::change_request_routes())
        .merge(api::schedule::schedule_routes())
        .merge(api::review::review_routes())
        .merge(api::notification::notification_routes())
        .merge(api::user::user_routes())
        .merge(api::subject::subject_routes())
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(
            SwaggerUi::new("/swagger")
                .url("/api-docs/openapi.json", merged_doc.clone())
        )
        .merge(
            RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc)
                .path("/rapidoc")
        )
        .layer(CorsLayer::permissive())
        .layer(Extension(subject_cache.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let sweep_cancel = CancellationToken::new();

    let sweeper_task = tokio::spawn(background::auto_complete::run(
        pool.clone(),
        sweep_cancel.clone(),
    ));

    let server_task = tokio::spawn(run_server(
        app,
        shutdown_tx.clone(),
        pool.clone(),
        sweep_cancel.clone(),
    ));

    server_task.await.ok();
    sweeper_task.await.ok();
    println!("Shutdown complete.");
}

async fn shutdown_signal(
    mut shutdown_rx: broadcast::Receiver<()>,
    pool: PgPool,
    sweep_cancel: CancellationToken,
) {
    tokio::select! {
        _ = signal::ctrl_c() => println!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => println!("Received shutdown signal."),
    }
    sweep_cancel.cancel();
    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
}

async fn run_server(
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
    pool: PgPool,
    sweep_cancel: CancellationToken,
) {
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown_signal = shutdown_signal(shutdown_tx.subscribe(), pool.clone(), sweep_cancel);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .expect("Server encountered an error");
}
