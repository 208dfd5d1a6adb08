use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use student_progress_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool).await?;
    app_state.scheduler.bootstrap().await?;

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/students",
            get(routes::students::list_students).post(routes::students::create_student),
        )
        .route("/api/students/sync", post(routes::students::sync_all_students))
        .route(
            "/api/students/:id",
            get(routes::students::get_student)
                .patch(routes::students::update_student)
                .delete(routes::students::delete_student),
        )
        .route(
            "/api/students/:id/profile",
            get(routes::students::get_student_profile),
        )
        .route("/api/students/:id/sync", post(routes::students::sync_student))
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route(
            "/api/jobs/:name",
            get(routes::jobs::get_job).patch(routes::jobs::update_job),
        )
        .route("/api/jobs/:name/trigger", post(routes::jobs::trigger_job))
        .route("/api/jobs/:name/history", get(routes::jobs::job_history))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
