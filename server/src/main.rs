use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use event_scheduler_server::config::Config;
use event_scheduler_server::routes::create_routes;
use event_scheduler_server::scheduler::spawn_cleanup_job;
use event_scheduler_server::state::AppState;
use event_scheduler_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let store = PgStore::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Successfully connected to database");

    store.migrate().await.expect("Failed to run migrations");
    tracing::info!("Migrations run successfully");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let schedule = config.cleanup_schedule.clone();
    let timezone = config.cleanup_timezone;
    let state = AppState::new(config, store);

    let _cleanup = spawn_cleanup_job(state.availability.clone(), &schedule, timezone)
        .expect("Invalid cleanup schedule");

    let app = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
