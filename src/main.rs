use std::net::SocketAddr;
use std::sync::Arc;
use bus_attendance::utils::config::Config;
use bus_attendance::utils::logging;
use bus_attendance::db;
use bus_attendance::pipeline::{notify, session::SessionConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();
    let data_dir = cfg.data.clone();
    let db_dir = data_dir.join("db");
    std::fs::create_dir_all(&db_dir)?;
    let db_path = db_dir.join("attendance.db");
    let conn = db::open_or_create(&db_path)?;

    let notifier = notify::from_config(&cfg.email)?;
    let stats = Arc::new(bus_attendance::stats::Stats::new());
    let paths = bus_attendance::AppPaths { data: data_dir, db_path };
    let state = Arc::new(bus_attendance::AppState::new(
        paths,
        conn,
        SessionConfig::from_config(&cfg),
        notifier,
        stats,
    )?);
    info!(
        labels = state.session.registered().len(),
        cooldown_secs = cfg.email_cooldown_secs,
        threshold = cfg.match_threshold,
        "attendance session ready"
    );

    let app = bus_attendance::api::routes::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    state.session.stop_recognition();
    Ok(())
}
