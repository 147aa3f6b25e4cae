use std::sync::Arc;

use blogcraft::{app, config::AppConfig, db, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "blogcraft=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }
    db::log_schema_summary(&pool).await;

    let (host, port) = (config.host.clone(), config.port);
    let state = AppState::new(config, Arc::new(db::PgStore::new(pool.clone())));
    let app = app::build_app(state);

    app::serve(app, &host, port).await?;

    pool.close().await;
    tracing::info!("database pool closed");
    Ok(())
}
