use anyhow::Context;

mod app;
mod config;
mod dbutil;
mod extract;
mod response;
mod routes;
mod state;
mod telemetry;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = config::AppConfig::from_env()?;
    let telemetry = telemetry::init(&config.tracing)?;

    let app_state = state::AppState::init(config).await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    let served = app::serve(app::build_app(app_state), &host, port).await;
    telemetry.shutdown();
    served
}
