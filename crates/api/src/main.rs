use anyhow::Context;

use lms_api::config::Settings;
use lms_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;

    lms_observability::init(if settings.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });
    tracing::info!(?settings, "starting");

    let bind_addr = settings.bind_addr.clone();
    let app = lms_api::app::build_app(settings).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
