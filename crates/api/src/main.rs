use anyhow::Context;

use warden_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(
        lifecycle = ?config.lifecycle,
        repo_type = config.repo_type.as_str(),
        timeout_secs = config.timeout.as_secs(),
        port = config.port,
        "configuration loaded"
    );

    let pipeline = warden_api::app::build_pipeline(&config)
        .await
        .context("initializing service")?;
    let app = warden_api::app::build_app(pipeline);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
