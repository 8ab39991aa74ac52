use std::sync::Arc;

use reservo_events::TracingFailureSink;
use reservo_infra::handlers::register_all;
use reservo_infra::mailer::TracingMailer;
use reservo_infra::store::InMemoryStore;
use reservo_infra::{AppConfig, AppDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    reservo_observability::init(config.log_format);

    let port = config.port;
    let deps = AppDeps::build(
        config,
        Arc::new(InMemoryStore::new()),
        Arc::new(TracingMailer),
        Arc::new(TracingFailureSink),
    );
    register_all(&deps)?;

    let app = reservo_api::app::build_app(deps.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    deps.bus.shutdown().await;
    Ok(())
}
