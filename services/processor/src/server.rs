use crate::cli::ServeArgs;
use crate::infra::{AppState, INGEST_CAPACITY};
use crate::routes::service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scoring_processor::config::AppConfig;
use scoring_processor::error::AppError;
use scoring_processor::processor::ChannelTransport;
use scoring_processor::{http_processor, telemetry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (transport, publisher) = ChannelTransport::new(INGEST_CAPACITY);
    let transport = Arc::new(transport);
    let processor = http_processor(&config, transport.clone())?;
    tokio::spawn(async move { processor.run().await });

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        transport,
        publisher,
        topics: Arc::new(config.topics.clone()),
    };

    let app = service_routes()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, topics = ?config.topics.subscriptions(), "scoring processor ready");

    axum::serve(listener, app).await?;
    Ok(())
}
