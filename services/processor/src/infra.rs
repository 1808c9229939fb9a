use metrics_exporter_prometheus::PrometheusHandle;
use scoring_processor::config::TopicConfig;
use scoring_processor::processor::{ChannelPublisher, ChannelTransport};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Queue depth of the in-process transport feeding the processor loop.
pub(crate) const INGEST_CAPACITY: usize = 256;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) transport: Arc<ChannelTransport>,
    pub(crate) publisher: ChannelPublisher,
    pub(crate) topics: Arc<TopicConfig>,
}
