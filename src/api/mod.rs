pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::StreamsConfig;
use crate::pipeline::DecisionPipeline;
use crate::state::GuardianStore;
use crate::streams::StreamBus;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DecisionPipeline>,
    pub store: Arc<dyn GuardianStore>,
    pub bus: Arc<StreamBus>,
    pub streams: StreamsConfig,
}

impl AppState {
    pub fn new(
        pipeline: Arc<DecisionPipeline>,
        store: Arc<dyn GuardianStore>,
        bus: Arc<StreamBus>,
        streams: StreamsConfig,
    ) -> Self {
        Self {
            pipeline,
            store,
            bus,
            streams,
        }
    }
}
