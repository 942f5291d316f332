// Application state for HTTP handlers
use crate::infrastructure::metric_set::MetricSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricSet>,
}
