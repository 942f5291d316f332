// Publisher - Writes each cycle's sample into the declared gauges
use crate::domain::reading::{Derived, MetricSource, Sample};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PublishError {
    #[error("metric `{0}` was never declared")]
    UndeclaredMetric(String),
    #[error("metrics sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Destination for gauge values, keyed by a fixed set of names.
pub trait MetricsSink: Send + Sync {
    /// Set every value in `updates`, or none of them.
    fn apply(&self, updates: &[(&'static str, f64)]) -> Result<(), PublishError>;
}

#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn MetricsSink>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// Publish measurements and derived indices as one batch, then each flag on its own.
    pub fn publish<R: MetricSource>(
        &self,
        sample: &Sample<R>,
        derived: &[Derived],
    ) -> Result<(), PublishError> {
        let mut batch = sample.reading.measurements();
        batch.extend(derived.iter().map(|d| (d.gauge, d.index.gauge_value())));
        let mut outcome = self.sink.apply(&batch);

        for flag in sample.reading.flags() {
            let flagged = self.sink.apply(&[flag]);
            if outcome.is_ok() {
                outcome = flagged;
            }
        }

        outcome
    }
}

/// Every value a sample publishes, in publish order; used for logs and the display.
pub fn gauge_values<R: MetricSource>(sample: &Sample<R>, derived: &[Derived]) -> Vec<(&'static str, f64)> {
    let mut values = sample.reading.measurements();
    values.extend(derived.iter().map(|d| (d.gauge, d.index.gauge_value())));
    values.extend(sample.reading.flags());
    values
}
