// Scheduler - Drives sample -> derive -> publish -> sleep until told to stop
use crate::application::display::{DisplayPanel, Snapshot};
use crate::application::publisher::{gauge_values, PublishError, Publisher};
use crate::application::sampler::{SampleError, Sampler};
use crate::application::sensor_adapter::SensorAdapter;
use crate::domain::reading::{Averaged, MetricSource};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a cycle ended without a complete publish.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CycleError {
    /// Fatal errors end the poll loop; everything else is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            CycleError::Sample(_) | CycleError::Publish(_) => false,
        }
    }
}

pub struct Scheduler<A: SensorAdapter> {
    sampler: Sampler<A>,
    publisher: Publisher,
    display: Option<Box<dyn DisplayPanel>>,
    cycle_delay: Duration,
}

impl<A> Scheduler<A>
where
    A: SensorAdapter,
    A::Reading: MetricSource + Averaged + Debug,
{
    pub fn new(
        sampler: Sampler<A>,
        publisher: Publisher,
        display: Option<Box<dyn DisplayPanel>>,
        cycle_delay: Duration,
    ) -> Self {
        Self {
            sampler,
            publisher,
            display,
            cycle_delay,
        }
    }

    /// Poll until `shutdown` resolves; an in-flight cycle or sleep is abandoned on stop.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), CycleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(
            policy = ?self.sampler.policy(),
            max_sampling_secs = self.sampler.policy().max_delay().as_secs_f64(),
            cycle_delay_secs = self.cycle_delay.as_secs_f64(),
            "poll loop started"
        );

        loop {
            let outcome = tokio::select! {
                outcome = self.run_cycle() => Some(outcome),
                _ = &mut shutdown => None,
            };
            let Some(outcome) = outcome else { break };

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    tracing::error!(error = %err, "fatal cycle error, stopping");
                    self.shutdown().await;
                    return Err(err);
                }
                Err(CycleError::Sample(err)) => {
                    tracing::warn!(error = %err, "cycle skipped, keeping last published values");
                }
                Err(CycleError::Publish(err)) => {
                    tracing::error!(error = %err, "failed to publish cycle");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cycle_delay) => {}
                _ = &mut shutdown => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One sample -> derive -> publish pass. The display is refreshed even if publishing fails.
    pub async fn run_cycle(&mut self) -> Result<(), CycleError> {
        let sample = self.sampler.run().await?;
        let derived = sample.reading.derive();
        let published = self.publisher.publish(&sample, &derived);

        let values = gauge_values(&sample, &derived);
        if published.is_ok() {
            tracing::info!(reads = sample.reads, ?values, "cycle published");
        }
        self.refresh_display(&values);

        Ok(published?)
    }

    fn refresh_display(&mut self, values: &[(&'static str, f64)]) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        let snapshot = Snapshot::from_values(A::Reading::gauges(), values);
        if let Err(err) = display.render(&snapshot) {
            tracing::error!(error = %err, "failed to update display");
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("shutting down gracefully");
        self.sampler.park().await;
        if let Some(display) = self.display.as_mut() {
            if let Err(err) = display.blank() {
                tracing::warn!(error = %err, "failed to blank display");
            }
        }
    }
}
