// Sampler - Turns unreliable raw reads into one aggregated sample
use crate::application::sensor_adapter::{SensorAdapter, TransportError};
use crate::domain::reading::{Averaged, Sample};
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// How a sampling cycle turns raw reads into a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Up to `max_attempts` reads with `backoff` between failures; first success wins.
    FirstSuccess { max_attempts: u32, backoff: Duration },
    /// Wake, settle, exactly `repeat_count` reads each followed by `inter_read`, then sleep.
    /// Any failed read fails the whole cycle.
    Mean {
        settle: Duration,
        repeat_count: u32,
        inter_read: Duration,
    },
}

impl SamplingPolicy {
    /// Worst-case time spent inside one sampling run, excluding device I/O.
    pub fn max_delay(&self) -> Duration {
        match *self {
            SamplingPolicy::FirstSuccess {
                max_attempts,
                backoff,
            } => backoff * max_attempts.saturating_sub(1),
            SamplingPolicy::Mean {
                settle,
                repeat_count,
                inter_read,
            } => settle + inter_read * repeat_count.max(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no sample after {attempts} attempts")]
    NoSample {
        attempts: u32,
        #[source]
        last_error: Option<TransportError>,
    },
    #[error("sensor transport failed")]
    Transport(#[from] TransportError),
}

pub struct Sampler<A> {
    adapter: A,
    policy: SamplingPolicy,
}

impl<A> Sampler<A>
where
    A: SensorAdapter,
    A::Reading: Averaged + Debug,
{
    pub fn new(adapter: A, policy: SamplingPolicy) -> Self {
        Self { adapter, policy }
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    pub async fn run(&mut self) -> Result<Sample<A::Reading>, SampleError> {
        match self.policy {
            SamplingPolicy::FirstSuccess {
                max_attempts,
                backoff,
            } => self.first_success(max_attempts.max(1), backoff).await,
            SamplingPolicy::Mean {
                settle,
                repeat_count,
                inter_read,
            } => self.mean(settle, repeat_count.max(1), inter_read).await,
        }
    }

    /// Best-effort return of the device to its low-power state.
    pub async fn park(&mut self) {
        if let Err(err) = self.adapter.sleep().await {
            tracing::warn!(error = %err, "failed to put sensor to sleep");
        }
    }

    async fn first_success(
        &mut self,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<Sample<A::Reading>, SampleError> {
        let mut attempt = 1;
        loop {
            match self.adapter.read().await {
                Ok(reading) => {
                    tracing::info!(attempt, ?reading, "reading successful");
                    return Ok(Sample::single(reading));
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(attempt, error = %err, "read attempt failed");
                    tracing::error!(attempts = attempt, "failed to get readings");
                    return Err(SampleError::NoSample {
                        attempts: attempt,
                        last_error: Some(err),
                    });
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "read attempt failed");
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn mean(
        &mut self,
        settle: Duration,
        repeat_count: u32,
        inter_read: Duration,
    ) -> Result<Sample<A::Reading>, SampleError> {
        if let Err(err) = self.adapter.wake().await {
            tracing::error!(error = %err, "failed to wake sensor");
            self.park().await;
            return Err(err.into());
        }
        tracing::debug!(settle_secs = settle.as_secs_f64(), "sensor awake, settling");
        sleep(settle).await;

        let collected = self.collect(repeat_count, inter_read).await;
        self.park().await;
        let readings = collected?;

        let reads = readings.len();
        A::Reading::mean(&readings)
            .map(|reading| Sample { reading, reads })
            .ok_or(SampleError::NoSample {
                attempts: repeat_count,
                last_error: None,
            })
    }

    async fn collect(
        &mut self,
        repeat_count: u32,
        inter_read: Duration,
    ) -> Result<Vec<A::Reading>, TransportError> {
        let mut readings = Vec::with_capacity(repeat_count as usize);
        for measure in 1..=repeat_count {
            let reading = self.adapter.read().await.inspect_err(|err| {
                tracing::error!(measure, error = %err, "measurement failed, abandoning cycle");
            })?;
            tracing::debug!(measure, ?reading, "measurement taken");
            readings.push(reading);
            sleep(inter_read).await;
        }
        Ok(readings)
    }
}
