// In-memory gauge store shared between the poll loop and the scrape endpoint
use crate::application::publisher::{MetricsSink, PublishError};
use crate::domain::reading::GaugeSpec;
use std::sync::atomic::{AtomicU64, Ordering};

// All-ones bit pattern; never produced by arithmetic or `f64::NAN`.
const UNSET: u64 = u64::MAX;

struct Gauge {
    spec: GaugeSpec,
    bits: AtomicU64,
}

/// Current value of one gauge; `None` until first published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeValue {
    pub spec: GaugeSpec,
    pub value: Option<f64>,
}

/// Fixed set of named gauges. Each value is a single atomic cell, so readers
/// never see a torn value while the publisher writes.
pub struct MetricSet {
    gauges: Vec<Gauge>,
}

impl MetricSet {
    pub fn new(specs: &[GaugeSpec]) -> Self {
        let gauges = specs
            .iter()
            .map(|spec| Gauge {
                spec: *spec,
                bits: AtomicU64::new(UNSET),
            })
            .collect();
        Self { gauges }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauge(name).and_then(Self::load)
    }

    pub fn snapshot(&self) -> Vec<GaugeValue> {
        self.gauges
            .iter()
            .map(|gauge| GaugeValue {
                spec: gauge.spec,
                value: Self::load(gauge),
            })
            .collect()
    }

    fn gauge(&self, name: &str) -> Option<&Gauge> {
        self.gauges.iter().find(|gauge| gauge.spec.name == name)
    }

    fn load(gauge: &Gauge) -> Option<f64> {
        match gauge.bits.load(Ordering::Acquire) {
            UNSET => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

impl MetricsSink for MetricSet {
    fn apply(&self, updates: &[(&'static str, f64)]) -> Result<(), PublishError> {
        // Resolve every name before touching any value.
        let targets = updates
            .iter()
            .map(|(name, value)| {
                self.gauge(name)
                    .map(|gauge| (gauge, *value))
                    .ok_or_else(|| PublishError::UndeclaredMetric(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (gauge, value) in targets {
            gauge.bits.store(value.to_bits(), Ordering::Release);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reading::{MetricSource, ParticulateReading};

    #[test]
    fn test_gauges_start_unset() {
        let metrics = MetricSet::new(ParticulateReading::gauges());
        assert_eq!(metrics.get("PM25"), None);
        assert!(metrics.snapshot().iter().all(|g| g.value.is_none()));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let metrics = MetricSet::new(ParticulateReading::gauges());

        let err = metrics
            .apply(&[("PM25", 12.0), ("humidity", 40.0)])
            .unwrap_err();

        assert_eq!(err, PublishError::UndeclaredMetric("humidity".into()));
        assert_eq!(metrics.get("PM25"), None);
    }

    #[test]
    fn test_apply_overwrites_previous_values() {
        let metrics = MetricSet::new(ParticulateReading::gauges());
        metrics.apply(&[("PM25", 12.0), ("AQI", 50.0)]).unwrap();
        metrics.apply(&[("PM25", 35.5)]).unwrap();

        assert_eq!(metrics.get("PM25"), Some(35.5));
        assert_eq!(metrics.get("AQI"), Some(50.0));
        assert_eq!(metrics.get("PM10"), None);
        assert_eq!(metrics.get("unknown"), None);
    }

    #[test]
    fn test_nan_is_a_publishable_value() {
        let metrics = MetricSet::new(ParticulateReading::gauges());
        metrics.apply(&[("PM10", f64::NAN)]).unwrap();
        assert!(metrics.get("PM10").is_some_and(f64::is_nan));
    }
}
