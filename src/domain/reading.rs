// Sensor reading domain models
use super::air_quality::{classify, DerivedIndex, EPA_PM25};

/// Static description of one exported gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub precision: usize,
}

impl GaugeSpec {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        label: &'static str,
        unit: &'static str,
        precision: usize,
    ) -> Self {
        Self {
            name,
            help,
            label,
            unit,
            precision,
        }
    }
}

/// A derived index bound to the gauge it is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub gauge: &'static str,
    pub index: DerivedIndex,
}

/// Readings that know which gauges they feed.
pub trait MetricSource {
    /// Every gauge this reading kind publishes, in exposition order.
    fn gauges() -> &'static [GaugeSpec];

    /// Measured values, published together or not at all.
    fn measurements(&self) -> Vec<(&'static str, f64)>;

    /// Indices computed from the measurements.
    fn derive(&self) -> Vec<Derived> {
        Vec::new()
    }

    /// Status gauges published independently of the measurements.
    fn flags(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }
}

/// Readings that can be collapsed into a field-by-field mean.
pub trait Averaged: Sized {
    fn mean(readings: &[Self]) -> Option<Self>;
}

/// Aggregated result of one sampling cycle; never built from zero reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<R> {
    pub reading: R,
    pub reads: usize,
}

impl<R> Sample<R> {
    pub fn single(reading: R) -> Self {
        Self { reading, reads: 1 }
    }
}

const POWER_GAUGES: &[GaugeSpec] = &[
    GaugeSpec::new("voltage", "Voltage measured (V)", "Voltage", "V", 1),
    GaugeSpec::new("current", "Current measured in amps (A)", "Current", "A", 3),
    GaugeSpec::new("watts", "Power consumption measured (W)", "Power", "W", 1),
    GaugeSpec::new("energy", "Energy measured (W-hr)", "Energy", "Wh", 0),
    GaugeSpec::new("frequency", "AC frequency measured (Hz)", "Freq", "Hz", 1),
    GaugeSpec::new("power_factor", "Power efficiency (%)", "PF", "", 2),
    GaugeSpec::new("alarm", "Alarm status (boolean)", "Alarm", "", 0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
    pub alarm: bool,
}

impl MetricSource for PowerReading {
    fn gauges() -> &'static [GaugeSpec] {
        POWER_GAUGES
    }

    fn measurements(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("voltage", self.voltage),
            ("current", self.current),
            ("watts", self.power),
            ("energy", self.energy),
            ("frequency", self.frequency),
            ("power_factor", self.power_factor),
        ]
    }

    fn flags(&self) -> Vec<(&'static str, f64)> {
        vec![("alarm", if self.alarm { 1.0 } else { 0.0 })]
    }
}

impl Averaged for PowerReading {
    fn mean(readings: &[Self]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }
        let mean = |field: fn(&Self) -> f64| {
            readings.iter().map(field).sum::<f64>() / readings.len() as f64
        };

        Some(Self {
            voltage: mean(|r| r.voltage),
            current: mean(|r| r.current),
            power: mean(|r| r.power),
            energy: mean(|r| r.energy),
            frequency: mean(|r| r.frequency),
            power_factor: mean(|r| r.power_factor),
            alarm: readings.iter().any(|r| r.alarm),
        })
    }
}

const PARTICULATE_GAUGES: &[GaugeSpec] = &[
    GaugeSpec::new(
        "PM25",
        "Particulate Matter of diameter less than 2.5 microns (µg/m³)",
        "PM2.5",
        "µg/m³",
        1,
    ),
    GaugeSpec::new(
        "PM10",
        "Particulate Matter of diameter less than 10 microns (µg/m³)",
        "PM10",
        "µg/m³",
        1,
    ),
    GaugeSpec::new("AQI", "Air Quality Index based on PM2.5 levels", "AQI", "", 0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateReading {
    pub pm25: f64,
    pub pm10: f64,
}

impl MetricSource for ParticulateReading {
    fn gauges() -> &'static [GaugeSpec] {
        PARTICULATE_GAUGES
    }

    fn measurements(&self) -> Vec<(&'static str, f64)> {
        vec![("PM25", self.pm25), ("PM10", self.pm10)]
    }

    fn derive(&self) -> Vec<Derived> {
        vec![Derived {
            gauge: "AQI",
            index: classify(self.pm25, &EPA_PM25),
        }]
    }
}

impl Averaged for ParticulateReading {
    /// Means are rounded to 0.1 µg/m³, the sensor's own resolution.
    fn mean(readings: &[Self]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }
        let count = readings.len() as f64;
        let pm25 = readings.iter().map(|r| r.pm25).sum::<f64>() / count;
        let pm10 = readings.iter().map(|r| r.pm10).sum::<f64>() / count;

        Some(Self {
            pm25: round_tenths(pm25),
            pm10: round_tenths(pm10),
        })
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power(voltage: f64, alarm: bool) -> PowerReading {
        PowerReading {
            voltage,
            current: 1.0,
            power: 230.0,
            energy: 100.0,
            frequency: 50.0,
            power_factor: 0.9,
            alarm,
        }
    }

    #[test]
    fn test_particulate_mean_rounds_to_sensor_resolution() {
        let readings = [
            ParticulateReading { pm25: 10.0, pm10: 20.0 },
            ParticulateReading { pm25: 12.0, pm10: 50.0 },
            ParticulateReading { pm25: 14.0, pm10: 30.1 },
        ];
        let mean = ParticulateReading::mean(&readings).unwrap();
        assert_eq!(mean.pm25, 12.0);
        assert_eq!(mean.pm10, 33.4);
    }

    #[test]
    fn test_mean_of_nothing_is_absent() {
        assert_eq!(ParticulateReading::mean(&[]), None);
        assert_eq!(PowerReading::mean(&[]), None);
    }

    #[test]
    fn test_power_mean_keeps_alarm_if_any_read_raised_it() {
        let mean = PowerReading::mean(&[power(230.0, false), power(232.0, true)]).unwrap();
        assert_eq!(mean.voltage, 231.0);
        assert!(mean.alarm);
    }

    #[test]
    fn test_particulate_derives_aqi_from_pm25() {
        let reading = ParticulateReading { pm25: 12.0, pm10: 40.0 };
        assert_eq!(
            reading.derive(),
            vec![Derived {
                gauge: "AQI",
                index: DerivedIndex::Index(50)
            }]
        );
    }

    #[test]
    fn test_every_published_name_is_declared() {
        let declared: Vec<&str> = PowerReading::gauges().iter().map(|g| g.name).collect();
        let reading = power(230.0, true);
        for (name, _) in reading.measurements().into_iter().chain(reading.flags()) {
            assert!(declared.contains(&name), "{name} is not declared");
        }

        let declared: Vec<&str> = ParticulateReading::gauges().iter().map(|g| g.name).collect();
        let reading = ParticulateReading { pm25: 1.0, pm10: 2.0 };
        assert!(reading.measurements().iter().all(|(name, _)| declared.contains(name)));
        assert!(reading.derive().iter().all(|d| declared.contains(&d.gauge)));
    }

    #[test]
    fn test_alarm_is_published_as_zero_or_one() {
        assert_eq!(power(230.0, true).flags(), vec![("alarm", 1.0)]);
        assert_eq!(power(230.0, false).flags(), vec![("alarm", 0.0)]);
    }
}
