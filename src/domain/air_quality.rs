// Air-quality index derivation from breakpoint tables
use std::sync::LazyLock;
use thiserror::Error;

/// Value published for a concentration that falls outside every range.
pub const OUT_OF_RANGE_VALUE: f64 = -1.0;

/// US EPA PM2.5 breakpoints (µg/m³ -> AQI 0..=500).
pub static EPA_PM25: LazyLock<BreakpointTable> = LazyLock::new(|| BreakpointTable {
    ranges: vec![
        Breakpoint::new(0.0, 12.0, 0, 50),
        Breakpoint::new(12.1, 35.4, 51, 100),
        Breakpoint::new(35.5, 55.4, 101, 150),
        Breakpoint::new(55.5, 150.4, 151, 200),
        Breakpoint::new(150.5, 250.4, 201, 300),
        Breakpoint::new(250.5, 350.4, 301, 400),
        Breakpoint::new(350.5, 500.4, 401, 500),
    ],
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub low: f64,
    pub high: f64,
    pub index_low: i64,
    pub index_high: i64,
}

impl Breakpoint {
    pub const fn new(low: f64, high: f64, index_low: i64, index_high: i64) -> Self {
        Self {
            low,
            high,
            index_low,
            index_high,
        }
    }

    fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    fn interpolate(&self, value: f64) -> i64 {
        let span = (self.index_high - self.index_low) as f64;
        let index = self.index_low as f64 + span * (value - self.low) / (self.high - self.low);
        index.round_ties_even() as i64
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BreakpointError {
    #[error("breakpoint table is empty")]
    Empty,
    #[error("range {position} is inverted ({low} > {high})")]
    Inverted { position: usize, low: f64, high: f64 },
    #[error("range {position} has zero width (starts and ends at {value})")]
    ZeroWidth { position: usize, value: f64 },
    #[error("range {position} starts at {low}, overlapping the previous range ending at {previous_high}")]
    Overlap {
        position: usize,
        low: f64,
        previous_high: f64,
    },
}

/// Ordered, non-overlapping input ranges of non-zero width, each mapped linearly onto an index range.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointTable {
    ranges: Vec<Breakpoint>,
}

impl BreakpointTable {
    pub fn new(ranges: Vec<Breakpoint>) -> Result<Self, BreakpointError> {
        if ranges.is_empty() {
            return Err(BreakpointError::Empty);
        }

        for (position, range) in ranges.iter().enumerate() {
            let inverted = range.low.is_nan() || range.high.is_nan() || range.low > range.high;
            if inverted || range.index_low > range.index_high {
                return Err(BreakpointError::Inverted {
                    position,
                    low: range.low,
                    high: range.high,
                });
            }
            if range.low == range.high {
                return Err(BreakpointError::ZeroWidth {
                    position,
                    value: range.low,
                });
            }
        }

        for (position, pair) in ranges.windows(2).enumerate() {
            if pair[1].low <= pair[0].high {
                return Err(BreakpointError::Overlap {
                    position: position + 1,
                    low: pair[1].low,
                    previous_high: pair[0].high,
                });
            }
        }

        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[Breakpoint] {
        &self.ranges
    }
}

/// Result of mapping a concentration through a breakpoint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedIndex {
    Index(i64),
    OutOfRange,
}

impl DerivedIndex {
    /// Numeric form used for the gauge; out-of-range becomes -1.
    pub fn gauge_value(self) -> f64 {
        match self {
            DerivedIndex::Index(index) => index as f64,
            DerivedIndex::OutOfRange => OUT_OF_RANGE_VALUE,
        }
    }
}

/// Map `value` through the first range of `table` that contains it.
///
/// Values between or beyond the ranges are reported as [`DerivedIndex::OutOfRange`],
/// never clamped or extrapolated.
pub fn classify(value: f64, table: &BreakpointTable) -> DerivedIndex {
    table
        .ranges
        .iter()
        .find(|range| range.contains(value))
        .map(|range| DerivedIndex::Index(range.interpolate(value)))
        .unwrap_or(DerivedIndex::OutOfRange)
}
