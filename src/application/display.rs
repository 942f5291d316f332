// Display port - Optional local rendering of the latest values
use crate::domain::reading::GaugeSpec;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display write failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLine {
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
    pub precision: usize,
}

/// Latest published values, labelled for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub lines: Vec<SnapshotLine>,
}

impl Snapshot {
    /// Pair published values with their gauge descriptions, in gauge order.
    pub fn from_values(gauges: &[GaugeSpec], values: &[(&'static str, f64)]) -> Self {
        let lines = gauges
            .iter()
            .filter_map(|gauge| {
                values
                    .iter()
                    .find(|(name, _)| *name == gauge.name)
                    .map(|(_, value)| SnapshotLine {
                        label: gauge.label,
                        value: *value,
                        unit: gauge.unit,
                        precision: gauge.precision,
                    })
            })
            .collect();
        Self { lines }
    }
}

pub trait DisplayPanel: Send {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), DisplayError>;

    /// Clear the panel, used on shutdown.
    fn blank(&mut self) -> Result<(), DisplayError>;
}
