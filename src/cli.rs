// Command-line overrides layered on top of file and environment settings
use crate::infrastructure::config::{DisplayKind, SensorKind, Settings};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sensor-exporter",
    version,
    about = "Expose serial sensor readings as Prometheus gauges"
)]
pub struct Args {
    /// Sensor attached to the serial device
    #[arg(long, value_enum)]
    pub sensor: Option<SensorKind>,
    /// Bind address [default: 0.0.0.0]
    #[arg(short, long, value_name = "ADDRESS")]
    pub bind: Option<String>,
    /// HTTP port [default: 8002 power meter, 8001 particulate]
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Seconds to pause between cycles [default: 10 power meter, 15 particulate]
    #[arg(short, long, value_name = "SECONDS")]
    pub delay: Option<f64>,
    /// Average PM2.5 and PM10 over N consecutive measures [default: 3]
    #[arg(short, long, value_name = "N")]
    pub measures: Option<u32>,
    /// Path to the sensor's serial device [default: /dev/ttyUSB0]
    #[arg(short = 's', long, value_name = "FILE")]
    pub device: Option<String>,
    /// Render the latest values locally
    #[arg(long, value_enum)]
    pub display: Option<DisplayKind>,
    /// Config file (defaults to config/exporter.* if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Flags given on the command line win over every other source.
    pub fn apply(self, settings: &mut Settings) {
        if self.sensor.is_some() {
            settings.sensor = self.sensor;
        }
        if self.bind.is_some() {
            settings.http.bind = self.bind;
        }
        if self.port.is_some() {
            settings.http.port = self.port;
        }
        if self.delay.is_some() {
            settings.sampling.cycle_delay_seconds = self.delay;
        }
        if self.measures.is_some() {
            settings.sampling.repeat_count = self.measures;
        }
        if self.device.is_some() {
            settings.serial.device = self.device;
        }
        if self.display.is_some() {
            settings.display.kind = self.display;
        }
    }
}
