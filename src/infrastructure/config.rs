use crate::application::sampler::SamplingPolicy;
use crate::infrastructure::pzem::DEFAULT_ADDRESS;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "config/exporter";
const ENV_PREFIX: &str = "EXPORTER";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// PZEM-016 AC power meter
    Pzem016,
    /// SDS011 particulate sensor
    Sds011,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    FirstSuccess,
    Mean,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    #[default]
    None,
    Console,
}

/// Raw layered settings; anything left unset falls back to the sensor's defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub sensor: Option<SensorKind>,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SerialSettings {
    pub device: Option<String>,
    pub read_timeout_ms: Option<u64>,
    pub modbus_address: Option<u8>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpSettings {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SamplingSettings {
    pub policy: Option<PolicyKind>,
    pub max_attempts: Option<u32>,
    pub backoff_seconds: Option<f64>,
    pub settle_seconds: Option<f64>,
    pub inter_read_seconds: Option<f64>,
    pub repeat_count: Option<u32>,
    pub cycle_delay_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DisplaySettings {
    pub kind: Option<DisplayKind>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no sensor selected; set `sensor` to pzem016 or sds011")]
    MissingSensor,
    #[error("`{0}` must be at least 1")]
    Zero(&'static str),
    #[error("`{field}` must be a non-negative number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
}

/// Every timing constant of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub settle: Duration,
    pub inter_read: Duration,
    pub repeat_count: u32,
    pub cycle_delay: Duration,
}

impl Timing {
    pub fn policy(&self, kind: PolicyKind) -> SamplingPolicy {
        match kind {
            PolicyKind::FirstSuccess => SamplingPolicy::FirstSuccess {
                max_attempts: self.max_attempts,
                backoff: self.backoff,
            },
            PolicyKind::Mean => SamplingPolicy::Mean {
                settle: self.settle,
                repeat_count: self.repeat_count,
                inter_read: self.inter_read,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub sensor: SensorKind,
    pub device: String,
    pub read_timeout: Duration,
    pub modbus_address: u8,
    pub bind: String,
    pub port: u16,
    pub timing: Timing,
    pub policy: SamplingPolicy,
    pub display: DisplayKind,
}

impl SensorKind {
    fn default_port(self) -> u16 {
        match self {
            SensorKind::Pzem016 => 8002,
            SensorKind::Sds011 => 8001,
        }
    }

    fn default_cycle_delay_seconds(self) -> f64 {
        match self {
            SensorKind::Pzem016 => 10.0,
            SensorKind::Sds011 => 15.0,
        }
    }

    fn default_policy(self) -> PolicyKind {
        match self {
            SensorKind::Pzem016 => PolicyKind::FirstSuccess,
            SensorKind::Sds011 => PolicyKind::Mean,
        }
    }
}

fn seconds(field: &'static str, value: Option<f64>, default: f64) -> Result<Duration, ConfigError> {
    let value = value.unwrap_or(default);
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}

fn at_least_one(field: &'static str, value: Option<u32>, default: u32) -> Result<u32, ConfigError> {
    match value.unwrap_or(default) {
        0 => Err(ConfigError::Zero(field)),
        value => Ok(value),
    }
}

impl ExporterConfig {
    pub fn resolve(settings: Settings) -> Result<Self, ConfigError> {
        let sensor = settings.sensor.ok_or(ConfigError::MissingSensor)?;
        let sampling = settings.sampling;

        let timing = Timing {
            max_attempts: at_least_one("max_attempts", sampling.max_attempts, 3)?,
            backoff: seconds("backoff_seconds", sampling.backoff_seconds, 1.0)?,
            settle: seconds("settle_seconds", sampling.settle_seconds, 10.0)?,
            inter_read: seconds("inter_read_seconds", sampling.inter_read_seconds, 15.0)?,
            repeat_count: at_least_one("repeat_count", sampling.repeat_count, 3)?,
            cycle_delay: seconds(
                "cycle_delay_seconds",
                sampling.cycle_delay_seconds,
                sensor.default_cycle_delay_seconds(),
            )?,
        };
        let policy = timing.policy(sampling.policy.unwrap_or(sensor.default_policy()));

        Ok(Self {
            sensor,
            device: settings
                .serial
                .device
                .unwrap_or_else(|| "/dev/ttyUSB0".to_string()),
            read_timeout: Duration::from_millis(settings.serial.read_timeout_ms.unwrap_or(2000)),
            modbus_address: settings.serial.modbus_address.unwrap_or(DEFAULT_ADDRESS),
            bind: settings.http.bind.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: settings.http.port.unwrap_or(sensor.default_port()),
            timing,
            policy,
            display: settings.display.kind.unwrap_or_default(),
        })
    }
}

/// Layer the optional config file and `EXPORTER__*` environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(sensor: SensorKind) -> Settings {
        Settings {
            sensor: Some(sensor),
            ..Settings::default()
        }
    }

    #[test]
    fn test_power_meter_defaults() {
        let config = ExporterConfig::resolve(settings(SensorKind::Pzem016)).unwrap();

        assert_eq!(config.port, 8002);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.modbus_address, 0x01);
        assert_eq!(config.timing.cycle_delay, Duration::from_secs(10));
        assert_eq!(
            config.policy,
            SamplingPolicy::FirstSuccess {
                max_attempts: 3,
                backoff: Duration::from_secs(1)
            }
        );
        assert_eq!(config.display, DisplayKind::None);
    }

    #[test]
    fn test_particulate_defaults() {
        let config = ExporterConfig::resolve(settings(SensorKind::Sds011)).unwrap();

        assert_eq!(config.port, 8001);
        assert_eq!(config.timing.cycle_delay, Duration::from_secs(15));
        assert_eq!(
            config.policy,
            SamplingPolicy::Mean {
                settle: Duration::from_secs(10),
                repeat_count: 3,
                inter_read: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn test_policy_can_be_overridden() {
        let mut settings = settings(SensorKind::Sds011);
        settings.sampling.policy = Some(PolicyKind::FirstSuccess);
        settings.sampling.max_attempts = Some(5);
        settings.sampling.backoff_seconds = Some(0.5);

        let config = ExporterConfig::resolve(settings).unwrap();

        assert_eq!(
            config.policy,
            SamplingPolicy::FirstSuccess {
                max_attempts: 5,
                backoff: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_eq!(
            ExporterConfig::resolve(Settings::default()),
            Err(ConfigError::MissingSensor)
        );

        let mut zero = settings(SensorKind::Sds011);
        zero.sampling.repeat_count = Some(0);
        assert_eq!(
            ExporterConfig::resolve(zero),
            Err(ConfigError::Zero("repeat_count"))
        );

        let mut negative = settings(SensorKind::Pzem016);
        negative.sampling.cycle_delay_seconds = Some(-1.0);
        assert_eq!(
            ExporterConfig::resolve(negative),
            Err(ConfigError::InvalidDuration {
                field: "cycle_delay_seconds",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_load_settings_from_file() {
        let path = std::env::temp_dir().join(format!("sensor-exporter-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "sensor = \"sds011\"\n\n[http]\nport = 9100\n\n[sampling]\nrepeat_count = 5\n",
        )
        .unwrap();

        let settings = load_settings(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.sensor, Some(SensorKind::Sds011));
        assert_eq!(settings.http.port, Some(9100));
        assert_eq!(settings.sampling.repeat_count, Some(5));
        assert_eq!(settings.serial.device, None);
    }
}
