// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod console_panel;
pub mod metric_set;
pub mod prometheus_text;
pub mod pzem;
pub mod sds011;
pub mod serial_link;
