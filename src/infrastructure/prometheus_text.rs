// Prometheus text exposition (format 0.0.4) for gauge snapshots
use crate::infrastructure::metric_set::GaugeValue;
use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render HELP/TYPE headers for every gauge and a sample line for each published one.
pub fn render(gauges: &[GaugeValue]) -> String {
    let mut body = String::new();
    for gauge in gauges {
        let name = gauge.spec.name;
        let _ = writeln!(body, "# HELP {} {}", name, escape_help(gauge.spec.help));
        let _ = writeln!(body, "# TYPE {} gauge", name);
        if let Some(value) = gauge.value {
            let _ = writeln!(body, "{} {}", name, format_value(value));
        }
    }
    body
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
