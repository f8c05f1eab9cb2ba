use tracing::debug;

use crate::types::TelemetryRecord;

/// Tag stamped on every point so dashboards can tell this logger's
/// data apart from other writers in the same bucket.
const SOURCE_TAG: &str = "vedirect-logger";

/// Known numeric VE.Direct fields and the line-protocol field names
/// they map to.
const FLOAT_FIELDS: &[(&str, &str)] = &[
    ("V", "voltage"),
    ("I", "current"),
    ("VPV", "pv_voltage"),
    ("PPV", "pv_power"),
    ("H20", "yield_today"),
    ("H19", "yield_total"),
    ("H21", "max_power_today"),
];

/// Builds InfluxDB v2 line-protocol points from telemetry records.
///
/// This module only produces line-protocol strings; delivery to an
/// InfluxDB endpoint is left to whatever HTTP client the deployment
/// already has.
pub struct PointBuilder {
    measurement: String,
}

impl PointBuilder {
    pub fn new(measurement: impl Into<String>) -> Self {
        PointBuilder {
            measurement: escape_measurement(&measurement.into()),
        }
    }

    /// Render one record as a line-protocol point without a timestamp
    /// (the server assigns receipt time).
    ///
    /// Fields that are absent or not numeric are left out of the
    /// point; a record with no usable numeric field produces no point
    /// at all.
    pub fn point(&self, record: &TelemetryRecord) -> Option<String> {
        let mut fields = String::new();
        for &(key, name) in FLOAT_FIELDS {
            let value: f64 = match record.get(key).and_then(|v| v.trim().parse().ok()) {
                Some(v) => v,
                None => continue,
            };
            if !fields.is_empty() {
                fields.push(',');
            }
            fields.push_str(name);
            fields.push('=');
            fields.push_str(&value.to_string());
        }
        if fields.is_empty() {
            debug!("record has no numeric fields, skipping point");
            return None;
        }

        let state = record.charge_state().unwrap_or("unknown");
        let mppt = record.tracker_mode().unwrap_or("unknown");

        // Tag keys in lexical order, as the write API expects.
        Some(format!(
            "{},MPPT={},source={},state={} {}",
            self.measurement,
            escape_tag(mppt),
            SOURCE_TAG,
            escape_tag(state),
            fields,
        ))
    }
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
