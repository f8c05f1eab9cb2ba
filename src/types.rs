use std::collections::HashMap;

/// One decoded VE.Direct frame: field label to field value, as sent by
/// the device. Values stay untyped strings; the typed accessors below
/// cover the fields the logger cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryRecord {
    fields: HashMap<String, String>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        TelemetryRecord {
            fields: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn float_field(&self, key: &str) -> Option<f64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Battery voltage in mV (`V`).
    pub fn battery_voltage(&self) -> Option<f64> {
        self.float_field("V")
    }

    /// Battery current in mA (`I`), negative when discharging.
    pub fn battery_current(&self) -> Option<f64> {
        self.float_field("I")
    }

    /// Panel voltage in mV (`VPV`).
    pub fn panel_voltage(&self) -> Option<f64> {
        self.float_field("VPV")
    }

    /// Panel power in W (`PPV`).
    pub fn panel_power(&self) -> Option<f64> {
        self.float_field("PPV")
    }

    /// Total yield in 0.01 kWh (`H19`).
    pub fn yield_total(&self) -> Option<f64> {
        self.float_field("H19")
    }

    /// Yield today in 0.01 kWh (`H20`).
    pub fn yield_today(&self) -> Option<f64> {
        self.float_field("H20")
    }

    /// Maximum power today in W (`H21`).
    pub fn max_power_today(&self) -> Option<f64> {
        self.float_field("H21")
    }

    /// Charge state code (`CS`).
    pub fn charge_state(&self) -> Option<&str> {
        self.get("CS")
    }

    /// Tracker operation mode (`MPPT`).
    pub fn tracker_mode(&self) -> Option<&str> {
        self.get("MPPT")
    }
}

impl FromIterator<(String, String)> for TelemetryRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        TelemetryRecord {
            fields: iter.into_iter().collect(),
        }
    }
}
