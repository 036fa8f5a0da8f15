//! Meter sample normalisation
//!
//! Power is canonicalised to kW and energy to kWh. A missing unit means the
//! base unit (W, Wh).

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use crate::domain::LiveConnectorMetrics;

pub const MEASURAND_POWER: &str = "Power.Active.Import";
pub const MEASURAND_ENERGY: &str = "Energy.Active.Import.Register";
pub const MEASURAND_SOC: &str = "SoC";

/// One sampled value with its labels as they appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub value: String,
    pub measurand: Option<String>,
    pub unit: Option<String>,
    /// Power of ten applied to the value (OCPP 2.0.1 `unitOfMeasure.multiplier`)
    pub multiplier: i32,
}

impl RawSample {
    pub fn new(value: impl Into<String>, measurand: Option<&str>, unit: Option<&str>) -> Self {
        Self {
            value: value.into(),
            measurand: measurand.map(str::to_string),
            unit: unit.map(str::to_string),
            multiplier: 0,
        }
    }
}

/// Power in kW.
pub fn normalize_power(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        None | Some("W") | Some("VA") | Some("var") => value / 1000.0,
        Some("kW") | Some("kVA") | Some("kvar") => value,
        Some(other) => {
            warn!(unit = other, "Unexpected power unit, value kept unscaled");
            value
        }
    }
}

/// Energy in kWh.
pub fn normalize_energy(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        None | Some("Wh") | Some("varh") => value / 1000.0,
        Some("kWh") | Some("kvarh") => value,
        Some(other) => {
            warn!(unit = other, "Unexpected energy unit, value kept unscaled");
            value
        }
    }
}

/// Latest normalised readings extracted from a batch of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterSnapshot {
    pub charge_rate_kw: Option<f64>,
    pub meter_kwh: Option<f64>,
    pub soc_percent: Option<f64>,
    pub meter_time: Option<DateTime<Utc>>,
}

impl MeterSnapshot {
    /// Fold one meter value (a timestamp and its samples) into the snapshot.
    /// Later values overwrite earlier ones.
    pub fn add(&mut self, timestamp: DateTime<Utc>, samples: &[RawSample]) {
        for sample in samples {
            let Ok(parsed) = sample.value.trim().parse::<f64>() else {
                error!(
                    value = sample.value.as_str(),
                    measurand = sample.measurand.as_deref().unwrap_or("-"),
                    "Unparsable sampled value"
                );
                continue;
            };
            let value = parsed * 10f64.powi(sample.multiplier);
            let unit = sample.unit.as_deref();

            match sample.measurand.as_deref() {
                Some(MEASURAND_POWER) => self.charge_rate_kw = Some(normalize_power(value, unit)),
                None | Some(MEASURAND_ENERGY) => {
                    self.meter_kwh = Some(normalize_energy(value, unit));
                    self.meter_time = Some(timestamp);
                }
                Some(MEASURAND_SOC) => self.soc_percent = Some(value),
                Some(_) => {}
            }
        }
    }

    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, &'a [RawSample])>,
    {
        let mut snapshot = Self::default();
        for (timestamp, samples) in values {
            snapshot.add(timestamp, samples);
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.charge_rate_kw.is_none() && self.meter_kwh.is_none() && self.soc_percent.is_none()
    }

    pub fn live(&self) -> LiveConnectorMetrics {
        LiveConnectorMetrics {
            charge_rate_kw: self.charge_rate_kw,
            meter_kwh: self.meter_kwh,
            soc_percent: self.soc_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Option<f64>, b: f64) {
        let a = a.unwrap();
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn watts_and_watt_hours_scale_to_kilo() {
        let samples = vec![
            RawSample::new("7018", Some(MEASURAND_POWER), Some("W")),
            RawSample::new("2662", Some(MEASURAND_ENERGY), Some("Wh")),
        ];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);
        assert_close(snapshot.charge_rate_kw, 7.018);
        assert_close(snapshot.meter_kwh, 2.662);
    }

    #[test]
    fn kilo_units_pass_through() {
        assert_eq!(normalize_power(7.018, Some("kW")), 7.018);
        assert_eq!(normalize_energy(2.662, Some("kWh")), 2.662);
        assert_eq!(normalize_power(11.0, Some("kvar")), 11.0);
    }

    #[test]
    fn missing_unit_and_measurand_default_to_energy_in_wh() {
        let samples = vec![RawSample::new("1500", None, None)];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);
        assert_close(snapshot.meter_kwh, 1.5);
        assert!(snapshot.meter_time.is_some());
    }

    #[test]
    fn soc_and_multiplier() {
        let mut power = RawSample::new("7.2", Some(MEASURAND_POWER), Some("W"));
        power.multiplier = 3;
        let samples = vec![power, RawSample::new("55", Some(MEASURAND_SOC), Some("Percent"))];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);
        assert_close(snapshot.charge_rate_kw, 7.2);
        assert_close(snapshot.soc_percent, 55.0);
    }

    #[test]
    fn unparsable_values_are_skipped() {
        let samples = vec![
            RawSample::new("n/a", Some(MEASURAND_ENERGY), Some("Wh")),
            RawSample::new("230", Some("Voltage"), Some("V")),
        ];
        let snapshot = MeterSnapshot::from_values([(Utc::now(), samples.as_slice())]);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn unknown_unit_is_kept_unscaled() {
        assert_eq!(normalize_energy(42.0, Some("MWh")), 42.0);
    }
}
