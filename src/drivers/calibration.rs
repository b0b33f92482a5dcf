//! Per-sensor linear calibration and zero offsets.
//!
//! Up to three (reference, measured) pairs are captured live. Confirming fits
//! `measured = slope * reference + intercept` by least squares, and readings are
//! then mapped back onto the reference scale with the inverse of that line.
//! Zero offsets are subtracted after calibration.
use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::drivers::AcquisitionError;
use crate::types::SensorId;
pub const POINT_SLOTS: usize = 3;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationState {
    Uncalibrated,
    PointsPartial,
    Calibrated,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub reference: f64,
    pub measured: f64,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub slope: f64,
    pub intercept: f64,
}
impl CalibrationCurve {
    /// Least-squares fit of measured on reference. Zero reference variance gives a flat line.
    pub fn fit(points: &[CalibrationPoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_ref = points.iter().map(|p| p.reference).sum::<f64>() / n;
        let mean_meas = points.iter().map(|p| p.measured).sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var = 0.0;
        for p in points {
            let dr = p.reference - mean_ref;
            cov += dr * (p.measured - mean_meas);
            var += dr * dr;
        }
        let slope = if var == 0.0 { 0.0 } else { cov / var };
        Some(Self {
            slope,
            intercept: mean_meas - slope * mean_ref,
        })
    }
    /// Reference-scale value for a measured reading. A flat fit has no inverse,
    /// so the reading passes through unchanged.
    pub fn to_reference(&self, measured: f64) -> f64 {
        if self.slope == 0.0 {
            measured
        } else {
            (measured - self.intercept) / self.slope
        }
    }
    /// Measured reading the fit predicts for a reference value.
    #[cfg(test)]
    pub fn to_measured(&self, reference: f64) -> f64 {
        reference * self.slope + self.intercept
    }
}
/// How a new zero capture combines with the offset already in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroMode {
    /// Offset becomes the current reading.
    #[default]
    Replace,
    /// Current reading is added to the existing offset.
    Compose,
}
#[derive(Clone, Debug, Default)]
struct SensorCalibration {
    points: [Option<CalibrationPoint>; POINT_SLOTS],
    curve: Option<CalibrationCurve>,
    zero: f64,
}
impl SensorCalibration {
    fn complete_points(&self) -> Vec<CalibrationPoint> {
        self.points.iter().flatten().copied().collect()
    }
}
pub struct CalibrationEngine {
    sensors: HashMap<SensorId, SensorCalibration>,
    zero_mode: ZeroMode,
}
impl CalibrationEngine {
    pub fn new(zero_mode: ZeroMode) -> Self {
        Self {
            sensors: HashMap::new(),
            zero_mode,
        }
    }
    pub fn state(&self, id: &SensorId) -> CalibrationState {
        match self.sensors.get(id) {
            Some(s) if s.curve.is_some() => CalibrationState::Calibrated,
            Some(s) if s.points.iter().any(Option::is_some) => CalibrationState::PointsPartial,
            _ => CalibrationState::Uncalibrated,
        }
    }
    pub fn curve(&self, id: &SensorId) -> Option<CalibrationCurve> {
        self.sensors.get(id).and_then(|s| s.curve)
    }
    #[cfg(test)]
    pub fn point(&self, id: &SensorId, slot: usize) -> Option<CalibrationPoint> {
        let idx = slot.checked_sub(1)?;
        self.sensors.get(id)?.points.get(idx).copied().flatten()
    }
    pub fn zero_offset(&self, id: &SensorId) -> f64 {
        self.sensors.get(id).map(|s| s.zero).unwrap_or(0.0)
    }
    /// Stores point `slot` (1..=3). `measured` is the sensor's live reading;
    /// without one nothing is stored.
    pub fn capture_point(
        &mut self,
        id: &SensorId,
        slot: usize,
        reference: &str,
        measured: Option<f64>,
    ) -> Result<CalibrationPoint, AcquisitionError> {
        if !(1..=POINT_SLOTS).contains(&slot) {
            return Err(AcquisitionError::InvalidPointSlot(slot));
        }
        let reference = parse_reference(reference)?;
        let measured = measured.ok_or_else(|| AcquisitionError::NoLiveValue(id.clone()))?;
        let point = CalibrationPoint { reference, measured };
        self.sensors.entry(id.clone()).or_default().points[slot - 1] = Some(point);
        Ok(point)
    }
    /// Fits the curve from the complete points. Fewer than two leaves everything untouched.
    pub fn confirm(&mut self, id: &SensorId) -> Result<CalibrationCurve, AcquisitionError> {
        let points = self
            .sensors
            .get(id)
            .map(SensorCalibration::complete_points)
            .unwrap_or_default();
        let curve = CalibrationCurve::fit(&points)
            .ok_or(AcquisitionError::InsufficientPoints { have: points.len() })?;
        if let Some(sensor) = self.sensors.get_mut(id) {
            sensor.curve = Some(curve);
        }
        Ok(curve)
    }
    /// Applies the curve if confirmed; otherwise the raw value passes through.
    pub fn calibrate(&self, id: &SensorId, raw: f64) -> f64 {
        match self.curve(id) {
            Some(curve) => curve.to_reference(raw),
            None => raw,
        }
    }
    /// Calibration followed by the zero offset.
    pub fn apply(&self, id: &SensorId, raw: f64) -> f64 {
        self.calibrate(id, raw) - self.zero_offset(id)
    }
    /// `reading` is the calibrated value before the offset. Returns the new offset.
    pub fn capture_zero(&mut self, id: &SensorId, reading: Option<f64>) -> Result<f64, AcquisitionError> {
        let reading = reading.ok_or_else(|| AcquisitionError::NoLiveValue(id.clone()))?;
        let sensor = self.sensors.entry(id.clone()).or_default();
        sensor.zero = match self.zero_mode {
            ZeroMode::Replace => reading,
            ZeroMode::Compose => sensor.zero + reading,
        };
        Ok(sensor.zero)
    }
    /// Forgets every sensor of `port`; its identities are no longer valid.
    pub fn forget_port(&mut self, port: &str) {
        self.sensors.retain(|id, _| id.port != port);
    }
}
fn parse_reference(text: &str) -> Result<f64, AcquisitionError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AcquisitionError::InvalidReference(text.to_string()))
}
