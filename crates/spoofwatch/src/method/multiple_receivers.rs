//! Distance between co-located receiver pairs
//!
//! A spoofer broadcasts one counterfeit position, so two receivers a known
//! distance apart suddenly agree on where they are. The method watches the
//! smoothed measured distance collapse below the expected separation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::DevicePair;
use crate::geo::haversine_distance;
use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};

#[derive(Debug)]
pub struct MultipleReceivers {
    gating: Gating,
    /// Expected separation per receiver pair, meters
    distances: HashMap<DevicePair, f64>,
    /// Alert when smoothed/expected falls below this ratio
    distance_ratio_thresholds: HashMap<DevicePair, f64>,
    /// Exponential smoothing weight of a fresh measurement
    new_measurement_weight: f64,
    /// Smoothed distance per pair, seeded with the expected separation
    past_measurements: HashMap<DevicePair, f64>,
    /// Smallest smoothed ratio ever seen per pair, for calibration
    observed_ratios: HashMap<DevicePair, f64>,
}

impl MultipleReceivers {
    pub fn new(
        distances: HashMap<DevicePair, f64>,
        distance_ratio_thresholds: HashMap<DevicePair, f64>,
        new_measurement_weight: f64,
    ) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![
                    StateField::GpsTime,
                    StateField::UpdateTime,
                    StateField::Latitude,
                    StateField::Longitude,
                ],
                variable_state_fields: vec![
                    StateField::GpsTime,
                    StateField::Latitude,
                    StateField::Longitude,
                ],
                ..Gating::default()
            },
            distances,
            distance_ratio_thresholds,
            new_measurement_weight,
            past_measurements: HashMap::new(),
            observed_ratios: HashMap::new(),
        }
    }
}

impl Method for MultipleReceivers {
    fn name(&self) -> &'static str {
        "multiple-receivers"
    }

    fn gating(&self) -> &Gating {
        &self.gating
    }

    fn spoofing_indicator(
        &mut self,
        ctx: &MethodContext,
        device_id: &str,
        latest: &NavState,
        _previous: &NavState,
        history: &StateHistory,
    ) -> f64 {
        for (pair, &expected_distance) in &self.distances {
            let other_device_id = if pair.0 == device_id {
                &pair.1
            } else if pair.1 == device_id {
                &pair.0
            } else {
                continue;
            };
            let Some(other_device) = ctx.devices.device(other_device_id) else {
                continue;
            };
            let other_history = &other_device.state_history;
            let Some(other_latest) = other_history.state(0) else {
                continue;
            };
            if !other_latest.is_sufficiently_defined(&self.gating.required_state_fields) {
                continue;
            }

            // The earlier of the two latest states is the reference; the other
            // device's history gets interpolated to that instant
            let (target_history, reference_state) =
                if latest.update_time <= other_latest.update_time {
                    (other_history, latest)
                } else {
                    (history, other_latest)
                };
            let Some(reference_time) = reference_state.update_time else {
                continue;
            };
            let Some(estimated) =
                estimate_state(target_history, reference_time, &self.gating.required_state_fields)
            else {
                continue;
            };
            let (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) = (
                reference_state.latitude,
                reference_state.longitude,
                estimated.latitude,
                estimated.longitude,
            ) else {
                continue;
            };
            let measured_distance = haversine_distance(lat1, lon1, lat2, lon2);

            let smoothed = self
                .past_measurements
                .entry(pair.clone())
                .or_insert(expected_distance);
            *smoothed = (1.0 - self.new_measurement_weight) * *smoothed
                + self.new_measurement_weight * measured_distance;
            let distance_ratio = *smoothed / expected_distance;

            let observed = self
                .observed_ratios
                .entry(pair.clone())
                .or_insert(distance_ratio);
            *observed = observed.min(distance_ratio);

            let Some(&threshold) = self.distance_ratio_thresholds.get(pair) else {
                continue;
            };
            if distance_ratio < threshold {
                return 1.0;
            }
        }
        0.0
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        let mut distances = serde_json::Map::new();
        for (pair, distance) in &self.distances {
            distances.insert(format!("{},{}", pair.0, pair.1), (*distance).into());
        }
        let mut thresholds = serde_json::Map::new();
        for (pair, ratio) in &self.observed_ratios {
            thresholds.insert(format!("{},{}", pair.0, pair.1), (*ratio).into());
        }
        Some(serde_json::json!({
            "distances": distances,
            "distance_ratio_thresholds": thresholds,
        }))
    }
}

/// Linear interpolation of a device's position at `reference_time`
///
/// Both bracketing states must satisfy the method's required fields.
fn estimate_state(
    history: &StateHistory,
    reference_time: DateTime<Utc>,
    required_fields: &[StateField],
) -> Option<NavState> {
    let after = history.state_after(reference_time)?;
    let before = history.state_before(reference_time)?;
    if !after.is_sufficiently_defined(required_fields)
        || !before.is_sufficiently_defined(required_fields)
    {
        return None;
    }
    let before_time = before.update_time?;
    let old_delta = (after.update_time? - before_time).num_milliseconds() as f64 / 1000.0;
    let new_delta = (reference_time - before_time).num_milliseconds() as f64 / 1000.0;
    let delta = if old_delta != 0.0 { new_delta / old_delta } else { 0.0 };
    let latitude = before.latitude? + (after.latitude? - before.latitude?) * delta;
    let longitude = before.longitude? + (after.longitude? - before.longitude?) * delta;

    let mut estimated = before.clone();
    estimated.update_time = Some(reference_time);
    estimated.latitude = Some(latitude);
    estimated.longitude = Some(longitude);
    Some(estimated)
}
