//! Receiver clock drift against its own past behavior
//!
//! Real receiver clocks drift linearly relative to the host clock. A spoofer
//! taking over the solution drags the reported GPS time off that line.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};
use crate::stats;

const MIN_PAST_MEASUREMENTS: usize = 10;
const MAX_PAST_MEASUREMENTS: usize = 60;

#[derive(Debug)]
pub struct TimeDrift {
    gating: Gating,
    /// Seconds the newest drift sample may fall short of the prediction
    max_clock_drift_dev: f64,
    /// First wall-clock sighting per device, the origin of its time series
    base_line: HashMap<String, DateTime<Utc>>,
    /// Rolling `(seconds_since_first_seen, clock_drift)` samples per device
    past_measurements: HashMap<String, Vec<(f64, f64)>>,
    rng: StdRng,
}

impl TimeDrift {
    pub fn new(max_clock_drift_dev: f64) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![StateField::UpdateTime, StateField::GpsTime],
                variable_state_fields: vec![StateField::GpsTime],
                ..Gating::default()
            },
            max_clock_drift_dev,
            base_line: HashMap::new(),
            past_measurements: HashMap::new(),
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Method for TimeDrift {
    fn name(&self) -> &'static str {
        "time-drift"
    }

    fn gating(&self) -> &Gating {
        &self.gating
    }

    fn spoofing_indicator(
        &mut self,
        _ctx: &MethodContext,
        device_id: &str,
        latest: &NavState,
        _previous: &NavState,
        _history: &StateHistory,
    ) -> f64 {
        let (Some(update_time), Some(gps_time)) = (latest.update_time, latest.gps_time) else {
            return 0.0;
        };
        let base_line = *self
            .base_line
            .entry(device_id.to_string())
            .or_insert(update_time);
        let series = self.past_measurements.entry(device_id.to_string()).or_default();

        let time_since_start = (update_time - base_line).num_milliseconds() as f64 / 1000.0;
        let clock_drift = (gps_time - update_time).num_milliseconds() as f64 / 1000.0;
        series.push((time_since_start, clock_drift));

        if series.len() < MIN_PAST_MEASUREMENTS {
            return 0.0;
        }

        // Fit everything but the newest sample, then ask where the newest one
        // should have landed
        let fit = stats::ransac_line(&series[..series.len() - 1], &mut self.rng);
        let Some(line) = fit else {
            return 0.0;
        };
        let expected_clock_drift = line.predict(time_since_start);

        let excess = series.len().saturating_sub(MAX_PAST_MEASUREMENTS);
        series.drain(..excess);

        if expected_clock_drift - clock_drift > self.max_clock_drift_dev {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::method::tests::indicate_states;

    fn drift_state(base: DateTime<Utc>, second: i64, drift_ms: i64) -> NavState {
        NavState {
            update_time: Some(base + Duration::milliseconds(second * 1000 + drift_ms)),
            gps_time: Some(base + Duration::seconds(second)),
            ..NavState::default()
        }
    }

    fn run_series(final_drift_ms: i64) -> f64 {
        let base = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let mut method = TimeDrift::new(0.5);
        let mut indicator = 0.0;
        for second in 0..20 {
            let drift_ms = if second == 19 { final_drift_ms } else { 0 };
            let latest = drift_state(base, second, drift_ms);
            indicator = indicate_states(&mut method, &latest, &NavState::default());
        }
        indicator
    }

    #[test]
    fn test_drift_against_fitted_line() {
        assert_eq!(run_series(0), 0.0);
        assert_eq!(run_series(490), 0.0);
        assert_eq!(run_series(1000), 1.0);
        assert_eq!(run_series(10_000), 1.0);
    }

    #[test]
    fn test_needs_a_minimum_of_samples() {
        let base = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let mut method = TimeDrift::new(0.5);
        for second in 0..(MIN_PAST_MEASUREMENTS as i64 - 1) {
            // A wild drift that would alert immediately once enough samples exist
            let latest = drift_state(base, second, -30_000);
            assert_eq!(indicate_states(&mut method, &latest, &NavState::default()), 0.0);
        }
    }

    #[test]
    fn test_series_is_capped() {
        let base = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let mut method = TimeDrift::new(0.5);
        for second in 0..200 {
            let latest = drift_state(base, second, 0);
            indicate_states(&mut method, &latest, &NavState::default());
        }
        let series = &method.past_measurements["DEVICE1"];
        assert_eq!(series.len(), MAX_PAST_MEASUREMENTS);
    }

    #[test]
    fn test_devices_are_tracked_independently() {
        let base = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let mut method = TimeDrift::new(0.5);
        let devices = crate::detect::DeviceIndex::new(Vec::<String>::new());
        let ctx = MethodContext { devices: &devices };
        let history = StateHistory::new();
        for second in 0..20 {
            let latest = drift_state(base, second, 0);
            method.spoofing_indicator(&ctx, "A", &latest, &NavState::default(), &history);
        }
        // Device B starts its own baseline; too few samples to evaluate
        let latest = drift_state(base, 100, 60_000);
        let indicator = method.spoofing_indicator(&ctx, "B", &latest, &NavState::default(), &history);
        assert_eq!(indicator, 0.0);
        assert_eq!(method.past_measurements["B"].len(), 1);
    }
}
