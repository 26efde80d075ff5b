//! Course change rate against the platform's physical turning ability

use crate::geo::minimum_angle_difference;
use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};
use crate::stats::MinMax;

#[derive(Debug)]
pub struct PhysicalRateOfTurnLimit {
    gating: Gating,
    /// Degrees per second
    max_rate_of_turn: f64,
    /// Below this speed the reported course is noise, not motion
    min_speed_to_determine_rate_of_turn: f64,
    observed: MinMax,
}

impl PhysicalRateOfTurnLimit {
    pub fn new(max_rate_of_turn: f64, min_speed_to_determine_rate_of_turn: f64) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![
                    StateField::UpdateTime,
                    StateField::Course,
                    StateField::Speed,
                ],
                variable_state_fields: vec![StateField::UpdateTime],
                ..Gating::default()
            },
            max_rate_of_turn,
            min_speed_to_determine_rate_of_turn,
            observed: MinMax::new(),
        }
    }
}

impl Method for PhysicalRateOfTurnLimit {
    fn name(&self) -> &'static str {
        "physical-rate-of-turn-limit"
    }

    fn gating(&self) -> &Gating {
        &self.gating
    }

    fn spoofing_indicator(
        &mut self,
        _ctx: &MethodContext,
        _device_id: &str,
        latest: &NavState,
        previous: &NavState,
        _history: &StateHistory,
    ) -> f64 {
        let (Some(speed), Some(course)) = (latest.speed, latest.course) else {
            return 0.0;
        };
        if speed < self.min_speed_to_determine_rate_of_turn {
            return 0.0;
        }
        let (Some(latest_time), Some(previous_time), Some(previous_course)) =
            (latest.update_time, previous.update_time, previous.course)
        else {
            return 0.0;
        };
        let delta = (latest_time - previous_time).num_milliseconds() as f64 / 1000.0;
        if delta == 0.0 {
            return 0.0;
        }
        let course_difference = minimum_angle_difference(course, previous_course);
        let rate_of_turn = (course_difference / delta).abs();
        self.observed.update(rate_of_turn);
        if rate_of_turn > self.max_rate_of_turn {
            1.0
        } else {
            0.0
        }
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        let max_rate_of_turn = self.observed.max()?;
        Some(serde_json::json!({ "max_rate_of_turn": max_rate_of_turn }))
    }
}
