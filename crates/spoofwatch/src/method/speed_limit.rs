//! Reported speed against the platform's physical maximum

use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};
use crate::stats::MinMax;

#[derive(Debug)]
pub struct PhysicalSpeedLimit {
    gating: Gating,
    max_speed: f64,
    observed: MinMax,
}

impl PhysicalSpeedLimit {
    pub fn new(max_speed: f64) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![StateField::UpdateTime, StateField::Speed],
                variable_state_fields: vec![StateField::UpdateTime, StateField::Speed],
                ..Gating::default()
            },
            max_speed,
            observed: MinMax::new(),
        }
    }
}

impl Method for PhysicalSpeedLimit {
    fn name(&self) -> &'static str {
        "physical-speed-limit"
    }

    fn gating(&self) -> &Gating {
        &self.gating
    }

    fn spoofing_indicator(
        &mut self,
        _ctx: &MethodContext,
        _device_id: &str,
        latest: &NavState,
        _previous: &NavState,
        _history: &StateHistory,
    ) -> f64 {
        let Some(speed) = latest.speed else {
            return 0.0;
        };
        self.observed.update(speed);
        if speed > self.max_speed { 1.0 } else { 0.0 }
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        let max_speed = self.observed.max()?;
        Some(serde_json::json!({ "max_speed": max_speed }))
    }
}
