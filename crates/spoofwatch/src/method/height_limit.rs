//! Reported antenna height against a plausible band

use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};
use crate::stats::MinMax;

#[derive(Debug)]
pub struct PhysicalHeightLimit {
    gating: Gating,
    min_height: f64,
    max_height: f64,
    observed: MinMax,
}

impl PhysicalHeightLimit {
    pub fn new(min_height: f64, max_height: f64) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![StateField::HeightAboveSeaLevel],
                variable_state_fields: vec![StateField::HeightAboveSeaLevel],
                ..Gating::default()
            },
            min_height,
            max_height,
            observed: MinMax::new(),
        }
    }
}

impl Method for PhysicalHeightLimit {
    fn name(&self) -> &'static str {
        "physical-height-limit"
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
        let Some(height) = latest.height_above_sea_level else {
            return 0.0;
        };
        self.observed.update(height);
        if (self.min_height..=self.max_height).contains(&height) {
            0.0
        } else {
            1.0
        }
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "min_height": self.observed.min()?,
            "max_height": self.observed.max()?,
        }))
    }
}
