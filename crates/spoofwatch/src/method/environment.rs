//! Reported position against the environment the platform can occupy
//!
//! A ship has no business being on a motorway, nor a truck in the North Sea.

use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, StateField, StateHistory};
use crate::water::WaterLookup;

pub struct PhysicalEnvironmentLimit {
    gating: Gating,
    on_land: bool,
    on_water: bool,
    water_map: Box<dyn WaterLookup + Send>,
    seen_on_land: bool,
    seen_on_water: bool,
}

impl std::fmt::Debug for PhysicalEnvironmentLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalEnvironmentLimit")
            .field("gating", &self.gating)
            .field("on_land", &self.on_land)
            .field("on_water", &self.on_water)
            .field("seen_on_land", &self.seen_on_land)
            .field("seen_on_water", &self.seen_on_water)
            .finish_non_exhaustive()
    }
}

impl PhysicalEnvironmentLimit {
    pub fn new(on_land: bool, on_water: bool, water_map: Box<dyn WaterLookup + Send>) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![StateField::Latitude, StateField::Longitude],
                variable_state_fields: vec![StateField::Latitude, StateField::Longitude],
                ..Gating::default()
            },
            on_land,
            on_water,
            water_map,
            seen_on_land: false,
            seen_on_water: false,
        }
    }
}

impl Method for PhysicalEnvironmentLimit {
    fn name(&self) -> &'static str {
        "physical-environment-limit"
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
        // Amphibious platforms can be anywhere; platforms allowed nowhere are
        // spoofed wherever they claim to be
        if self.on_water && self.on_land {
            return 0.0;
        }
        if !self.on_water && !self.on_land {
            return 1.0;
        }
        let (Some(latitude), Some(longitude)) = (latest.latitude, latest.longitude) else {
            return 0.0;
        };
        let is_on_water = self.water_map.is_on_water(latitude, longitude);
        let is_on_land = self.water_map.is_on_land(latitude, longitude);
        self.seen_on_water |= is_on_water;
        self.seen_on_land |= is_on_land;
        if (self.on_water && !is_on_water) || (self.on_land && !is_on_land) {
            1.0
        } else {
            0.0
        }
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "on_land": self.seen_on_land,
            "on_water": self.seen_on_water,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::tests::indicate_states;

    struct FakeWater {
        water: bool,
        land: bool,
    }

    impl WaterLookup for FakeWater {
        fn is_on_water(&self, _latitude: f64, _longitude: f64) -> bool {
            self.water
        }

        fn is_on_land(&self, _latitude: f64, _longitude: f64) -> bool {
            self.land
        }
    }

    fn positioned_state() -> NavState {
        NavState {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..NavState::default()
        }
    }

    #[test]
    fn test_environment_consistency() {
        // (is_on_water, is_on_land, on_water, on_land, expected)
        let cases = [
            (false, false, true, true, 0.0),
            (true, true, false, false, 1.0),
            (true, false, true, false, 0.0),
            (false, true, false, true, 0.0),
            (false, true, true, false, 1.0),
            (true, false, false, true, 1.0),
        ];
        for (is_on_water, is_on_land, on_water, on_land, expected) in cases {
            let lookup = FakeWater {
                water: is_on_water,
                land: is_on_land,
            };
            let mut method = PhysicalEnvironmentLimit::new(on_land, on_water, Box::new(lookup));
            let latest = positioned_state();
            assert_eq!(
                indicate_states(&mut method, &latest, &NavState::default()),
                expected,
                "water={is_on_water} land={is_on_land} on_water={on_water} on_land={on_land}"
            );
        }
    }

    #[test]
    fn test_calibration_remembers_visited_environments() {
        let lookup = FakeWater {
            water: true,
            land: false,
        };
        let mut method = PhysicalEnvironmentLimit::new(false, true, Box::new(lookup));
        indicate_states(&mut method, &positioned_state(), &NavState::default());
        let parameters = method.calculate_parameters().unwrap();
        assert_eq!(parameters["on_water"], true);
        assert_eq!(parameters["on_land"], false);
    }
}
