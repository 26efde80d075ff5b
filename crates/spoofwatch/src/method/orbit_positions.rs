//! Reported satellite sky positions against the published constellation
//!
//! A spoofer can fake pseudoranges but rarely bothers to fake a sky view that
//! matches the real constellation geometry for the claimed time and place.

use crate::geo::minimum_angle_difference;
use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, SatelliteField, StateField, StateHistory};
use crate::tle::OrbitModel;

pub struct OrbitPositions {
    gating: Gating,
    min_elevation: f64,
    allowed_azimuth_deviation: f64,
    allowed_elevation_deviation: f64,
    catalog: Vec<Box<dyn OrbitModel + Send>>,
}

impl std::fmt::Debug for OrbitPositions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrbitPositions")
            .field("gating", &self.gating)
            .field("min_elevation", &self.min_elevation)
            .field("allowed_azimuth_deviation", &self.allowed_azimuth_deviation)
            .field(
                "allowed_elevation_deviation",
                &self.allowed_elevation_deviation,
            )
            .field("catalog_len", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl OrbitPositions {
    pub fn new(
        min_elevation: f64,
        allowed_azimuth_deviation: f64,
        allowed_elevation_deviation: f64,
        catalog: Vec<Box<dyn OrbitModel + Send>>,
    ) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![
                    StateField::UpdateTime,
                    StateField::Latitude,
                    StateField::Longitude,
                    StateField::HeightAboveSeaLevel,
                    StateField::Satellites,
                ],
                variable_state_fields: vec![StateField::Satellites],
                required_satellite_state_fields: vec![
                    SatelliteField::Prn,
                    SatelliteField::IsVisible,
                    SatelliteField::Azimuth,
                    SatelliteField::Elevation,
                ],
                min_sufficient_satellite_state_count: 1,
            },
            min_elevation,
            allowed_azimuth_deviation,
            allowed_elevation_deviation,
            catalog,
        }
    }

    fn orbit_model(&self, prn: u32) -> Option<&(dyn OrbitModel + Send)> {
        self.catalog
            .iter()
            .find(|model| model.prn() == prn)
            .map(|model| model.as_ref())
    }
}

impl Method for OrbitPositions {
    fn name(&self) -> &'static str {
        "orbit-positions"
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
        let (Some(time), Some(latitude), Some(longitude), Some(height)) = (
            latest.update_time,
            latest.latitude,
            latest.longitude,
            latest.height_above_sea_level,
        ) else {
            return 0.0;
        };
        let mut anomalous = 0usize;
        let mut counter = 0usize;
        for satellite in &latest.satellites {
            if !satellite.is_sufficiently_defined(&self.gating.required_satellite_state_fields) {
                continue;
            }
            if !satellite.is_visible {
                continue;
            }
            let (Some(reported_elevation), Some(reported_azimuth)) =
                (satellite.elevation, satellite.azimuth)
            else {
                continue;
            };
            let Some(model) = self.orbit_model(satellite.prn) else {
                continue;
            };
            let Some((expected_elevation, expected_azimuth)) =
                model.observer_view(time, latitude, longitude, height)
            else {
                continue;
            };
            let azimuth_deviation = minimum_angle_difference(expected_azimuth, reported_azimuth);
            let elevation_deviation =
                minimum_angle_difference(expected_elevation, reported_elevation);
            if reported_elevation < self.min_elevation
                || azimuth_deviation > self.allowed_azimuth_deviation
                || elevation_deviation > self.allowed_elevation_deviation
            {
                anomalous += 1;
            }
            counter += 1;
        }
        if counter > 0 {
            anomalous as f64 / counter as f64
        } else {
            0.0
        }
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({}))
    }
}
