//! Carrier-to-noise density of visible satellites against the usual band
//!
//! Spoofers tend to transmit at suspiciously uniform, often excessive power;
//! genuine satellites mostly sit between 30 and 50 dB-Hz.

use crate::method::{Gating, Method, MethodContext};
use crate::state::{NavState, SatelliteField, StateField, StateHistory};

#[derive(Debug)]
pub struct CarrierToNoiseDensity {
    gating: Gating,
    min_carrier_to_noise_density: f64,
    max_carrier_to_noise_density: f64,
}

impl CarrierToNoiseDensity {
    pub fn new(min_carrier_to_noise_density: f64, max_carrier_to_noise_density: f64) -> Self {
        Self {
            gating: Gating {
                required_state_fields: vec![StateField::Satellites],
                variable_state_fields: vec![StateField::Satellites],
                required_satellite_state_fields: vec![
                    SatelliteField::IsVisible,
                    SatelliteField::Cn0,
                ],
                min_sufficient_satellite_state_count: 1,
            },
            min_carrier_to_noise_density,
            max_carrier_to_noise_density,
        }
    }
}

impl Method for CarrierToNoiseDensity {
    fn name(&self) -> &'static str {
        "carrier-to-noise-density"
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
        let mut anomalous = 0usize;
        let mut counter = 0usize;
        for satellite in &latest.satellites {
            if !satellite.is_sufficiently_defined(&self.gating.required_satellite_state_fields) {
                continue;
            }
            if !satellite.is_visible {
                continue;
            }
            let Some(cn0) = satellite.cn0 else {
                continue;
            };
            if cn0 < self.min_carrier_to_noise_density || cn0 > self.max_carrier_to_noise_density {
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
}
