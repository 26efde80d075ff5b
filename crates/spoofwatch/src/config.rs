//! Detector configuration
//!
//! A JSON file names the monitored devices, the methods to run, and one
//! shared options object the method registry pulls from. Map options may use
//! `"A,B"` keys, read as unordered device pairs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::WrapErr;
use serde::Deserialize;

/// An unordered receiver pair, stored in sorted order
pub type DevicePair = (String, String);

/// Normalize a pair so `(A,B)` and `(B,A)` compare equal
pub fn device_pair(a: &str, b: &str) -> DevicePair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub device_ids: Vec<String>,
    /// Method names from the fixed catalog, case-insensitive
    pub methods: Vec<String>,
    #[serde(default)]
    pub options: Options,
}

/// The union of every method's options; the registry enforces which ones a
/// configured method actually needs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Options {
    // multiple-receivers
    pub distances: HashMap<String, f64>,
    pub distance_ratio_thresholds: HashMap<String, f64>,
    pub new_measurement_weight: f64,

    // physical-speed-limit
    pub max_speed: Option<f64>,

    // physical-rate-of-turn-limit
    pub max_rate_of_turn: Option<f64>,
    pub min_speed_to_determine_rate_of_turn: Option<f64>,

    // physical-height-limit
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,

    // physical-environment-limit
    pub on_land: Option<bool>,
    pub on_water: Option<bool>,
    pub water_map: Option<PathBuf>,

    // orbit-positions
    pub min_elevation: Option<f64>,
    pub allowed_azimuth_deviation: Option<f64>,
    pub allowed_elevation_deviation: Option<f64>,
    pub tle_catalog: Option<PathBuf>,

    // time-drift
    pub max_clock_drift_dev: Option<f64>,

    // carrier-to-noise-density
    pub min_carrier_to_noise_density: Option<f64>,
    pub max_carrier_to_noise_density: Option<f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            distances: HashMap::new(),
            distance_ratio_thresholds: HashMap::new(),
            new_measurement_weight: 0.1,
            max_speed: None,
            max_rate_of_turn: None,
            min_speed_to_determine_rate_of_turn: None,
            min_height: None,
            max_height: None,
            on_land: None,
            on_water: None,
            water_map: None,
            min_elevation: None,
            allowed_azimuth_deviation: None,
            allowed_elevation_deviation: None,
            tle_catalog: None,
            max_clock_drift_dev: None,
            min_carrier_to_noise_density: None,
            max_carrier_to_noise_density: None,
        }
    }
}

impl Options {
    pub fn distance_pairs(&self) -> eyre::Result<HashMap<DevicePair, f64>> {
        pair_map(&self.distances)
    }

    pub fn distance_ratio_threshold_pairs(&self) -> eyre::Result<HashMap<DevicePair, f64>> {
        pair_map(&self.distance_ratio_thresholds)
    }
}

fn pair_map(raw: &HashMap<String, f64>) -> eyre::Result<HashMap<DevicePair, f64>> {
    raw.iter()
        .map(|(key, value)| Ok((parse_pair(key)?, *value)))
        .collect()
}

/// Parse an `"A,B"` key; spaces around the ids are tolerated
pub fn parse_pair(key: &str) -> eyre::Result<DevicePair> {
    let cleaned = key.replace(' ', "");
    let mut parts = cleaned.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => Ok(device_pair(a, b)),
        _ => eyre::bail!("Expected an \"A,B\" device pair, got {key:?}"),
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> eyre::Result<Config> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read configuration {path:?}"))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("Malformed configuration {path:?}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const EXAMPLE: &str = r#"{
        "device_ids": ["10.0.0.1", "10.0.0.2"],
        "methods": ["MultipleReceiversMethod", "PhysicalSpeedLimitMethod"],
        "options": {
            "distances": {"10.0.0.1, 10.0.0.2": 1.5},
            "distance_ratio_thresholds": {"10.0.0.2,10.0.0.1": 0.5},
            "max_speed": 50
        }
    }"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_json::from_str(EXAMPLE).unwrap();
        assert_eq!(config.device_ids, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.methods.len(), 2);
        assert_eq!(config.options.max_speed, Some(50.0));
        assert_eq!(config.options.new_measurement_weight, 0.1);

        let pair = device_pair("10.0.0.1", "10.0.0.2");
        let distances = config.options.distance_pairs().unwrap();
        assert_eq!(distances[&pair], 1.5);
        // Key order does not matter for pair lookups
        let thresholds = config.options.distance_ratio_threshold_pairs().unwrap();
        assert_eq!(thresholds[&pair], 0.5);
    }

    #[test]
    fn test_options_are_optional() {
        let config: Config =
            serde_json::from_str(r#"{"device_ids": [], "methods": []}"#).unwrap();
        assert!(config.options.max_speed.is_none());
        assert_eq!(config.options.new_measurement_weight, 0.1);
    }

    #[test]
    fn test_pair_keys_are_unordered() {
        assert_eq!(device_pair("B", "A"), device_pair("A", "B"));
        assert_eq!(parse_pair("A, B").unwrap(), parse_pair("B,A").unwrap());
    }

    #[test]
    fn test_bad_pair_keys() {
        assert!(parse_pair("AB").is_err());
        assert!(parse_pair("A,B,C").is_err());
        assert!(parse_pair(",B").is_err());
    }

    #[test]
    fn test_load_config() {
        let file = spoofwatch_test::tempfile(EXAMPLE).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.methods.len(), 2);

        let broken = spoofwatch_test::tempfile("{not json").unwrap();
        assert!(load_config(broken.path()).is_err());
        assert!(load_config("/no/such/file.json").is_err());
    }
}
