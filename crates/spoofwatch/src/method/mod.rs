//! The detection-method contract, decorators, and group combinators

use std::collections::VecDeque;

use crate::config::{Config, Options};
use crate::detect::DeviceIndex;
use crate::state::{NavState, SatelliteField, StateField, StateHistory};
use crate::tle::{self, OrbitModel};
use crate::water::WaterMap;

mod carrier_noise;
mod environment;
mod height_limit;
mod multiple_receivers;
mod orbit_positions;
mod rate_of_turn;
mod speed_limit;
mod time_drift;

pub use carrier_noise::CarrierToNoiseDensity;
pub use environment::PhysicalEnvironmentLimit;
pub use height_limit::PhysicalHeightLimit;
pub use multiple_receivers::MultipleReceivers;
pub use orbit_positions::OrbitPositions;
pub use rate_of_turn::PhysicalRateOfTurnLimit;
pub use speed_limit::PhysicalSpeedLimit;
pub use time_drift::TimeDrift;

/// Static declarations the engine gates evaluations on
#[derive(Clone, Debug, Default)]
pub struct Gating {
    /// Fields that must all be defined on the latest state
    pub required_state_fields: Vec<StateField>,
    /// Fields whose change triggers a re-evaluation; empty means "always"
    pub variable_state_fields: Vec<StateField>,
    /// Fields a satellite needs before it counts towards the minimum below
    pub required_satellite_state_fields: Vec<SatelliteField>,
    pub min_sufficient_satellite_state_count: usize,
}

/// What a method may look up while computing an indicator
///
/// Methods never own or mutate the engine; sibling devices are reachable
/// through this read-only capability.
pub struct MethodContext<'a> {
    pub devices: &'a DeviceIndex,
}

/// A spoofing-detection method
///
/// `spoofing_indicator` returns a value in `[0, 1]`: 0 is clean, 1 is
/// spoof-consistent. Methods may keep rolling memory between calls.
pub trait Method: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn gating(&self) -> &Gating;

    fn spoofing_indicator(
        &mut self,
        ctx: &MethodContext,
        device_id: &str,
        latest: &NavState,
        previous: &NavState,
        history: &StateHistory,
    ) -> f64;

    /// Calibration output mirroring this method's configuration fields
    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Decorator returning the moving average of the wrapped method's indicators
///
/// The ring starts out as zeros, so the average climbs smoothly from 0: the
/// first positive raw indicator contributes 1/len to the returned value.
#[derive(Debug)]
pub struct AverageMethod {
    inner: Box<dyn Method + Send>,
    ring: VecDeque<f64>,
}

impl AverageMethod {
    pub fn new(inner: Box<dyn Method + Send>) -> Self {
        Self::with_window(inner, 100)
    }

    pub fn with_window(inner: Box<dyn Method + Send>, window: usize) -> Self {
        Self {
            inner,
            ring: std::iter::repeat_n(0.0, window).collect(),
        }
    }
}

impl Method for AverageMethod {
    fn name(&self) -> &'static str {
        "average"
    }

    fn gating(&self) -> &Gating {
        self.inner.gating()
    }

    fn spoofing_indicator(
        &mut self,
        ctx: &MethodContext,
        device_id: &str,
        latest: &NavState,
        previous: &NavState,
        history: &StateHistory,
    ) -> f64 {
        let raw = self
            .inner
            .spoofing_indicator(ctx, device_id, latest, previous, history);
        self.ring.push_front(raw);
        self.ring.pop_back();
        self.ring.iter().sum::<f64>() / self.ring.len() as f64
    }

    fn calculate_parameters(&self) -> Option<serde_json::Value> {
        self.inner.calculate_parameters()
    }
}

/// How a [GroupMethod] combines its children's indicators
#[derive(Debug)]
pub enum GroupKind {
    /// Maximum: any child alone can raise the alarm
    Or,
    /// Minimum: every child has to agree
    And,
    Average,
    /// Dot product with per-child weights summing to 1
    WeightedAverage(Vec<f64>),
}

/// A method built out of other methods
///
/// Gating declarations are unified: field lists concatenate, the satellite
/// minimum is the maximum over the children.
#[derive(Debug)]
pub struct GroupMethod {
    kind: GroupKind,
    methods: Vec<Box<dyn Method + Send>>,
    gating: Gating,
}

impl GroupMethod {
    pub fn new(kind: GroupKind, methods: Vec<Box<dyn Method + Send>>) -> eyre::Result<Self> {
        if methods.is_empty() {
            eyre::bail!("A method group needs at least one member");
        }
        if let GroupKind::WeightedAverage(weights) = &kind {
            if weights.len() != methods.len() {
                eyre::bail!(
                    "Got {} weights for {} methods",
                    weights.len(),
                    methods.len()
                );
            }
            let total: f64 = weights.iter().sum();
            if (total - 1.0).abs() > 1e-9 {
                eyre::bail!("Method weights must sum to 1, got {total}");
            }
        }
        let mut gating = Gating::default();
        for method in &methods {
            let child = method.gating();
            gating
                .required_state_fields
                .extend_from_slice(&child.required_state_fields);
            gating
                .variable_state_fields
                .extend_from_slice(&child.variable_state_fields);
            gating
                .required_satellite_state_fields
                .extend_from_slice(&child.required_satellite_state_fields);
            gating.min_sufficient_satellite_state_count = gating
                .min_sufficient_satellite_state_count
                .max(child.min_sufficient_satellite_state_count);
        }
        Ok(Self {
            kind,
            methods,
            gating,
        })
    }
}

impl Method for GroupMethod {
    fn name(&self) -> &'static str {
        match self.kind {
            GroupKind::Or => "or-group",
            GroupKind::And => "and-group",
            GroupKind::Average => "average-group",
            GroupKind::WeightedAverage(_) => "weighted-average-group",
        }
    }

    fn gating(&self) -> &Gating {
        &self.gating
    }

    fn spoofing_indicator(
        &mut self,
        ctx: &MethodContext,
        device_id: &str,
        latest: &NavState,
        previous: &NavState,
        history: &StateHistory,
    ) -> f64 {
        let indicators: Vec<f64> = self
            .methods
            .iter_mut()
            .map(|m| m.spoofing_indicator(ctx, device_id, latest, previous, history))
            .collect();
        match &self.kind {
            GroupKind::Or => indicators.into_iter().fold(0.0, f64::max),
            GroupKind::And => indicators.into_iter().fold(1.0, f64::min),
            GroupKind::Average => indicators.iter().sum::<f64>() / indicators.len() as f64,
            GroupKind::WeightedAverage(weights) => {
                itertools::izip!(weights, &indicators)
                    .map(|(weight, indicator)| weight * indicator)
                    .sum()
            }
        }
    }
}

/// Build the configured methods from the fixed catalog
///
/// Names are matched case-insensitively, with or without a `Method` suffix.
pub fn build_methods(config: &Config) -> eyre::Result<Vec<Box<dyn Method + Send>>> {
    config
        .methods
        .iter()
        .map(|name| build_method(name, &config.options))
        .collect()
}

fn build_method(name: &str, options: &Options) -> eyre::Result<Box<dyn Method + Send>> {
    let normalized = name.to_ascii_lowercase();
    let normalized = normalized.strip_suffix("method").unwrap_or(&normalized);
    match normalized {
        "multiplereceivers" => Ok(Box::new(MultipleReceivers::new(
            options.distance_pairs()?,
            options.distance_ratio_threshold_pairs()?,
            options.new_measurement_weight,
        ))),
        "physicalspeedlimit" => Ok(Box::new(PhysicalSpeedLimit::new(require(
            options.max_speed,
            name,
            "max_speed",
        )?))),
        "physicalrateofturnlimit" => Ok(Box::new(PhysicalRateOfTurnLimit::new(
            require(options.max_rate_of_turn, name, "max_rate_of_turn")?,
            require(
                options.min_speed_to_determine_rate_of_turn,
                name,
                "min_speed_to_determine_rate_of_turn",
            )?,
        ))),
        "physicalheightlimit" => Ok(Box::new(PhysicalHeightLimit::new(
            require(options.min_height, name, "min_height")?,
            require(options.max_height, name, "max_height")?,
        ))),
        "physicalenvironmentlimit" => {
            let path = options
                .water_map
                .as_ref()
                .ok_or_else(|| eyre::eyre!("Method {name:?} requires option \"water_map\""))?;
            let water_map = WaterMap::open(path)?;
            Ok(Box::new(PhysicalEnvironmentLimit::new(
                require(options.on_land, name, "on_land")?,
                require(options.on_water, name, "on_water")?,
                Box::new(water_map),
            )))
        }
        "orbitpositions" => {
            let path = options
                .tle_catalog
                .as_ref()
                .ok_or_else(|| eyre::eyre!("Method {name:?} requires option \"tle_catalog\""))?;
            let catalog: Vec<Box<dyn OrbitModel + Send>> = tle::load_catalog(path)?
                .into_iter()
                .map(|element| Box::new(element) as Box<dyn OrbitModel + Send>)
                .collect();
            Ok(Box::new(OrbitPositions::new(
                require(options.min_elevation, name, "min_elevation")?,
                require(
                    options.allowed_azimuth_deviation,
                    name,
                    "allowed_azimuth_deviation",
                )?,
                require(
                    options.allowed_elevation_deviation,
                    name,
                    "allowed_elevation_deviation",
                )?,
                catalog,
            )))
        }
        "timedrift" => Ok(Box::new(TimeDrift::new(require(
            options.max_clock_drift_dev,
            name,
            "max_clock_drift_dev",
        )?))),
        "carriertonoisedensity" => Ok(Box::new(CarrierToNoiseDensity::new(
            require(
                options.min_carrier_to_noise_density,
                name,
                "min_carrier_to_noise_density",
            )?,
            require(
                options.max_carrier_to_noise_density,
                name,
                "max_carrier_to_noise_density",
            )?,
        ))),
        _ => eyre::bail!("Unknown detection method {name:?}"),
    }
}

fn require<T: Copy>(value: Option<T>, method: &str, option: &str) -> eyre::Result<T> {
    value.ok_or_else(|| eyre::eyre!("Method {method:?} requires option {option:?}"))
}
