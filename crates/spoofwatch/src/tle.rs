//! GPS-constellation ephemeris from a two-line-element catalog
//!
//! The catalog file holds three lines per satellite: the PRN, then the two
//! element lines. It is read once at startup and immutable afterwards.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::WrapErr;

/// Where a satellite should appear in the sky, seen from a ground observer
///
/// Seam for tests: the orbit-positions method only cares about this view, not
/// about how it was computed.
pub trait OrbitModel {
    fn prn(&self) -> u32;

    /// Expected `(elevation, azimuth)` in degrees at `time` for an observer at
    /// the given geodetic position (`height` in meters). `None` when the
    /// elements fail to propagate to that instant.
    fn observer_view(
        &self,
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        height: f64,
    ) -> Option<(f64, f64)>;
}

/// One catalog entry, backed by an SGP4 propagator
pub struct TwoLineElement {
    prn: u32,
    epoch: NaiveDateTime,
    constants: sgp4::Constants,
}

impl TwoLineElement {
    pub fn new(prn: u32, line1: &str, line2: &str) -> eyre::Result<Self> {
        let elements = sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| eyre::eyre!("Failed to parse TLE for PRN {prn}: {e}"))?;
        let epoch = elements.datetime;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| eyre::eyre!("Failed to initialize propagator for PRN {prn}: {e}"))?;
        Ok(Self {
            prn,
            epoch,
            constants,
        })
    }
}

impl OrbitModel for TwoLineElement {
    fn prn(&self) -> u32 {
        self.prn
    }

    fn observer_view(
        &self,
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        height: f64,
    ) -> Option<(f64, f64)> {
        let minutes = (time.naive_utc() - self.epoch).num_milliseconds() as f64 / 60_000.0;
        let prediction = self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .ok()?;

        // SGP4 predicts in the TEME frame; rotate by the Greenwich sidereal
        // angle to get an Earth-fixed position.
        let [x, y, z] = prediction.position;
        let theta = gmst_radians(time);
        let (sin_theta, cos_theta) = theta.sin_cos();
        let satellite = [
            cos_theta * x + sin_theta * y,
            -sin_theta * x + cos_theta * y,
            z,
        ];

        let observer = geodetic_to_ecef(latitude, longitude, height / 1000.0);
        let range = [
            satellite[0] - observer[0],
            satellite[1] - observer[1],
            satellite[2] - observer[2],
        ];
        let distance = (range[0] * range[0] + range[1] * range[1] + range[2] * range[2]).sqrt();
        if distance == 0.0 {
            return None;
        }

        let (sin_phi, cos_phi) = latitude.to_radians().sin_cos();
        let (sin_lambda, cos_lambda) = longitude.to_radians().sin_cos();
        let south = sin_phi * cos_lambda * range[0] + sin_phi * sin_lambda * range[1]
            - cos_phi * range[2];
        let east = -sin_lambda * range[0] + cos_lambda * range[1];
        let up = cos_phi * cos_lambda * range[0] + cos_phi * sin_lambda * range[1]
            + sin_phi * range[2];

        let elevation = (up / distance).asin().to_degrees();
        let azimuth = east.atan2(-south).to_degrees().rem_euclid(360.0);
        Some((elevation, azimuth))
    }
}

/// Greenwich mean sidereal angle (IAU 1982), radians
fn gmst_radians(time: DateTime<Utc>) -> f64 {
    let julian_date = 2_440_587.5 + time.timestamp_millis() as f64 / 86_400_000.0;
    let t = (julian_date - 2_451_545.0) / 36_525.0;
    let seconds = 67_310.54841
        + (876_600.0 * 3_600.0 + 8_640_184.812866) * t
        + 0.093104 * t * t
        - 6.2e-6 * t * t * t;
    seconds.rem_euclid(86_400.0) / 86_400.0 * std::f64::consts::TAU
}

/// WGS-84 geodetic position to Earth-fixed cartesian, kilometers
fn geodetic_to_ecef(latitude: f64, longitude: f64, height_km: f64) -> [f64; 3] {
    const SEMI_MAJOR_KM: f64 = 6378.137;
    const FLATTENING: f64 = 1.0 / 298.257223563;
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let (sin_phi, cos_phi) = latitude.to_radians().sin_cos();
    let (sin_lambda, cos_lambda) = longitude.to_radians().sin_cos();
    let n = SEMI_MAJOR_KM / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    [
        (n + height_km) * cos_phi * cos_lambda,
        (n + height_km) * cos_phi * sin_lambda,
        (n * (1.0 - e2) + height_km) * sin_phi,
    ]
}

/// Read a `PRN\nline1\nline2` catalog file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> eyre::Result<Vec<TwoLineElement>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read TLE catalog {path:?}"))?;
    parse_catalog(&text).wrap_err_with(|| format!("Malformed TLE catalog {path:?}"))
}

pub fn parse_catalog(text: &str) -> eyre::Result<Vec<TwoLineElement>> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() % 3 != 0 {
        eyre::bail!(
            "Expected groups of PRN/line1/line2, got {} non-empty lines",
            lines.len()
        );
    }
    let mut catalog = Vec::with_capacity(lines.len() / 3);
    for group in lines.chunks(3) {
        let prn: u32 = group[0]
            .trim()
            .parse()
            .wrap_err_with(|| format!("Failed to parse PRN line {:?}", group[0]))?;
        catalog.push(TwoLineElement::new(prn, group[1], group[2])?);
    }
    Ok(catalog)
}
