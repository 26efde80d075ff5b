//! Reconstructed receiver state and its bounded-time history

use chrono::{DateTime, Duration, Utc};

/// Everything a device has reported about one satellite, keyed by PRN
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SatelliteState {
    pub prn: u32,
    /// Elevation above the horizon, degrees
    pub elevation: Option<f64>,
    /// Azimuth from true north, degrees
    pub azimuth: Option<f64>,
    /// Carrier-to-noise density, dB-Hz
    pub cn0: Option<f64>,
    pub is_visible: bool,
    /// Participating in the position fix
    pub is_active: bool,
}

/// Navigation state reconstructed by folding sentences onto each other
///
/// Every field is unknown until some sentence populates it, so everything is
/// optional. Satellites are identified by PRN; there is at most one entry per
/// PRN.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavState {
    /// Wall clock of the last applied sentence
    pub update_time: Option<DateTime<Utc>>,
    pub last_sentence: Option<String>,
    /// Timestamp reported by the receiver itself
    pub gps_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub height_above_sea_level: Option<f64>,
    /// Speed over ground, knots
    pub speed: Option<f64>,
    /// Course over ground, degrees
    pub course: Option<f64>,
    pub magnetic_declination: Option<f64>,
    pub geoidal_separation: Option<f64>,
    pub positional_dop: Option<f64>,
    pub horizontal_dop: Option<f64>,
    pub vertical_dop: Option<f64>,
    pub gps_quality: Option<u32>,
    pub satellites: Vec<SatelliteState>,
}

/// Gateable [NavState] fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateField {
    UpdateTime,
    GpsTime,
    Latitude,
    Longitude,
    HeightAboveSeaLevel,
    Speed,
    Course,
    MagneticDeclination,
    GeoidalSeparation,
    PositionalDop,
    HorizontalDop,
    VerticalDop,
    GpsQuality,
    Satellites,
}

/// Gateable [SatelliteState] fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SatelliteField {
    Prn,
    Elevation,
    Azimuth,
    Cn0,
    IsVisible,
    IsActive,
}

impl NavState {
    /// Whether the named field holds a value
    ///
    /// The satellite sequence and boolean flags always count as defined; only
    /// an absent optional is "missing".
    pub fn field_is_defined(&self, field: StateField) -> bool {
        match field {
            StateField::UpdateTime => self.update_time.is_some(),
            StateField::GpsTime => self.gps_time.is_some(),
            StateField::Latitude => self.latitude.is_some(),
            StateField::Longitude => self.longitude.is_some(),
            StateField::HeightAboveSeaLevel => self.height_above_sea_level.is_some(),
            StateField::Speed => self.speed.is_some(),
            StateField::Course => self.course.is_some(),
            StateField::MagneticDeclination => self.magnetic_declination.is_some(),
            StateField::GeoidalSeparation => self.geoidal_separation.is_some(),
            StateField::PositionalDop => self.positional_dop.is_some(),
            StateField::HorizontalDop => self.horizontal_dop.is_some(),
            StateField::VerticalDop => self.vertical_dop.is_some(),
            StateField::GpsQuality => self.gps_quality.is_some(),
            StateField::Satellites => true,
        }
    }

    /// True iff every named field is defined
    pub fn is_sufficiently_defined(&self, fields: &[StateField]) -> bool {
        fields.iter().all(|field| self.field_is_defined(*field))
    }

    fn field_differs(&self, reference: &NavState, field: StateField) -> bool {
        match field {
            StateField::UpdateTime => self.update_time != reference.update_time,
            StateField::GpsTime => self.gps_time != reference.gps_time,
            StateField::Latitude => self.latitude != reference.latitude,
            StateField::Longitude => self.longitude != reference.longitude,
            StateField::HeightAboveSeaLevel => {
                self.height_above_sea_level != reference.height_above_sea_level
            }
            StateField::Speed => self.speed != reference.speed,
            StateField::Course => self.course != reference.course,
            StateField::MagneticDeclination => {
                self.magnetic_declination != reference.magnetic_declination
            }
            StateField::GeoidalSeparation => self.geoidal_separation != reference.geoidal_separation,
            StateField::PositionalDop => self.positional_dop != reference.positional_dop,
            StateField::HorizontalDop => self.horizontal_dop != reference.horizontal_dop,
            StateField::VerticalDop => self.vertical_dop != reference.vertical_dop,
            StateField::GpsQuality => self.gps_quality != reference.gps_quality,
            StateField::Satellites => self.satellites != reference.satellites,
        }
    }

    /// True iff any of the named fields differs from `reference`
    ///
    /// An empty field list counts as "different" so that methods without
    /// variable fields re-evaluate on every state.
    pub fn differs_from(&self, reference: &NavState, fields: &[StateField]) -> bool {
        fields.is_empty() || fields.iter().any(|field| self.field_differs(reference, *field))
    }

    /// The satellite entry for `prn`, created on first sight
    pub fn satellite_mut(&mut self, prn: u32) -> &mut SatelliteState {
        if let Some(index) = self.satellites.iter().position(|s| s.prn == prn) {
            return &mut self.satellites[index];
        }
        self.satellites.push(SatelliteState {
            prn,
            ..SatelliteState::default()
        });
        self.satellites.last_mut().expect("just pushed")
    }
}

impl SatelliteState {
    fn field_is_defined(&self, field: SatelliteField) -> bool {
        match field {
            SatelliteField::Prn | SatelliteField::IsVisible | SatelliteField::IsActive => true,
            SatelliteField::Elevation => self.elevation.is_some(),
            SatelliteField::Azimuth => self.azimuth.is_some(),
            SatelliteField::Cn0 => self.cn0.is_some(),
        }
    }

    /// True iff every named field is defined
    pub fn is_sufficiently_defined(&self, fields: &[SatelliteField]) -> bool {
        fields.iter().all(|field| self.field_is_defined(*field))
    }
}

/// Newest-first sequence of [NavState] snapshots bounded by a wall-time window
#[derive(Clone, Debug)]
pub struct StateHistory {
    states: Vec<NavState>,
    window: Duration,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::with_window(Duration::seconds(5))
    }
}

impl StateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            states: Vec::new(),
            window,
        }
    }

    /// Take an independent snapshot of `state` and prepend it
    ///
    /// Entries older than `state.update_time - window` are dropped; the window
    /// bound is inclusive, so a 5s window holds six states sampled at 1Hz.
    pub fn add_state(&mut self, state: NavState) {
        let reference = state.update_time.map(|t| t - self.window);
        self.states.insert(0, state);
        if let Some(reference) = reference {
            self.states
                .retain(|s| s.update_time.is_some_and(|t| t >= reference));
        }
    }

    /// The i-th newest state (0 = newest), if there is one
    pub fn state(&self, index: usize) -> Option<&NavState> {
        self.states.get(index)
    }

    /// The newest state with `update_time <= reference_time`
    pub fn state_before(&self, reference_time: DateTime<Utc>) -> Option<&NavState> {
        self.states
            .iter()
            .find(|s| s.update_time.is_some_and(|t| t <= reference_time))
    }

    /// The oldest state with `update_time >= reference_time`
    pub fn state_after(&self, reference_time: DateTime<Utc>) -> Option<&NavState> {
        self.states
            .iter()
            .rev()
            .find(|s| s.update_time.is_some_and(|t| t >= reference_time))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
