//! NMEA 0183 sentence parsing
//!
//! Sentences are *folded* onto an existing [NavState]: each supported packet
//! type overwrites the navigation fields it carries and leaves the rest
//! untouched, so the state accumulates across a burst of RMC/GGA/GSA/GSV
//! sentences.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::state::NavState;

/// Why a sentence could not be applied
///
/// The detection engine drops every variant silently; the distinctions matter
/// to tests and to anyone replaying a capture by hand.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Missing `$` framing or `*XX` checksum trailer
    #[error("malformed NMEA frame {0:?}")]
    InvalidFrame(String),
    #[error("checksum mismatch (calculated {calculated:#04x}, found {found:#04x})")]
    ChecksumMismatch { calculated: u8, found: u8 },
    /// A checksum-valid sentence carrying an unparseable field
    #[error("malformed NMEA field {0:?}")]
    InvalidField(String),
    /// Valid frame with a descriptor outside the supported set
    #[error("unsupported NMEA sentence type {0:?}")]
    Unsupported(String),
}

/// XOR of every byte between `$` and `*`, exclusive
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |c, b| c ^ b)
}

/// Fold one sentence onto `state`
///
/// `Ok(None)` signals an inactive-status sentence (RMC/GLL with status other
/// than `A`): the receiver had no fix and the state must not be kept.
pub fn fold(
    mut state: NavState,
    update_time: DateTime<Utc>,
    sentence: &str,
) -> Result<Option<NavState>, ParseError> {
    let bytes = sentence.as_bytes();
    if !sentence.is_ascii() || bytes.len() < 4 || bytes[0] != b'$' || bytes[bytes.len() - 3] != b'*'
    {
        return Err(ParseError::InvalidFrame(sentence.to_string()));
    }
    let body = &sentence[1..sentence.len() - 3];
    let found = u8::from_str_radix(&sentence[sentence.len() - 2..], 16)
        .map_err(|_| ParseError::InvalidFrame(sentence.to_string()))?;
    let calculated = checksum(body.as_bytes());
    if calculated != found {
        return Err(ParseError::ChecksumMismatch { calculated, found });
    }

    let fields: Vec<&str> = body.split(',').collect();
    let descriptor = fields[0];
    let talker = descriptor.get(..2).unwrap_or_default().to_ascii_lowercase();
    let packet = descriptor.get(2..).unwrap_or_default().to_ascii_lowercase();

    state.last_sentence = Some(sentence.to_string());
    state.update_time = Some(update_time);

    let fields = &fields[1..];
    match (talker.as_str(), packet.as_str()) {
        ("gp", "rmc") => fold_rmc(state, fields),
        ("gp", "gga") => fold_gga(state, fields),
        ("gp", "gll") => fold_gll(state, fields),
        ("gp", "vtg") => fold_vtg(state, fields),
        ("gp", "gsa") => fold_gsa(state, fields),
        ("gp", "gsv") => fold_gsv(state, fields),
        _ => Err(ParseError::Unsupported(descriptor.to_string())),
    }
}

/// Recommended minimum: fix time/date, position, speed, course, declination
fn fold_rmc(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    if field(fields, 1) != "A" {
        return Ok(None);
    }
    let (latitude, longitude) = parse_latitude_longitude(
        field(fields, 2),
        field(fields, 3),
        field(fields, 4),
        field(fields, 5),
    )?;
    state.gps_time = parse_datetime(field(fields, 0), field(fields, 8))?;
    state.latitude = latitude;
    state.longitude = longitude;
    state.speed = parse_f64(field(fields, 6))?;
    state.course = parse_f64(field(fields, 7))?;
    state.magnetic_declination =
        parse_magnetic_declination(field(fields, 9), field(fields, 10))?;
    Ok(Some(state))
}

/// Fix data: position, quality, HDOP, antenna height, geoidal separation
fn fold_gga(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    let (latitude, longitude) = parse_latitude_longitude(
        field(fields, 1),
        field(fields, 2),
        field(fields, 3),
        field(fields, 4),
    )?;
    state.latitude = latitude;
    state.longitude = longitude;
    state.gps_quality = parse_u32(field(fields, 5))?;
    state.horizontal_dop = parse_f64(field(fields, 7))?;
    state.height_above_sea_level = parse_f64(field(fields, 8))?;
    state.geoidal_separation = parse_f64(field(fields, 10))?;
    Ok(Some(state))
}

fn fold_gll(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    if field(fields, 5) != "A" {
        return Ok(None);
    }
    let (latitude, longitude) = parse_latitude_longitude(
        field(fields, 0),
        field(fields, 1),
        field(fields, 2),
        field(fields, 3),
    )?;
    state.latitude = latitude;
    state.longitude = longitude;
    Ok(Some(state))
}

fn fold_vtg(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    state.course = parse_f64(field(fields, 0))?;
    state.speed = parse_f64(field(fields, 4))?;
    Ok(Some(state))
}

/// Active satellites and dilution of precision
fn fold_gsa(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    for satellite in &mut state.satellites {
        satellite.is_active = false;
    }
    for i in 0..12 {
        let Some(prn) = parse_u32(field(fields, 2 + i))? else {
            continue;
        };
        state.satellite_mut(prn).is_active = true;
    }
    state.positional_dop = parse_f64(field(fields, 14))?;
    state.horizontal_dop = parse_f64(field(fields, 15))?;
    state.vertical_dop = parse_f64(field(fields, 16))?;
    Ok(Some(state))
}

/// Satellites in view, spread over a numbered message sequence
///
/// The first message of a sequence clears visibility on every known
/// satellite; each block then upserts one satellite by PRN.
fn fold_gsv(mut state: NavState, fields: &[&str]) -> Result<Option<NavState>, ParseError> {
    let message_number = parse_u32(field(fields, 1))?
        .ok_or_else(|| ParseError::InvalidField(field(fields, 1).to_string()))?;
    let satellite_count = parse_u32(field(fields, 2))?
        .ok_or_else(|| ParseError::InvalidField(field(fields, 2).to_string()))?;
    if message_number == 1 {
        for satellite in &mut state.satellites {
            satellite.is_visible = false;
        }
    }
    let satellites_in_message = if message_number.saturating_mul(4) > satellite_count {
        satellite_count % 4
    } else {
        4
    };
    for i in 0..satellites_in_message as usize {
        let base = 3 + i * 4;
        let Some(prn) = parse_u32(field(fields, base))? else {
            continue;
        };
        let elevation = parse_f64(field(fields, base + 1))?;
        let azimuth = parse_f64(field(fields, base + 2))?;
        let cn0 = parse_f64(field(fields, base + 3))?;
        let satellite = state.satellite_mut(prn);
        satellite.elevation = elevation;
        satellite.azimuth = azimuth;
        satellite.cn0 = cn0;
        satellite.is_visible = true;
    }
    Ok(Some(state))
}

/// Field access that treats truncated sentences as trailing empty fields
fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or_default()
}

fn parse_f64(token: &str) -> Result<Option<f64>, ParseError> {
    if token.is_empty() {
        return Ok(None);
    }
    token
        .parse()
        .map(Some)
        .map_err(|_| ParseError::InvalidField(token.to_string()))
}

fn parse_u32(token: &str) -> Result<Option<u32>, ParseError> {
    if token.is_empty() {
        return Ok(None);
    }
    token
        .parse()
        .map(Some)
        .map_err(|_| ParseError::InvalidField(token.to_string()))
}

/// `DDMM.mmmm`/`DDDMM.mmmm` plus hemisphere letters into signed degrees
///
/// Any missing component leaves both coordinates undefined.
fn parse_latitude_longitude(
    latitude: &str,
    latitude_dir: &str,
    longitude: &str,
    longitude_dir: &str,
) -> Result<(Option<f64>, Option<f64>), ParseError> {
    if latitude.is_empty() || latitude_dir.is_empty() || longitude.is_empty() || longitude_dir.is_empty()
    {
        return Ok((None, None));
    }
    let latitude = parse_angular(latitude, 2)? * if latitude_dir == "N" { 1.0 } else { -1.0 };
    let longitude = parse_angular(longitude, 3)? * if longitude_dir == "E" { 1.0 } else { -1.0 };
    Ok((Some(latitude), Some(longitude)))
}

fn parse_angular(token: &str, degree_digits: usize) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidField(token.to_string());
    let degrees: f64 = token.get(..degree_digits).ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let minutes: f64 = token.get(degree_digits..).ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    Ok(degrees + minutes / 60.0)
}

/// `ddmmyy` date plus `HHMMSS.fff` time into a UTC instant
fn parse_datetime(time: &str, date: &str) -> Result<Option<DateTime<Utc>>, ParseError> {
    if time.is_empty() || date.is_empty() {
        return Ok(None);
    }
    let combined = format!("{date}{time}");
    NaiveDateTime::parse_from_str(&combined, "%d%m%y%H%M%S%.f")
        .map(|t| Some(t.and_utc()))
        .map_err(|_| ParseError::InvalidField(combined))
}

fn parse_magnetic_declination(value: &str, direction: &str) -> Result<Option<f64>, ParseError> {
    if value.is_empty() || direction.is_empty() {
        return Ok(None);
    }
    let sign = if direction == "E" { 1.0 } else { -1.0 };
    Ok(parse_f64(value)?.map(|v| sign * v))
}
