//! Coordinates and great-circle distance.
//!
//! Distances are computed with the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`]. Coordinates are plain decimal degrees; the only
//! validation performed anywhere is a finite-number check, so out-of-range
//! latitudes or longitudes are accepted as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum accepted length of a textual location.
pub const MAX_LOCATION_LEN: usize = 128;

/// A latitude/longitude pair in decimal degrees.
///
/// # Examples
///
/// ```
/// use corridor::geo::Coordinate;
///
/// let station = Coordinate::new(18.5303, 73.8446);
/// assert_eq!(station.distance_km(&station), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Coordinate {
    /// Creates a coordinate without validation.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true when both components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Rejects NaN and infinite components.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFiniteCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// Haversine distance to `other`, in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(self, other)
    }

    /// Parses the ingestion format `Lat: <f>, Lng: <f>`.
    ///
    /// Keys are matched case-insensitively and surrounding whitespace is
    /// ignored. Anything else, including non-finite numbers, is rejected.
    pub fn parse_labeled(input: &str) -> Result<Self, ValidationError> {
        if input.len() > MAX_LOCATION_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "location".to_string(),
                max_length: MAX_LOCATION_LEN,
            });
        }

        let malformed = |reason: &str| ValidationError::MalformedLocation {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut fragments = input.split(',');
        let (Some(lat_part), Some(lng_part), None) =
            (fragments.next(), fragments.next(), fragments.next())
        else {
            return Err(malformed("expected exactly two comma-separated fragments"));
        };

        let lat = labeled_value(lat_part, "lat").map_err(|r| malformed(&r))?;
        let lng = labeled_value(lng_part, "lng").map_err(|r| malformed(&r))?;

        Ok(Self { lat, lng })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {}, Lng: {}", self.lat, self.lng)
    }
}

fn labeled_value(fragment: &str, expected_key: &str) -> Result<f64, String> {
    let Some((key, value)) = fragment.split_once(':') else {
        return Err(format!("fragment '{}' is not 'key: value'", fragment.trim()));
    };

    if !key.trim().eq_ignore_ascii_case(expected_key) {
        return Err(format!("expected key '{expected_key}', got '{}'", key.trim()));
    }

    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;

    if !value.is_finite() {
        return Err(format!("{expected_key} must be finite"));
    }

    Ok(value)
}

/// Great-circle distance between `a` and `b` in kilometres.
///
/// Pure and total: finite inputs give a finite result, NaN propagates.
#[must_use]
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
