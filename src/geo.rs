//! Great-circle distance between two points on Earth.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AdventureError, Result};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Builds a coordinate pair, rejecting values outside
    /// latitude [-90, 90] and longitude [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid_latitude = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let valid_longitude = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);

        if !(valid_latitude && valid_longitude) {
            return Err(AdventureError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }

        Ok(Coordinates {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Haversine distance in kilometers, rounded to two decimal places.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_phi = (to.latitude - from.latitude).to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    round_to_cents(EARTH_RADIUS_KM * c)
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distance between the user and a place, which may not be computable yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    Known(f64),
    /// One of the endpoints is missing, e.g. no location fix yet
    Unknown,
}

impl Distance {
    /// Computes the distance only when both endpoints are present.
    pub fn between(from: Option<Coordinates>, to: Option<Coordinates>) -> Self {
        match (from, to) {
            (Some(from), Some(to)) => Distance::Known(distance_km(from, to)),
            _ => Distance::Unknown,
        }
    }

    pub fn km(&self) -> Option<f64> {
        match self {
            Distance::Known(km) => Some(*km),
            Distance::Unknown => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Known(km) => write!(f, "{:.2} km", km),
            Distance::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates::new(latitude, longitude).unwrap()
    }

    #[test]
    fn sao_paulo_to_rio() {
        let sao_paulo = point(-23.5505, -46.6333);
        let rio = point(-22.9068, -43.1729);

        let km = distance_km(sao_paulo, rio);
        assert!((km - 360.0).abs() < 1.5, "got {km}");
        assert_eq!(km, 360.75);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (point(-23.5505, -46.6333), point(-22.9068, -43.1729)),
            (point(51.5074, -0.1278), point(40.7128, -74.0060)),
            (point(-33.8688, 151.2093), point(35.6762, 139.6503)),
            (point(0.0, 179.9), point(0.0, -179.9)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance_km(a, b), distance_km(b, a));
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        for p in [point(10.0, 20.0), point(-90.0, 0.0), point(45.1, -120.7)] {
            assert_eq!(distance_km(p, p), 0.0);
        }
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let km = distance_km(point(0.0, 0.0), point(0.0, 180.0));
        assert_eq!(km, 20015.09);
    }

    #[test]
    fn output_has_at_most_two_decimals() {
        let km = distance_km(point(-23.55052, -46.633308), point(-19.9167, -43.9345));
        let cents = km * 100.0;
        assert!((cents - cents.round()).abs() < 1e-6, "got {km}");
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(Coordinates::new(90.1, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn missing_endpoint_yields_unknown() {
        let here = Some(point(10.0, 20.0));
        assert_eq!(Distance::between(here, None), Distance::Unknown);
        assert_eq!(Distance::between(None, here), Distance::Unknown);
        assert_eq!(Distance::between(here, here), Distance::Known(0.0));
        assert_eq!(Distance::Known(360.75).to_string(), "360.75 km");
    }
}
