/// Geolocation collaborator.
///
/// The device position comes from outside the core (browser API, GPS, or a
/// command-line flag); this trait is the seam the alerts view reads it from.
use std::future::Future;

use thiserror::Error;

use super::{Coordinate, GeoError};

/// Reasons a position could not be obtained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Invalid(#[from] GeoError),
}

/// Source of the user's current position.
pub trait Geolocator: Send + Sync {
    fn current_position(&self) -> impl Future<Output = Result<Coordinate, GeolocationError>> + Send;
}

/// A locator that always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    position: Option<Coordinate>,
}

impl FixedLocator {
    /// Locator for a known position, validated up front.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        Ok(Self {
            position: Some(Coordinate::new(latitude, longitude)?),
        })
    }

    /// Locator that behaves like a user who refused the permission prompt.
    #[must_use]
    pub fn denied() -> Self {
        Self { position: None }
    }
}

impl Geolocator for FixedLocator {
    async fn current_position(&self) -> Result<Coordinate, GeolocationError> {
        self.position.ok_or(GeolocationError::PermissionDenied)
    }
}
