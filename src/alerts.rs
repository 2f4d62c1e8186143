//! "Nearby alerts": reports from the document store filtered around a position.
use tracing::{debug, warn};

use crate::config::AlertsConfig;
use crate::db::Db;
use crate::db::models::DisasterReport;
use crate::geo::locator::{GeolocationError, Geolocator};
use crate::geo::proximity::filter_nearby;
use crate::geo::{Coordinate, GeoError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSettings {
    pub radius_km: f64,
    pub require_verified: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            require_verified: true,
        }
    }
}

impl From<&AlertsConfig> for AlertSettings {
    fn from(config: &AlertsConfig) -> Self {
        Self {
            radius_km: config.radius_km,
            require_verified: config.require_verified,
        }
    }
}

/// Reports around `origin`, nearest first, paired with their distance in km.
///
/// A store read failure is logged and yields an empty list. Invalid input
/// (bad origin, non-positive radius) is an error.
pub fn nearby_alerts(
    db: &Db,
    origin: &Coordinate,
    settings: &AlertSettings,
) -> Result<Vec<(DisasterReport, f64)>, GeoError> {
    origin.validate()?;

    let reports = match db.list_reports() {
        Ok(reports) => reports,
        Err(e) => {
            warn!("Failed to read reports for nearby alerts: {}", e);
            Vec::new()
        }
    };

    let nearby = filter_nearby(
        origin,
        &reports,
        settings.radius_km,
        settings.require_verified,
    )?;
    debug!(
        "{} of {} reports within {} km",
        nearby.len(),
        reports.len(),
        settings.radius_km
    );

    Ok(nearby
        .into_iter()
        .map(|n| (n.record.clone(), n.distance_km))
        .collect())
}

/// Ask `locator` for the current position, then list nearby alerts.
pub async fn nearby_from_locator<L: Geolocator>(
    locator: &L,
    db: &Db,
    settings: &AlertSettings,
) -> Result<Vec<(DisasterReport, f64)>, GeolocationError> {
    let origin = locator.current_position().await?;
    Ok(nearby_alerts(db, &origin, settings)?)
}
