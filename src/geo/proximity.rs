//! Proximity filtering of incident records around an origin.
use super::{Coordinate, GeoError, Locatable, haversine_km};

/// A record that fell inside the search radius, with its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearby<'a, T> {
    pub record: &'a T,
    pub distance_km: f64,
}

/// Return records within `radius_km` of `origin`, nearest first.
///
/// Records without coordinates are skipped. When `require_verified` is set,
/// unverified records are skipped as well. The boundary is inclusive and
/// equal distances keep their input order.
pub fn filter_nearby<'a, T: Locatable>(
    origin: &Coordinate,
    records: &'a [T],
    radius_km: f64,
    require_verified: bool,
) -> Result<Vec<Nearby<'a, T>>, GeoError> {
    origin.validate()?;
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(GeoError::InvalidRadius(radius_km));
    }

    let mut nearby: Vec<Nearby<'a, T>> = records
        .iter()
        .filter(|record| !require_verified || record.is_verified())
        .filter_map(|record| {
            let at = record.coordinates()?;
            let distance_km = haversine_km(origin, &at);
            (distance_km <= radius_km).then_some(Nearby {
                record,
                distance_km,
            })
        })
        .collect();

    // sort_by is stable
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(nearby)
}
