use crate::types::{GeoPoint, Role};

/// Precision of the coordinates one decimal degree of rounding leaves,
/// roughly 11 km at the equator. Coarse enough that a habitat cannot be
/// walked to from a catalog entry.
const COARSE_DECIMALS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisclosedLocation {
    Precise(GeoPoint),
    Approximate(GeoPoint),
}

impl DisclosedLocation {
    pub fn point(&self) -> GeoPoint {
        match self {
            DisclosedLocation::Precise(p) | DisclosedLocation::Approximate(p) => *p,
        }
    }

    pub fn precision(&self) -> &'static str {
        match self {
            DisclosedLocation::Precise(_) => "precise",
            DisclosedLocation::Approximate(_) => "approximate",
        }
    }
}

/// Who may see exact coordinates of a verified submission. Research-grade
/// roles get full precision; every other catalog reader gets a coarsened
/// location. Pure, like `access::authorize`.
pub fn disclose_location(actor: Option<Role>, location: &GeoPoint) -> DisclosedLocation {
    match actor {
        Some(Role::Expert) | Some(Role::Admin) => DisclosedLocation::Precise(*location),
        _ => DisclosedLocation::Approximate(GeoPoint {
            longitude: coarsen(location.longitude),
            latitude: coarsen(location.latitude),
        }),
    }
}

fn coarsen(value: f64) -> f64 {
    (value * COARSE_DECIMALS).round() / COARSE_DECIMALS
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANGALORE: GeoPoint = GeoPoint {
        longitude: 77.5946,
        latitude: 12.9716,
    };

    #[test]
    fn test_research_roles_see_precise() {
        for role in [Role::Expert, Role::Admin] {
            let disclosed = disclose_location(Some(role), &BANGALORE);
            assert_eq!(disclosed, DisclosedLocation::Precise(BANGALORE));
            assert_eq!(disclosed.precision(), "precise");
        }
    }

    #[test]
    fn test_general_readers_see_coarsened() {
        for actor in [
            None,
            Some(Role::Contributor),
            Some(Role::ExpertApplicant),
            Some(Role::ExpertRejected),
        ] {
            let disclosed = disclose_location(actor, &BANGALORE);
            assert_eq!(disclosed.precision(), "approximate");
            let point = disclosed.point();
            assert_eq!(point.longitude, 77.6);
            assert_eq!(point.latitude, 13.0);
        }
    }

    #[test]
    fn test_coarsen_rounds_to_one_decimal() {
        assert_eq!(coarsen(77.5946), 77.6);
        assert_eq!(coarsen(-0.04), -0.0);
        assert_eq!(coarsen(12.94), 12.9);
        assert_eq!(coarsen(12.95), 13.0);
    }
}
