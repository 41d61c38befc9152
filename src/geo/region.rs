//! Administrative region classifier.
//!
//! A point belongs to the region whose reference center is nearest. The
//! scan order is the declaration order of [`Region::ALL`]; on an exact tie
//! the region listed first wins.

use super::distance::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic label used when no region can be determined.
pub const PROVINCE_LABEL: &str = "Québec";

/// The 17 administrative regions of Québec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "Bas-Saint-Laurent")]
    BasSaintLaurent,
    #[serde(rename = "Saguenay–Lac-Saint-Jean")]
    SaguenayLacSaintJean,
    #[serde(rename = "Capitale-Nationale")]
    CapitaleNationale,
    #[serde(rename = "Mauricie")]
    Mauricie,
    #[serde(rename = "Estrie")]
    Estrie,
    #[serde(rename = "Montréal")]
    Montreal,
    #[serde(rename = "Outaouais")]
    Outaouais,
    #[serde(rename = "Abitibi-Témiscamingue")]
    AbitibiTemiscamingue,
    #[serde(rename = "Côte-Nord")]
    CoteNord,
    #[serde(rename = "Nord-du-Québec")]
    NordDuQuebec,
    #[serde(rename = "Gaspésie–Îles-de-la-Madeleine")]
    GaspesieIlesDeLaMadeleine,
    #[serde(rename = "Chaudière-Appalaches")]
    ChaudiereAppalaches,
    #[serde(rename = "Laval")]
    Laval,
    #[serde(rename = "Lanaudière")]
    Lanaudiere,
    #[serde(rename = "Laurentides")]
    Laurentides,
    #[serde(rename = "Montérégie")]
    Monteregie,
    #[serde(rename = "Centre-du-Québec")]
    CentreDuQuebec,
}

impl Region {
    /// Fixed enumeration order used by the nearest-center scan.
    pub const ALL: [Region; 17] = [
        Region::BasSaintLaurent,
        Region::SaguenayLacSaintJean,
        Region::CapitaleNationale,
        Region::Mauricie,
        Region::Estrie,
        Region::Montreal,
        Region::Outaouais,
        Region::AbitibiTemiscamingue,
        Region::CoteNord,
        Region::NordDuQuebec,
        Region::GaspesieIlesDeLaMadeleine,
        Region::ChaudiereAppalaches,
        Region::Laval,
        Region::Lanaudiere,
        Region::Laurentides,
        Region::Monteregie,
        Region::CentreDuQuebec,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BasSaintLaurent => "Bas-Saint-Laurent",
            Self::SaguenayLacSaintJean => "Saguenay–Lac-Saint-Jean",
            Self::CapitaleNationale => "Capitale-Nationale",
            Self::Mauricie => "Mauricie",
            Self::Estrie => "Estrie",
            Self::Montreal => "Montréal",
            Self::Outaouais => "Outaouais",
            Self::AbitibiTemiscamingue => "Abitibi-Témiscamingue",
            Self::CoteNord => "Côte-Nord",
            Self::NordDuQuebec => "Nord-du-Québec",
            Self::GaspesieIlesDeLaMadeleine => "Gaspésie–Îles-de-la-Madeleine",
            Self::ChaudiereAppalaches => "Chaudière-Appalaches",
            Self::Laval => "Laval",
            Self::Lanaudiere => "Lanaudière",
            Self::Laurentides => "Laurentides",
            Self::Monteregie => "Montérégie",
            Self::CentreDuQuebec => "Centre-du-Québec",
        }
    }

    /// Reference center of the region.
    pub fn center(&self) -> GeoPoint {
        let (lat, lon) = match self {
            Self::BasSaintLaurent => (48.511, -68.464),
            Self::SaguenayLacSaintJean => (48.428, -71.068),
            Self::CapitaleNationale => (46.813, -71.208),
            Self::Mauricie => (46.500, -72.523),
            Self::Estrie => (45.400, -71.890),
            Self::Montreal => (45.501, -73.567),
            Self::Outaouais => (45.477, -75.701),
            Self::AbitibiTemiscamingue => (48.233, -78.519),
            Self::CoteNord => (50.234, -66.383),
            Self::NordDuQuebec => (52.940, -73.839),
            Self::GaspesieIlesDeLaMadeleine => (48.839, -64.479),
            Self::ChaudiereAppalaches => (46.554, -70.992),
            Self::Laval => (45.575, -73.753),
            Self::Lanaudiere => (46.250, -73.617),
            Self::Laurentides => (46.256, -74.605),
            Self::Monteregie => (45.399, -73.515),
            Self::CentreDuQuebec => (46.220, -72.423),
        };
        GeoPoint::new(lat, lon)
    }

    pub fn from_name(name: &str) -> Option<Region> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The distance computation produced no usable minimum.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("cannot determine region for ({latitude}, {longitude})")]
pub struct RegionUndetermined {
    pub latitude: f64,
    pub longitude: f64,
}

/// Nearest-center region of `point`.
pub fn region_of(point: GeoPoint) -> Result<Region, RegionUndetermined> {
    let undetermined = RegionUndetermined {
        latitude: point.latitude,
        longitude: point.longitude,
    };
    if !point.latitude.is_finite() || !point.longitude.is_finite() {
        return Err(undetermined);
    }

    let mut best: Option<(Region, f64)> = None;
    for region in Region::ALL {
        let d = point.distance_m(&region.center());
        if d.is_nan() {
            return Err(undetermined);
        }
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((region, d)),
        }
    }
    best.map(|(region, _)| region).ok_or(undetermined)
}

/// Region name for `point`, degrading to the province label.
pub fn region_label(point: GeoPoint) -> &'static str {
    match region_of(point) {
        Ok(region) => region.name(),
        Err(err) => {
            tracing::warn!(error = %err, "region undetermined, using province label");
            PROVINCE_LABEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centers_classify_to_themselves() {
        for region in Region::ALL {
            assert_eq!(region_of(region.center()).unwrap(), region);
        }
    }

    #[test]
    fn test_downtown_montreal() {
        let region = region_of(GeoPoint::new(45.5088, -73.5540)).unwrap();
        assert_eq!(region, Region::Montreal);
        assert_eq!(region.name(), "Montréal");
    }

    #[test]
    fn test_sherbrooke_is_estrie() {
        assert_eq!(region_of(GeoPoint::new(45.4042, -71.8929)).unwrap(), Region::Estrie);
    }

    #[test]
    fn test_far_points_still_classify() {
        // Outside the province: still one of the 17, never an error.
        let toronto = region_of(GeoPoint::new(43.6532, -79.3832)).unwrap();
        assert!(Region::ALL.contains(&toronto));
        let antipode = region_of(GeoPoint::new(-45.0, 106.0)).unwrap();
        assert!(Region::ALL.contains(&antipode));
    }

    #[test]
    fn test_deterministic() {
        let p = GeoPoint::new(46.9, -71.9);
        assert_eq!(region_of(p).unwrap(), region_of(p).unwrap());
    }

    #[test]
    fn test_non_finite_is_undetermined() {
        assert!(region_of(GeoPoint::new(f64::NAN, -73.0)).is_err());
        assert_eq!(region_label(GeoPoint::new(45.0, f64::INFINITY)), PROVINCE_LABEL);
    }

    #[test]
    fn test_serialized_name() {
        let json = serde_json::to_string(&Region::GaspesieIlesDeLaMadeleine).unwrap();
        assert_eq!(json, "\"Gaspésie–Îles-de-la-Madeleine\"");
        assert_eq!(Region::from_name("Laval"), Some(Region::Laval));
    }
}
