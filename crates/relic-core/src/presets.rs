// crates/relic-core/src/presets.rs
//
// Well-known heritage sites that can be registered by name.

use serde::Serialize;

/// A named heritage location with a default buffer radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SitePreset {
    /// Lookup key, e.g. "giza".
    pub key: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub buffer_km: f64,
    pub description: &'static str,
}

pub const PRESETS: [SitePreset; 7] = [
    SitePreset {
        key: "alba_iulia",
        name: "Alba Iulia Citadel",
        lat: 46.0686,
        lon: 23.5714,
        buffer_km: 2.0,
        description: "Vauban-style star fortress, Romania",
    },
    SitePreset {
        key: "sagrada_familia",
        name: "Sagrada Familia",
        lat: 41.4036,
        lon: 2.1744,
        buffer_km: 1.0,
        description: "Gaudi basilica in central Barcelona",
    },
    SitePreset {
        key: "giza",
        name: "Giza Pyramids",
        lat: 29.9792,
        lon: 31.1342,
        buffer_km: 2.5,
        description: "Pyramid complex on the edge of Greater Cairo",
    },
    SitePreset {
        key: "machu_picchu",
        name: "Machu Picchu",
        lat: -13.1631,
        lon: -72.5450,
        buffer_km: 1.5,
        description: "Inca citadel in the Andes, Peru",
    },
    SitePreset {
        key: "colosseum",
        name: "Colosseum",
        lat: 41.8902,
        lon: 12.4922,
        buffer_km: 0.8,
        description: "Flavian amphitheatre, Rome",
    },
    SitePreset {
        key: "taj_mahal",
        name: "Taj Mahal",
        lat: 27.1751,
        lon: 78.0421,
        buffer_km: 1.2,
        description: "Mughal mausoleum on the Yamuna, Agra",
    },
    SitePreset {
        key: "acropolis",
        name: "Acropolis of Athens",
        lat: 37.9715,
        lon: 23.7257,
        buffer_km: 1.0,
        description: "Ancient citadel above Athens",
    },
];

/// Find a preset by key (case-insensitive; '-' and ' ' match '_').
pub fn find(key: &str) -> Option<&'static SitePreset> {
    let wanted = key.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    PRESETS.iter().find(|p| p.key == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{buffered_point, validate_polygon};

    #[test]
    fn test_find_preset() {
        assert_eq!(find("Machu-Picchu").unwrap().lat, -13.1631);
        assert_eq!(find("taj mahal").unwrap().buffer_km, 1.2);
        assert!(find("stonehenge").is_none());
    }

    #[test]
    fn test_all_presets_produce_valid_areas() {
        for p in PRESETS.iter() {
            let poly = buffered_point(p.lat, p.lon, p.buffer_km, 32).unwrap();
            assert!(validate_polygon(&poly).is_ok(), "preset {} invalid", p.key);
        }
    }
}
