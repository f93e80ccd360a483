// crates/relic-core/src/band.rs
//
// Sentinel-2 MSI spectral bands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelicError;

/// A Sentinel-2 MSI band.
///
/// Band rasters carried by scenes and composites are surface reflectance
/// (unitless, nominally 0.0 - 1.0). Scaling from L2A digital numbers is the
/// imagery adapter's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    B8A,
    B9,
    B11,
    B12,
}

impl Band {
    /// All bands in wavelength order.
    pub const ALL: [Band; 12] = [
        Band::B1,
        Band::B2,
        Band::B3,
        Band::B4,
        Band::B5,
        Band::B6,
        Band::B7,
        Band::B8,
        Band::B8A,
        Band::B9,
        Band::B11,
        Band::B12,
    ];

    /// Central wavelength in nanometres.
    pub fn wavelength_nm(&self) -> u32 {
        match self {
            Band::B1 => 443,
            Band::B2 => 490,
            Band::B3 => 560,
            Band::B4 => 665,
            Band::B5 => 705,
            Band::B6 => 740,
            Band::B7 => 783,
            Band::B8 => 842,
            Band::B8A => 865,
            Band::B9 => 945,
            Band::B11 => 1610,
            Band::B12 => 2190,
        }
    }

    /// Native ground resolution in metres.
    pub fn resolution_m(&self) -> u32 {
        match self {
            Band::B2 | Band::B3 | Band::B4 | Band::B8 => 10,
            Band::B5 | Band::B6 | Band::B7 | Band::B8A | Band::B11 | Band::B12 => 20,
            Band::B1 | Band::B9 => 60,
        }
    }

    /// Human-readable description, e.g. "NIR".
    pub fn description(&self) -> &'static str {
        match self {
            Band::B1 => "Coastal Aerosol",
            Band::B2 => "Blue",
            Band::B3 => "Green",
            Band::B4 => "Red",
            Band::B5 => "Red Edge 1",
            Band::B6 => "Red Edge 2",
            Band::B7 => "Red Edge 3",
            Band::B8 => "NIR",
            Band::B8A => "Narrow NIR",
            Band::B9 => "Water Vapour",
            Band::B11 => "SWIR 1",
            Band::B12 => "SWIR 2",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Band {
    type Err = RelicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Band::ALL
            .iter()
            .find(|b| b.to_string() == upper)
            .copied()
            .ok_or_else(|| RelicError::Validation(format!("Unknown band: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_band_case_insensitive() {
        assert_eq!("b8a".parse::<Band>().unwrap(), Band::B8A);
        assert_eq!(" B11 ".parse::<Band>().unwrap(), Band::B11);
        assert!("B10".parse::<Band>().is_err());
    }

    #[test]
    fn test_band_metadata() {
        assert_eq!(Band::B8.wavelength_nm(), 842);
        assert_eq!(Band::B11.resolution_m(), 20);
        assert_eq!(Band::B4.description(), "Red");
    }
}
