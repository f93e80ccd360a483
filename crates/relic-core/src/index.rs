// crates/relic-core/src/index.rs
//
// Spectral index catalogue.
//
// Every index is either a normalized difference over a band pair or one of a
// small set of fixed formulas. Operators may define custom indices per site;
// those are carried inline in the `IndexKind::Custom` variant so a baseline
// key is self-describing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::band::Band;
use crate::error::RelicError;

/// A spectral index the pipeline can evaluate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Vegetation health: (NIR - Red) / (NIR + Red).
    Ndvi,
    /// Built-up surfaces: (SWIR1 - NIR) / (SWIR1 + NIR).
    Ndbi,
    /// Open water (McFeeters): (Green - NIR) / (Green + NIR).
    Ndwi,
    /// Modified water index: (Green - SWIR1) / (Green + SWIR1).
    Mndwi,
    /// Moisture: (NIR - SWIR1) / (NIR + SWIR1).
    Ndmi,
    /// Red-edge chlorophyll: (NIR - RedEdge1) / (NIR + RedEdge1).
    Ndre,
    /// Normalized burn ratio: (NIR - SWIR2) / (NIR + SWIR2).
    Nbr,
    /// Redness (iron oxide): (Red - Green) / (Red + Green).
    Ri,
    /// Urban index: (SWIR2 - NarrowNIR) / (SWIR2 + NarrowNIR).
    Ui,
    /// Burned area index: same band pair as UI, tracked separately for fire scars.
    Bai,
    /// Soil adjusted vegetation index with L = 0.5.
    Savi,
    /// Enhanced vegetation index.
    Evi,
    /// Bare soil index.
    Bsi,
    /// Operator-defined band formula.
    Custom(CustomIndex),
}

/// Formula family of a custom index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFormula {
    /// (a - b) / (a + b)
    NormalizedDiff,
    /// a / b
    Ratio,
    /// a - b
    Difference,
}

/// An operator-defined index over two bands.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomIndex {
    /// Short identifier, `[A-Za-z0-9_-]{1,32}`.
    pub name: String,
    pub formula: CustomFormula,
    pub band_a: Band,
    pub band_b: Band,
}

impl CustomFormula {
    fn tag(&self) -> &'static str {
        match self {
            CustomFormula::NormalizedDiff => "nd",
            CustomFormula::Ratio => "ratio",
            CustomFormula::Difference => "diff",
        }
    }
}

/// The arithmetic an index kind resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexFormula {
    NormalizedDifference { a: Band, b: Band },
    Savi { nir: Band, red: Band, l: f64 },
    Evi { nir: Band, red: Band, blue: Band },
    Bsi { swir: Band, red: Band, nir: Band, blue: Band },
    Ratio { a: Band, b: Band },
    Difference { a: Band, b: Band },
}

/// Thematic grouping used in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexCategory {
    Vegetation,
    Urban,
    Moisture,
    Soil,
    Fire,
    Custom,
}

impl IndexKind {
    /// All built-in index kinds.
    pub const BUILTIN: [IndexKind; 13] = [
        IndexKind::Ndvi,
        IndexKind::Ndbi,
        IndexKind::Ndwi,
        IndexKind::Mndwi,
        IndexKind::Ndmi,
        IndexKind::Ndre,
        IndexKind::Nbr,
        IndexKind::Ri,
        IndexKind::Ui,
        IndexKind::Bai,
        IndexKind::Savi,
        IndexKind::Evi,
        IndexKind::Bsi,
    ];

    /// Resolve this index to its formula.
    pub fn formula(&self) -> IndexFormula {
        use IndexFormula::*;
        match self {
            IndexKind::Ndvi => NormalizedDifference { a: Band::B8, b: Band::B4 },
            IndexKind::Ndbi => NormalizedDifference { a: Band::B11, b: Band::B8 },
            IndexKind::Ndwi => NormalizedDifference { a: Band::B3, b: Band::B8 },
            IndexKind::Mndwi => NormalizedDifference { a: Band::B3, b: Band::B11 },
            IndexKind::Ndmi => NormalizedDifference { a: Band::B8, b: Band::B11 },
            IndexKind::Ndre => NormalizedDifference { a: Band::B8, b: Band::B5 },
            IndexKind::Nbr => NormalizedDifference { a: Band::B8, b: Band::B12 },
            IndexKind::Ri => NormalizedDifference { a: Band::B4, b: Band::B3 },
            IndexKind::Ui => NormalizedDifference { a: Band::B12, b: Band::B8A },
            IndexKind::Bai => NormalizedDifference { a: Band::B12, b: Band::B8A },
            IndexKind::Savi => Savi { nir: Band::B8, red: Band::B4, l: 0.5 },
            IndexKind::Evi => Evi { nir: Band::B8, red: Band::B4, blue: Band::B2 },
            IndexKind::Bsi => Bsi {
                swir: Band::B11,
                red: Band::B4,
                nir: Band::B8,
                blue: Band::B2,
            },
            IndexKind::Custom(c) => match c.formula {
                CustomFormula::NormalizedDiff => NormalizedDifference { a: c.band_a, b: c.band_b },
                CustomFormula::Ratio => Ratio { a: c.band_a, b: c.band_b },
                CustomFormula::Difference => Difference { a: c.band_a, b: c.band_b },
            },
        }
    }

    /// Bands that must be present in a composite to evaluate this index.
    pub fn required_bands(&self) -> Vec<Band> {
        match self.formula() {
            IndexFormula::NormalizedDifference { a, b }
            | IndexFormula::Ratio { a, b }
            | IndexFormula::Difference { a, b } => vec![a, b],
            IndexFormula::Savi { nir, red, .. } => vec![nir, red],
            IndexFormula::Evi { nir, red, blue } => vec![nir, red, blue],
            IndexFormula::Bsi { swir, red, nir, blue } => vec![swir, red, nir, blue],
        }
    }

    /// Closed value range for valid pixels, if the formula is bounded.
    ///
    /// Normalized differences (and BSI, which is one over band sums) are
    /// bounded to [-1, 1]. Pixels outside the range are marked invalid.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        match self.formula() {
            IndexFormula::NormalizedDifference { .. } | IndexFormula::Bsi { .. } => {
                Some((-1.0, 1.0))
            }
            _ => None,
        }
    }

    /// Stable tag used in storage and lock keys.
    ///
    /// Custom tags include the formula and bands, so a custom index redefined
    /// under the same name gets a fresh baseline and observation log.
    pub fn tag(&self) -> String {
        match self {
            IndexKind::Custom(c) => format!(
                "custom.{}.{}.{}.{}",
                c.name,
                c.formula.tag(),
                c.band_a.to_string().to_ascii_lowercase(),
                c.band_b.to_string().to_ascii_lowercase()
            ),
            other => other.short_name().to_ascii_lowercase(),
        }
    }

    /// Upper-case acronym (or custom name).
    pub fn short_name(&self) -> &str {
        match self {
            IndexKind::Ndvi => "NDVI",
            IndexKind::Ndbi => "NDBI",
            IndexKind::Ndwi => "NDWI",
            IndexKind::Mndwi => "MNDWI",
            IndexKind::Ndmi => "NDMI",
            IndexKind::Ndre => "NDRE",
            IndexKind::Nbr => "NBR",
            IndexKind::Ri => "RI",
            IndexKind::Ui => "UI",
            IndexKind::Bai => "BAI",
            IndexKind::Savi => "SAVI",
            IndexKind::Evi => "EVI",
            IndexKind::Bsi => "BSI",
            IndexKind::Custom(c) => &c.name,
        }
    }

    pub fn category(&self) -> IndexCategory {
        match self {
            IndexKind::Ndvi | IndexKind::Ndre | IndexKind::Savi | IndexKind::Evi => {
                IndexCategory::Vegetation
            }
            IndexKind::Ndbi | IndexKind::Ui => IndexCategory::Urban,
            IndexKind::Ndwi | IndexKind::Mndwi | IndexKind::Ndmi => IndexCategory::Moisture,
            IndexKind::Bsi | IndexKind::Ri => IndexCategory::Soil,
            IndexKind::Nbr | IndexKind::Bai => IndexCategory::Fire,
            IndexKind::Custom(_) => IndexCategory::Custom,
        }
    }

    /// What a change in this index typically means at a heritage site.
    pub fn heritage_use(&self) -> &'static str {
        match self {
            IndexKind::Ndvi => "Vegetation encroachment and landscape change around structures",
            IndexKind::Ndbi => "Urban expansion and new construction in the buffer zone",
            IndexKind::Ndwi => "Flooding risk and proximity to water bodies",
            IndexKind::Mndwi => "Water detection in dense urban heritage contexts",
            IndexKind::Ndmi => "Waterlogging and moisture-related structural damage",
            IndexKind::Ndre => "Early vegetation stress before it shows in NDVI",
            IndexKind::Nbr => "Wildfire impact on the surrounding landscape",
            IndexKind::Ri => "Soil changes and archaeological features in bare ground",
            IndexKind::Ui => "Cross-check of NDBI for encroachment",
            IndexKind::Bai => "Post-fire damage mapping",
            IndexKind::Savi => "Vegetation in arid sites with exposed soil",
            IndexKind::Evi => "Vegetation under dense canopy or high aerosol load",
            IndexKind::Bsi => "Erosion and soil disturbance, including looting pits",
            IndexKind::Custom(_) => "Operator-defined",
        }
    }
}

impl CustomIndex {
    /// Validate the custom index name.
    pub fn validate(&self) -> Result<(), RelicError> {
        let valid_chars = self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if self.name.is_empty() || self.name.len() > 32 || !valid_chars {
            return Err(RelicError::Validation(format!(
                "Custom index name '{}' must match [A-Za-z0-9_-]{{1,32}}",
                self.name
            )));
        }
        if IndexKind::BUILTIN
            .iter()
            .any(|k| k.short_name().eq_ignore_ascii_case(&self.name))
        {
            return Err(RelicError::Validation(format!(
                "Custom index name '{}' shadows a built-in index",
                self.name
            )));
        }
        if self.band_a == self.band_b {
            return Err(RelicError::Validation(format!(
                "Custom index '{}' uses the same band twice",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for IndexKind {
    type Err = RelicError;

    /// Parse a built-in index by acronym (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        IndexKind::BUILTIN
            .iter()
            .find(|k| k.short_name().eq_ignore_ascii_case(needle))
            .cloned()
            .ok_or_else(|| RelicError::Validation(format!("Unknown index: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str) -> CustomIndex {
        CustomIndex {
            name: name.to_string(),
            formula: CustomFormula::NormalizedDiff,
            band_a: Band::B8,
            band_b: Band::B5,
        }
    }

    #[test]
    fn test_ndvi_and_ndbi_band_pairs() {
        assert_eq!(
            IndexKind::Ndvi.formula(),
            IndexFormula::NormalizedDifference { a: Band::B8, b: Band::B4 }
        );
        assert_eq!(
            IndexKind::Ndbi.formula(),
            IndexFormula::NormalizedDifference { a: Band::B11, b: Band::B8 }
        );
    }

    #[test]
    fn test_parse_and_tag() {
        let k: IndexKind = "ndbi".parse().unwrap();
        assert_eq!(k, IndexKind::Ndbi);
        assert_eq!(k.tag(), "ndbi");
        assert_eq!(IndexKind::Custom(custom("rededge")).tag(), "custom.rededge.nd.b8.b5");
        assert!("xyz".parse::<IndexKind>().is_err());
    }

    #[test]
    fn test_redefined_custom_index_gets_its_own_tag() {
        let before = custom("veg");
        let mut after = before.clone();
        after.formula = CustomFormula::Difference;
        assert_ne!(IndexKind::Custom(before.clone()).tag(), IndexKind::Custom(after).tag());

        let mut rebanded = before.clone();
        rebanded.band_b = Band::B4;
        assert_ne!(IndexKind::Custom(before.clone()).tag(), IndexKind::Custom(rebanded).tag());

        // Same definition, same lineage.
        assert_eq!(IndexKind::Custom(before.clone()).tag(), IndexKind::Custom(before).tag());
    }

    #[test]
    fn test_required_bands() {
        assert_eq!(
            IndexKind::Bsi.required_bands(),
            vec![Band::B11, Band::B4, Band::B8, Band::B2]
        );
    }

    #[test]
    fn test_custom_validation() {
        assert!(custom("my_index-1").validate().is_ok());
        assert!(custom("").validate().is_err());
        assert!(custom("bad:name").validate().is_err());
        assert!(custom("ndvi").validate().is_err());

        let mut same = custom("same");
        same.band_b = Band::B8;
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_serde_representation() {
        let json = serde_json::to_string(&IndexKind::Ndvi).unwrap();
        assert_eq!(json, "\"ndvi\"");
        let c = IndexKind::Custom(custom("x1"));
        let back: IndexKind = serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_value_range_bounded_only_for_normalized() {
        assert_eq!(IndexKind::Ndvi.value_range(), Some((-1.0, 1.0)));
        assert_eq!(IndexKind::Evi.value_range(), None);
    }
}
