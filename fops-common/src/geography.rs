//! Geography directory
//!
//! Holds the two-level planning-area hierarchy (region → sub-zone) that
//! every collection in the dashboard is keyed by. The area set is generated
//! once at startup and never mutated afterwards.
//!
//! Display names follow `"<REGION> <Suffix>"`, so the region is always the
//! leading token of a name. [`region_of`] is the inverse of that
//! construction and degrades to [`AreaRegion::Unknown`] on anything that
//! does not fit the pattern.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Error, Result};

/// Default region set: the 50 US state codes
pub const US_STATE_CODES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

/// Named sub-zone suffixes for indices 1..=9; higher indices fall back to "Zone <n>"
const SUB_ZONE_SUFFIXES: [&str; 9] = [
    "Central", "North", "South", "East", "West", "Metro", "Harbor", "Uptown", "Valley",
];

/// Smallest geographic unit: one sub-zone of one region
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanningArea {
    /// Region code (leading token of `name`)
    pub region: String,
    /// Sub-zone index within the region (1-based)
    pub index: u16,
    /// Display name, e.g. "CA Metro"
    pub name: String,
    /// Stable short code, e.g. "CA-6"
    pub code: String,
}

impl PlanningArea {
    /// Build the area for `region` / `index` with its canonical display name
    pub fn new(region: &str, index: u16) -> Self {
        Self {
            region: region.to_string(),
            index,
            name: format!("{} {}", region, sub_zone_suffix(index)),
            code: format!("{}-{}", region, index),
        }
    }
}

/// Suffix used in the display name of sub-zone `index`
pub fn sub_zone_suffix(index: u16) -> Cow<'static, str> {
    match index {
        1..=9 => Cow::Borrowed(SUB_ZONE_SUFFIXES[usize::from(index) - 1]),
        n => Cow::Owned(format!("Zone {}", n)),
    }
}

/// Generate the full area set for `regions` × `1..=sub_zones_per_region`
///
/// Pure and deterministic: output is stably sorted by region, then index.
pub fn generate<S: AsRef<str>>(regions: &[S], sub_zones_per_region: u16) -> Vec<PlanningArea> {
    let mut areas: Vec<PlanningArea> = regions
        .iter()
        .flat_map(|region| {
            (1..=sub_zones_per_region).map(move |index| PlanningArea::new(region.as_ref(), index))
        })
        .collect();

    areas.sort_by(|a, b| a.region.cmp(&b.region).then(a.index.cmp(&b.index)));
    areas
}

/// Region recovered from an area display name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaRegion<'a> {
    /// Leading token parsed as a region code
    Known(&'a str),
    /// Name did not match `"<REGION> ..."`
    Unknown,
}

impl<'a> AreaRegion<'a> {
    /// True only for a known region equal to `region`; `Unknown` never matches
    pub fn matches(&self, region: &str) -> bool {
        matches!(self, AreaRegion::Known(code) if *code == region)
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            AreaRegion::Known(code) => code,
            AreaRegion::Unknown => "unknown",
        }
    }
}

/// True when `code` can serve as a region token (ASCII uppercase letters/digits)
pub fn is_valid_region_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Recover the region from an area display name by taking its leading token
///
/// Never fails: names that do not match `"<REGION> <rest>"` yield
/// [`AreaRegion::Unknown`] so downstream filters treat them as "no match".
pub fn region_of(area_name: &str) -> AreaRegion<'_> {
    let Some((token, rest)) = area_name.split_once(' ') else {
        trace!(area = area_name, "Area name has no region token");
        return AreaRegion::Unknown;
    };

    if is_valid_region_code(token) && !rest.trim().is_empty() {
        AreaRegion::Known(token)
    } else {
        trace!(area = area_name, "Area name does not match region pattern");
        AreaRegion::Unknown
    }
}

/// Immutable, indexed planning-area hierarchy
#[derive(Debug, Clone)]
pub struct GeographyDirectory {
    areas: Arc<[PlanningArea]>,
    regions: Vec<String>,
    by_region: HashMap<String, Range<usize>>,
    sub_zones_per_region: u16,
}

impl GeographyDirectory {
    /// Generate and index the hierarchy
    ///
    /// Rejects an empty region list, duplicate codes, codes that would not
    /// round-trip through [`region_of`], and a zero sub-zone count.
    pub fn new<S: AsRef<str>>(regions: &[S], sub_zones_per_region: u16) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::InvalidInput("region list is empty".to_string()));
        }
        if sub_zones_per_region == 0 {
            return Err(Error::InvalidInput(
                "sub_zones_per_region must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for region in regions {
            let code = region.as_ref();
            if !is_valid_region_code(code) {
                return Err(Error::InvalidInput(format!("invalid region code: {:?}", code)));
            }
            if !seen.insert(code) {
                return Err(Error::InvalidInput(format!("duplicate region code: {}", code)));
            }
        }

        let areas = generate(regions, sub_zones_per_region);

        let mut by_region: HashMap<String, Range<usize>> = HashMap::new();
        let mut ordered_regions = Vec::with_capacity(regions.len());
        for (i, area) in areas.iter().enumerate() {
            match by_region.get_mut(&area.region) {
                Some(range) => range.end = i + 1,
                None => {
                    ordered_regions.push(area.region.clone());
                    by_region.insert(area.region.clone(), i..i + 1);
                }
            }
        }

        Ok(Self {
            areas: areas.into(),
            regions: ordered_regions,
            by_region,
            sub_zones_per_region,
        })
    }

    /// Directory over the default 50 US state codes
    pub fn us_states(sub_zones_per_region: u16) -> Result<Self> {
        Self::new(&US_STATE_CODES, sub_zones_per_region)
    }

    /// All areas, sorted by region then index
    pub fn areas(&self) -> &[PlanningArea] {
        &self.areas
    }

    /// Shared handle to the area list
    pub fn shared_areas(&self) -> Arc<[PlanningArea]> {
        Arc::clone(&self.areas)
    }

    /// Region codes in sorted order
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn sub_zones_per_region(&self) -> u16 {
        self.sub_zones_per_region
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.by_region.contains_key(region)
    }

    /// Areas belonging to `region` (empty for an unknown region)
    pub fn areas_in(&self, region: &str) -> &[PlanningArea] {
        self.by_region
            .get(region)
            .map(|range| &self.areas[range.clone()])
            .unwrap_or(&[])
    }

    /// Look up an area by display name ("CA Metro") or code ("CA-6")
    pub fn find(&self, name_or_code: &str) -> Option<&PlanningArea> {
        let region = match region_of(name_or_code) {
            AreaRegion::Known(code) => code,
            AreaRegion::Unknown => name_or_code.split_once('-')?.0,
        };
        self.areas_in(region)
            .iter()
            .find(|area| area.name == name_or_code || area.code == name_or_code)
    }

    /// Like [`region_of`], but a well-formed token outside this directory's
    /// region set is also `Unknown`
    pub fn region_of<'a>(&self, area_name: &'a str) -> AreaRegion<'a> {
        match region_of(area_name) {
            AreaRegion::Known(code) if self.contains_region(code) => AreaRegion::Known(code),
            _ => AreaRegion::Unknown,
        }
    }
}
