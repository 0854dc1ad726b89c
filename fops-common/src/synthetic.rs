//! Seeded synthetic collections
//!
//! Generates contractor and client-target lists over a planning-area set.
//! All randomness flows through one `StdRng` seeded from the configuration,
//! so the same seed and inputs reproduce identical collections.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::entities::{ClientTarget, Contractor, Trade};
use crate::geography::PlanningArea;

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Blake", "Camila", "Dev", "Elena", "Femi", "Grace", "Hiro", "Imani", "Jonah", "Kira",
    "Luis", "Maya", "Noor", "Owen", "Priya",
];

const LAST_NAMES: [&str; 16] = [
    "Abara", "Brooks", "Castillo", "Dunn", "Eriksen", "Fox", "Gupta", "Hale", "Ito", "Jensen",
    "Kowalski", "Lopez", "Moreau", "Nakamura", "Osei", "Park",
];

const CLIENT_PREFIXES: [&str; 10] = [
    "Oak Ridge", "Lakeside", "Summit", "Cedar", "Harborview", "Pinecrest", "Riverside",
    "Stonegate", "Willow", "Brookfield",
];

const CLIENT_SUFFIXES: [&str; 6] = [
    "Homes", "Property Group", "Estates", "Realty", "Apartments", "HOA",
];

/// Share of contractors generated without job history
const NO_HISTORY_RATIO: f64 = 0.03;
/// Share of targets generated without a decile score
const UNSCORED_RATIO: f64 = 0.05;

/// Shape of a generated dataset
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSpec {
    pub seed: u64,
    pub contractors_per_area: usize,
    pub targets_per_area: usize,
    pub as_of: NaiveDate,
}

/// Generated collections, owned by the caller
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub contractors: Vec<Contractor>,
    pub targets: Vec<ClientTarget>,
}

impl SyntheticData {
    /// Generate both collections from one seeded stream
    pub fn generate(areas: &[PlanningArea], spec: &SyntheticSpec) -> Self {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let contractors = generate_contractors(areas, spec.contractors_per_area, spec.as_of, &mut rng);
        let targets = generate_targets(areas, spec.targets_per_area, spec.as_of, &mut rng);
        Self {
            contractors,
            targets,
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn pick<'a, R: Rng>(rng: &mut R, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Contractors for each area, in area order
pub fn generate_contractors<R: Rng>(
    areas: &[PlanningArea],
    per_area: usize,
    as_of: NaiveDate,
    rng: &mut R,
) -> Vec<Contractor> {
    let mut out = Vec::with_capacity(areas.len() * per_area);

    for area in areas {
        for _ in 0..per_area {
            let seq = out.len() + 1;
            let no_history = rng.gen_bool(NO_HISTORY_RATIO);
            let (completion_rate, gpe_ratio, revenue) = if no_history {
                (None, None, 0.0)
            } else {
                (
                    Some(round1(rng.gen_range(50.0..=100.0))),
                    Some(round1(rng.gen_range(92.0..=135.0))),
                    (rng.gen_range(20_000.0..=400_000.0_f64) / 100.0).round() * 100.0,
                )
            };

            out.push(Contractor {
                id: format!("CTR-{:05}", seq),
                name: format!("{} {}", pick(rng, &FIRST_NAMES), pick(rng, &LAST_NAMES)),
                trade: *Trade::ALL.choose(rng).unwrap_or(&Trade::Handyman),
                planning_area: area.name.clone(),
                completion_rate,
                gpe_ratio,
                revenue,
                joined_on: as_of - Duration::days(rng.gen_range(30..=3650)),
            });
        }
    }

    out
}

/// Client targets for each area, in area order
pub fn generate_targets<R: Rng>(
    areas: &[PlanningArea],
    per_area: usize,
    as_of: NaiveDate,
    rng: &mut R,
) -> Vec<ClientTarget> {
    let mut out = Vec::with_capacity(areas.len() * per_area);

    for area in areas {
        for _ in 0..per_area {
            let seq = out.len() + 1;
            let decile_rank = if rng.gen_bool(UNSCORED_RATIO) {
                None
            } else {
                Some(f64::from(rng.gen_range(1u8..=10)))
            };

            out.push(ClientTarget {
                id: format!("TGT-{:05}", seq),
                client_name: format!(
                    "{} {}",
                    pick(rng, &CLIENT_PREFIXES),
                    pick(rng, &CLIENT_SUFFIXES)
                ),
                planning_area: area.name.clone(),
                decile_rank,
                revenue: (rng.gen_range(5_000.0..=500_000.0_f64) / 100.0).round() * 100.0,
                last_contacted: as_of - Duration::days(rng.gen_range(0..=180)),
            });
        }
    }

    out
}
