//! Tier classification
//!
//! Maps a continuous metric onto an ordered set of labeled buckets using a
//! threshold table. Evaluation stops at the first satisfying boundary in
//! best-to-worst order, so a metric sitting exactly on a boundary lands in
//! the better bucket.
//!
//! Direction is declared per metric ([`Metric::direction`]) rather than
//! implied by the call site:
//! - [`Direction::Ascending`]: lower is better, boundaries are upper bounds
//!   (`metric <= bound`), listed in increasing order
//! - [`Direction::Descending`]: higher is better, boundaries are lower bounds
//!   (`metric >= bound`), listed in decreasing order

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which end of the metric scale is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Lower metric = better tier (cost ratios)
    Ascending,
    /// Higher metric = better tier (rates, revenue, rank)
    Descending,
}

/// One threshold and the label it awards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBoundary<L> {
    pub bound: f64,
    pub label: L,
}

/// Outcome of classifying one metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification<L> {
    Tier(L),
    /// Metric was missing or NaN
    Unclassified,
}

impl<L> Classification<L> {
    pub fn tier(&self) -> Option<&L> {
        match self {
            Classification::Tier(label) => Some(label),
            Classification::Unclassified => None,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Classification::Unclassified)
    }
}

impl<L: fmt::Display> fmt::Display for Classification<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Tier(label) => label.fmt(f),
            Classification::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// Ordered threshold table with a catch-all worst label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierTable<L> {
    direction: Direction,
    boundaries: Vec<TierBoundary<L>>,
    fallback: L,
}

impl<L: Clone + PartialEq> TierTable<L> {
    /// Build a table from boundaries listed best-first
    ///
    /// Ascending tables need strictly increasing bounds, descending tables
    /// strictly decreasing ones. NaN bounds are rejected.
    pub fn new(direction: Direction, boundaries: Vec<(f64, L)>, fallback: L) -> Result<Self> {
        if let Some((bound, _)) = boundaries.iter().find(|(bound, _)| bound.is_nan()) {
            return Err(Error::InvalidInput(format!("tier bound is not a number: {}", bound)));
        }

        let ordered = boundaries.windows(2).all(|pair| match direction {
            Direction::Ascending => pair[0].0 < pair[1].0,
            Direction::Descending => pair[0].0 > pair[1].0,
        });
        if !ordered {
            return Err(Error::InvalidInput(format!(
                "tier bounds must be strictly {} when listed best-first",
                match direction {
                    Direction::Ascending => "increasing",
                    Direction::Descending => "decreasing",
                }
            )));
        }

        Ok(Self::from_ordered(direction, boundaries, fallback))
    }

    pub fn ascending(boundaries: Vec<(f64, L)>, fallback: L) -> Result<Self> {
        Self::new(Direction::Ascending, boundaries, fallback)
    }

    pub fn descending(boundaries: Vec<(f64, L)>, fallback: L) -> Result<Self> {
        Self::new(Direction::Descending, boundaries, fallback)
    }

    fn from_ordered(direction: Direction, boundaries: Vec<(f64, L)>, fallback: L) -> Self {
        Self {
            direction,
            boundaries: boundaries
                .into_iter()
                .map(|(bound, label)| TierBoundary { bound, label })
                .collect(),
            fallback,
        }
    }

    /// Classify `metric`; NaN is `Unclassified`
    pub fn classify(&self, metric: f64) -> Classification<L> {
        if metric.is_nan() {
            return Classification::Unclassified;
        }

        let hit = self.boundaries.iter().find(|b| match self.direction {
            Direction::Ascending => metric <= b.bound,
            Direction::Descending => metric >= b.bound,
        });

        Classification::Tier(
            hit.map(|b| b.label.clone())
                .unwrap_or_else(|| self.fallback.clone()),
        )
    }

    /// Classify an optional metric; `None` is `Unclassified`
    pub fn classify_opt(&self, metric: Option<f64>) -> Classification<L> {
        metric
            .map(|m| self.classify(m))
            .unwrap_or(Classification::Unclassified)
    }

    /// Position of `label` in best-to-worst order (0 = best)
    pub fn rank(&self, label: &L) -> Option<usize> {
        self.labels().position(|l| l == label)
    }

    /// Labels from best to worst, fallback last
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.boundaries
            .iter()
            .map(|b| &b.label)
            .chain(std::iter::once(&self.fallback))
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn boundaries(&self) -> &[TierBoundary<L>] {
        &self.boundaries
    }

    pub fn fallback(&self) -> &L {
        &self.fallback
    }
}

/// Four-step performance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceTier {
    Platinum,
    Gold,
    Silver,
    Bronze,
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTier::Platinum => write!(f, "Platinum"),
            PerformanceTier::Gold => write!(f, "Gold"),
            PerformanceTier::Silver => write!(f, "Silver"),
            PerformanceTier::Bronze => write!(f, "Bronze"),
        }
    }
}

/// Three-step completion-rate band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionBand {
    High,
    Medium,
    Low,
}

impl fmt::Display for CompletionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionBand::High => write!(f, "High"),
            CompletionBand::Medium => write!(f, "Medium"),
            CompletionBand::Low => write!(f, "Low"),
        }
    }
}

/// Decile bucket 1..=10 (10 = best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decile(pub u8);

impl fmt::Display for Decile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decile {}", self.0)
    }
}

/// Metrics the dashboard tiers on, each with a declared direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cost-to-revenue ratio in percent
    GpeRatio,
    /// Jobs completed on schedule, percent
    CompletionRate,
    /// Trailing twelve-month revenue, dollars
    Revenue,
    /// Market decile rank, 1..=10
    DecileRank,
}

impl Metric {
    pub const fn direction(self) -> Direction {
        match self {
            Metric::GpeRatio => Direction::Ascending,
            Metric::CompletionRate | Metric::Revenue | Metric::DecileRank => Direction::Descending,
        }
    }
}

/// GPE ratio: ≤103 Platinum, ≤110 Gold, ≤120 Silver, else Bronze
pub fn gpe_ratio_tiers() -> TierTable<PerformanceTier> {
    TierTable::from_ordered(
        Metric::GpeRatio.direction(),
        vec![
            (103.0, PerformanceTier::Platinum),
            (110.0, PerformanceTier::Gold),
            (120.0, PerformanceTier::Silver),
        ],
        PerformanceTier::Bronze,
    )
}

/// Revenue: ≥250k Platinum, ≥150k Gold, ≥75k Silver, else Bronze
pub fn revenue_tiers() -> TierTable<PerformanceTier> {
    TierTable::from_ordered(
        Metric::Revenue.direction(),
        vec![
            (250_000.0, PerformanceTier::Platinum),
            (150_000.0, PerformanceTier::Gold),
            (75_000.0, PerformanceTier::Silver),
        ],
        PerformanceTier::Bronze,
    )
}

/// Completion rate: ≥90 High, ≥75 Medium, else Low
pub fn completion_bands() -> TierTable<CompletionBand> {
    TierTable::from_ordered(
        Metric::CompletionRate.direction(),
        vec![(90.0, CompletionBand::High), (75.0, CompletionBand::Medium)],
        CompletionBand::Low,
    )
}

/// Decile rank: ≥N → Decile N for N = 10..=2, else Decile 1
pub fn decile_tiers() -> TierTable<Decile> {
    TierTable::from_ordered(
        Metric::DecileRank.direction(),
        (2..=10u8).rev().map(|n| (f64::from(n), Decile(n))).collect(),
        Decile(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_boundaries_inclusive() {
        let table = gpe_ratio_tiers();
        assert_eq!(table.classify(95.0), Classification::Tier(PerformanceTier::Platinum));
        assert_eq!(table.classify(103.0), Classification::Tier(PerformanceTier::Platinum));
        assert_eq!(table.classify(103.01), Classification::Tier(PerformanceTier::Gold));
        assert_eq!(table.classify(110.0), Classification::Tier(PerformanceTier::Gold));
        assert_eq!(table.classify(120.0), Classification::Tier(PerformanceTier::Silver));
        assert_eq!(table.classify(120.5), Classification::Tier(PerformanceTier::Bronze));
    }

    #[test]
    fn test_descending_boundaries_inclusive() {
        let table = completion_bands();
        assert_eq!(table.classify(90.0), Classification::Tier(CompletionBand::High));
        assert_eq!(table.classify(89.99), Classification::Tier(CompletionBand::Medium));
        assert_eq!(table.classify(75.0), Classification::Tier(CompletionBand::Medium));
        assert_eq!(table.classify(10.0), Classification::Tier(CompletionBand::Low));
    }

    #[test]
    fn test_nan_and_missing_are_unclassified() {
        let table = gpe_ratio_tiers();
        assert!(table.classify(f64::NAN).is_unclassified());
        assert!(table.classify_opt(None).is_unclassified());
        assert_eq!(
            table.classify_opt(Some(100.0)),
            Classification::Tier(PerformanceTier::Platinum)
        );
    }

    #[test]
    fn test_infinities_fall_to_extremes() {
        let table = gpe_ratio_tiers();
        assert_eq!(table.classify(f64::INFINITY), Classification::Tier(PerformanceTier::Bronze));
        assert_eq!(
            table.classify(f64::NEG_INFINITY),
            Classification::Tier(PerformanceTier::Platinum)
        );
    }

    #[test]
    fn test_decile_table() {
        let table = decile_tiers();
        assert_eq!(table.classify(10.0), Classification::Tier(Decile(10)));
        assert_eq!(table.classify(7.5), Classification::Tier(Decile(7)));
        assert_eq!(table.classify(2.0), Classification::Tier(Decile(2)));
        assert_eq!(table.classify(1.9), Classification::Tier(Decile(1)));
        assert_eq!(table.rank(&Decile(10)), Some(0));
        assert_eq!(table.rank(&Decile(1)), Some(9));
    }

    #[test]
    fn test_stock_tables_pass_validation() {
        let gpe = gpe_ratio_tiers();
        let rebuilt = TierTable::new(
            gpe.direction(),
            gpe.boundaries().iter().map(|b| (b.bound, b.label)).collect(),
            *gpe.fallback(),
        );
        assert!(rebuilt.is_ok());

        let deciles = decile_tiers();
        let rebuilt = TierTable::new(
            deciles.direction(),
            deciles.boundaries().iter().map(|b| (b.bound, b.label)).collect(),
            *deciles.fallback(),
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_rejects_unsorted_tables() {
        let err = TierTable::ascending(vec![(110.0, "Gold"), (103.0, "Platinum")], "Bronze");
        assert!(err.is_err());

        let err = TierTable::descending(vec![(75.0, "Medium"), (90.0, "High")], "Low");
        assert!(err.is_err());

        let err = TierTable::ascending(vec![(100.0, "A"), (100.0, "B")], "C");
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_nan_bound() {
        assert!(TierTable::ascending(vec![(f64::NAN, "A")], "B").is_err());
    }

    #[test]
    fn test_first_satisfying_boundary_wins() {
        // 50 satisfies every bound; the first one listed must win
        let table = TierTable::ascending(vec![(60.0, "A"), (70.0, "B"), (80.0, "C")], "D").unwrap();
        assert_eq!(table.classify(50.0), Classification::Tier("A"));
    }

    #[test]
    fn test_metric_directions() {
        assert_eq!(Metric::GpeRatio.direction(), Direction::Ascending);
        assert_eq!(Metric::CompletionRate.direction(), Direction::Descending);
        assert_eq!(Metric::Revenue.direction(), Direction::Descending);
        assert_eq!(Metric::DecileRank.direction(), Direction::Descending);
    }

    #[test]
    fn test_labels_best_to_worst() {
        let labels: Vec<_> = gpe_ratio_tiers().labels().copied().collect();
        assert_eq!(
            labels,
            vec![
                PerformanceTier::Platinum,
                PerformanceTier::Gold,
                PerformanceTier::Silver,
                PerformanceTier::Bronze
            ]
        );
    }
}
