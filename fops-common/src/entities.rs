//! Classifiable entities and their filter accessors
//!
//! Each collection owns its records outright. Cross references between
//! collections go through planning-area names or ids, never shared pointers.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::filter::FieldAccessors;
use crate::geography::PlanningArea;
use crate::tier::{
    completion_bands, decile_tiers, gpe_ratio_tiers, revenue_tiers, Classification,
    CompletionBand, Decile, Metric, PerformanceTier, TierTable,
};

/// Completion rate below which an active contractor is put on probation
pub const PROBATION_COMPLETION_RATE: f64 = 60.0;

/// Days since last contact after which a target counts as stale / dormant
pub const STALE_CONTACT_DAYS: i64 = 30;
pub const DORMANT_CONTACT_DAYS: i64 = 90;

/// Contractor trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trade {
    Plumbing,
    Electrical,
    Hvac,
    Roofing,
    Landscaping,
    Handyman,
}

impl Trade {
    pub const ALL: [Trade; 6] = [
        Trade::Plumbing,
        Trade::Electrical,
        Trade::Hvac,
        Trade::Roofing,
        Trade::Landscaping,
        Trade::Handyman,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Trade::Plumbing => "Plumbing",
            Trade::Electrical => "Electrical",
            Trade::Hvac => "HVAC",
            Trade::Roofing => "Roofing",
            Trade::Landscaping => "Landscaping",
            Trade::Handyman => "Handyman",
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived contractor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorStatus {
    Active,
    Probation,
    /// No completed jobs on record
    Inactive,
}

/// Technician / contractor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    pub id: String,
    pub name: String,
    pub trade: Trade,
    /// Planning-area display name
    pub planning_area: String,
    /// Percent of jobs completed on schedule; `None` when no jobs yet
    pub completion_rate: Option<f64>,
    /// Cost-to-revenue ratio in percent; `None` when no jobs yet
    pub gpe_ratio: Option<f64>,
    pub revenue: f64,
    pub joined_on: NaiveDate,
}

impl Contractor {
    pub fn status(&self) -> ContractorStatus {
        match self.completion_rate {
            None => ContractorStatus::Inactive,
            Some(rate) if rate < PROBATION_COMPLETION_RATE => ContractorStatus::Probation,
            Some(_) => ContractorStatus::Active,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::GpeRatio => self.gpe_ratio,
            Metric::CompletionRate => self.completion_rate,
            Metric::Revenue => Some(self.revenue),
            Metric::DecileRank => None,
        }
    }
}

/// Derived client-target state, relative to an as-of date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    Fresh,
    Stale,
    Dormant,
}

impl ContactState {
    pub fn since(last_contacted: NaiveDate, as_of: NaiveDate) -> Self {
        let days = (as_of - last_contacted).num_days();
        if days > DORMANT_CONTACT_DAYS {
            ContactState::Dormant
        } else if days > STALE_CONTACT_DAYS {
            ContactState::Stale
        } else {
            ContactState::Fresh
        }
    }
}

/// Prospective client ranked by market decile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientTarget {
    pub id: String,
    pub client_name: String,
    /// Planning-area display name
    pub planning_area: String,
    /// Market decile rank 1..=10; `None` when not yet scored
    pub decile_rank: Option<f64>,
    pub revenue: f64,
    pub last_contacted: NaiveDate,
}

/// Accessors for contractor lists, tiering on one configurable metric
#[derive(Debug, Clone)]
pub struct ContractorFields {
    metric: Metric,
    tiers: TierTable<PerformanceTier>,
    bands: TierTable<CompletionBand>,
}

impl ContractorFields {
    /// Tier contractors by GPE ratio
    pub fn by_gpe_ratio() -> Self {
        Self {
            metric: Metric::GpeRatio,
            tiers: gpe_ratio_tiers(),
            bands: completion_bands(),
        }
    }

    /// Tier contractors by revenue
    pub fn by_revenue() -> Self {
        Self {
            metric: Metric::Revenue,
            tiers: revenue_tiers(),
            bands: completion_bands(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn completion_band(&self, contractor: &Contractor) -> Classification<CompletionBand> {
        self.bands.classify_opt(contractor.completion_rate)
    }
}

impl Default for ContractorFields {
    fn default() -> Self {
        Self::by_gpe_ratio()
    }
}

impl FieldAccessors<Contractor> for ContractorFields {
    type State = ContractorStatus;
    type Tier = PerformanceTier;

    fn search_fields<'a>(&self, c: &'a Contractor) -> Vec<&'a str> {
        vec![
            c.name.as_str(),
            c.id.as_str(),
            c.trade.label(),
            c.planning_area.as_str(),
        ]
    }

    fn planning_area<'a>(&self, c: &'a Contractor) -> &'a str {
        &c.planning_area
    }

    fn state(&self, c: &Contractor) -> Option<ContractorStatus> {
        Some(c.status())
    }

    fn tier(&self, c: &Contractor) -> Classification<PerformanceTier> {
        self.tiers.classify_opt(c.metric(self.metric))
    }

    fn date(&self, c: &Contractor) -> Option<NaiveDate> {
        Some(c.joined_on)
    }
}

/// Accessors for client-target lists, tiering on decile rank
#[derive(Debug, Clone)]
pub struct TargetFields {
    as_of: NaiveDate,
    deciles: TierTable<Decile>,
}

impl TargetFields {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            deciles: decile_tiers(),
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }
}

impl FieldAccessors<ClientTarget> for TargetFields {
    type State = ContactState;
    type Tier = Decile;

    fn search_fields<'a>(&self, t: &'a ClientTarget) -> Vec<&'a str> {
        vec![t.client_name.as_str(), t.id.as_str(), t.planning_area.as_str()]
    }

    fn planning_area<'a>(&self, t: &'a ClientTarget) -> &'a str {
        &t.planning_area
    }

    fn state(&self, t: &ClientTarget) -> Option<ContactState> {
        Some(ContactState::since(t.last_contacted, self.as_of))
    }

    fn tier(&self, t: &ClientTarget) -> Classification<Decile> {
        self.deciles.classify_opt(t.decile_rank)
    }

    fn date(&self, t: &ClientTarget) -> Option<NaiveDate> {
        Some(t.last_contacted)
    }
}

/// Accessors for the planning-area list itself (search, region and area only)
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaFields;

impl FieldAccessors<PlanningArea> for AreaFields {
    type State = ();
    type Tier = ();

    fn search_fields<'a>(&self, area: &'a PlanningArea) -> Vec<&'a str> {
        vec![area.name.as_str(), area.code.as_str()]
    }

    fn planning_area<'a>(&self, area: &'a PlanningArea) -> &'a str {
        &area.name
    }

    fn state(&self, _area: &PlanningArea) -> Option<()> {
        Some(())
    }

    fn tier(&self, _area: &PlanningArea) -> Classification<()> {
        Classification::Tier(())
    }

    fn date(&self, _area: &PlanningArea) -> Option<NaiveDate> {
        None
    }
}
