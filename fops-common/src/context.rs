//! Dashboard data context
//!
//! Owns the planning-area directory and the generated collections. Built
//! once at startup and shared read-only; nothing in the crate keeps
//! collections in globals.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::config::DashboardConfig;
use crate::entities::{AreaFields, ClientTarget, Contractor, ContractorFields, TargetFields};
use crate::filter::FilterEngine;
use crate::geography::GeographyDirectory;
use crate::synthetic::{SyntheticData, SyntheticSpec};
use crate::tier::Metric;
use crate::Result;

/// Immutable collections plus the filter engines over them
#[derive(Debug, Clone)]
pub struct DashboardContext {
    geography: GeographyDirectory,
    contractors: Arc<[Contractor]>,
    targets: Arc<[ClientTarget]>,
    as_of: NaiveDate,
    areas: FilterEngine<AreaFields>,
    contractor_engine: FilterEngine<ContractorFields>,
    target_engine: FilterEngine<TargetFields>,
}

impl DashboardContext {
    /// Generate geography and collections from `config`
    pub fn build(config: &DashboardConfig) -> Result<Self> {
        let generation = &config.generation;
        let geography =
            GeographyDirectory::new(&generation.regions, generation.sub_zones_per_region)?;
        let as_of = config.as_of();

        let data = SyntheticData::generate(
            geography.areas(),
            &SyntheticSpec {
                seed: generation.seed,
                contractors_per_area: generation.contractors_per_area,
                targets_per_area: generation.targets_per_area,
                as_of,
            },
        );

        info!(
            regions = geography.regions().len(),
            areas = geography.len(),
            contractors = data.contractors.len(),
            targets = data.targets.len(),
            seed = generation.seed,
            "Generated dashboard collections"
        );

        Ok(Self::from_parts(
            geography,
            data.contractors,
            data.targets,
            as_of,
            generation.contractor_metric,
            config.page_size,
        ))
    }

    /// Assemble from collections produced elsewhere
    pub fn from_parts(
        geography: GeographyDirectory,
        contractors: Vec<Contractor>,
        targets: Vec<ClientTarget>,
        as_of: NaiveDate,
        contractor_metric: Metric,
        page_size: usize,
    ) -> Self {
        let contractor_fields = match contractor_metric {
            Metric::Revenue => ContractorFields::by_revenue(),
            _ => ContractorFields::by_gpe_ratio(),
        };

        Self {
            geography,
            contractors: contractors.into(),
            targets: targets.into(),
            as_of,
            areas: FilterEngine::new(AreaFields).with_page_size(page_size),
            contractor_engine: FilterEngine::new(contractor_fields).with_page_size(page_size),
            target_engine: FilterEngine::new(TargetFields::new(as_of)).with_page_size(page_size),
        }
    }

    pub fn geography(&self) -> &GeographyDirectory {
        &self.geography
    }

    pub fn contractors(&self) -> &[Contractor] {
        &self.contractors
    }

    pub fn targets(&self) -> &[ClientTarget] {
        &self.targets
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn area_engine(&self) -> &FilterEngine<AreaFields> {
        &self.areas
    }

    pub fn contractor_engine(&self) -> &FilterEngine<ContractorFields> {
        &self.contractor_engine
    }

    pub fn target_engine(&self) -> &FilterEngine<TargetFields> {
        &self.target_engine
    }
}
