//! Filtered, paginated entity lists
//!
//! Every list accepts the same query dimensions; an absent, blank or
//! `all` value leaves that dimension unconstrained. Responses carry the
//! full match count and a `showing` disclosure next to the page items.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};

use fops_common::context::DashboardContext;
use fops_common::entities::{ClientTarget, ContactState, Contractor, ContractorStatus};
use fops_common::filter::{DateRange, Dimension, FieldAccessors, Filter, FilterPage};
use fops_common::geography::PlanningArea;
use fops_common::tier::{Classification, CompletionBand, Decile, PerformanceTier};

use super::ApiError;
use crate::AppState;

/// Query parameters shared by all list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: usize,
    pub search: Option<String>,
    /// Region code, e.g. "CA"
    pub region: Option<String>,
    /// Planning-area display name ("CA Metro") or code ("CA-6")
    pub area: Option<String>,
    pub state: Option<String>,
    pub tier: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn default_page() -> usize {
    1
}

/// Contractor plus its derived classifications
#[derive(Debug, Serialize)]
pub struct ContractorRow {
    #[serde(flatten)]
    pub contractor: Contractor,
    pub status: ContractorStatus,
    pub tier: Classification<PerformanceTier>,
    pub completion_band: Classification<CompletionBand>,
}

/// Client target plus its derived classifications
#[derive(Debug, Serialize)]
pub struct TargetRow {
    #[serde(flatten)]
    pub target: ClientTarget,
    pub contact_state: ContactState,
    pub decile: Classification<Decile>,
}

/// Dimensions every entity shape shares
fn base_filter<S, K>(ctx: &DashboardContext, query: &ListQuery) -> Filter<S, K> {
    let mut filter = Filter::all();
    filter.search = Dimension::parse_text(query.search.as_deref());
    filter.region = match Dimension::parse_text(query.region.as_deref()) {
        Dimension::Only(region) => Dimension::Only(region.to_ascii_uppercase()),
        Dimension::All => Dimension::All,
    };
    filter.area = match Dimension::parse_text(query.area.as_deref()) {
        // Codes resolve to display names; unknown areas stay as given and match nothing
        Dimension::Only(area) => Dimension::Only(
            ctx.geography()
                .find(&area)
                .map(|a| a.name.clone())
                .unwrap_or(area),
        ),
        Dimension::All => Dimension::All,
    };
    if query.from.is_some() || query.to.is_some() {
        filter.dates = Dimension::Only(DateRange::new(query.from, query.to));
    }
    filter
}

/// Parse an enum-valued dimension by its serialized name
fn parse_named<T: DeserializeOwned>(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Dimension<T>, ApiError> {
    match Dimension::parse_text(raw) {
        Dimension::All => Ok(Dimension::All),
        Dimension::Only(text) => {
            let de: StrDeserializer<'_, ValueError> = text.as_str().into_deserializer();
            T::deserialize(de)
                .map(Dimension::Only)
                .map_err(|_| ApiError::InvalidParameter {
                    name,
                    value: text.clone(),
                })
        }
    }
}

/// Decile filter: integer 1..=10
fn parse_decile(raw: Option<&str>) -> Result<Dimension<Decile>, ApiError> {
    match Dimension::parse_text(raw) {
        Dimension::All => Ok(Dimension::All),
        Dimension::Only(text) => match text.parse::<u8>() {
            Ok(n @ 1..=10) => Ok(Dimension::Only(Decile(n))),
            _ => Err(ApiError::InvalidParameter {
                name: "tier",
                value: text,
            }),
        },
    }
}

/// GET /api/areas
pub async fn list_areas(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<FilterPage<PlanningArea>> {
    let ctx = &state.context;
    let filter = base_filter(ctx, &query);
    let page = ctx
        .area_engine()
        .apply(ctx.geography().areas(), &filter, query.page)
        .map(Clone::clone);
    Json(page)
}

/// GET /api/contractors
///
/// `state`: active | probation | inactive.
/// `tier`: Platinum | Gold | Silver | Bronze.
pub async fn list_contractors(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FilterPage<ContractorRow>>, ApiError> {
    let ctx = &state.context;
    let mut filter = base_filter(ctx, &query);
    filter.state = parse_named("state", query.state.as_deref())?;
    filter.tier = parse_named("tier", query.tier.as_deref())?;

    let engine = ctx.contractor_engine();
    let fields = engine.accessors();
    let page = engine
        .apply(ctx.contractors(), &filter, query.page)
        .map(|c| ContractorRow {
            contractor: c.clone(),
            status: c.status(),
            tier: fields.tier(c),
            completion_band: fields.completion_band(c),
        });

    Ok(Json(page))
}

/// GET /api/targets
///
/// `state`: fresh | stale | dormant.
/// `tier`: decile 1..=10.
pub async fn list_targets(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FilterPage<TargetRow>>, ApiError> {
    let ctx = &state.context;
    let mut filter = base_filter(ctx, &query);
    filter.state = parse_named("state", query.state.as_deref())?;
    filter.tier = parse_decile(query.tier.as_deref())?;

    let engine = ctx.target_engine();
    let fields = engine.accessors();
    let page = engine
        .apply(ctx.targets(), &filter, query.page)
        .map(|t| TargetRow {
            target: t.clone(),
            contact_state: ContactState::since(t.last_contacted, fields.as_of()),
            decile: fields.tier(t),
        });

    Ok(Json(page))
}
