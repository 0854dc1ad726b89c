//! Entity filter engine
//!
//! Composes independent per-dimension predicates (search text, region,
//! planning area, derived state, tier, date range) into one conjunctive
//! query. Every dimension holds either a concrete value or the
//! [`Dimension::All`] sentinel, and `All` never excludes a record.
//!
//! The engine is generic over the entity type: a [`FieldAccessors`]
//! implementation tells it where each dimension lives on a record. It works
//! on any iterator of borrowed records, whether a locally generated
//! collection or a page fetched from elsewhere, and never re-sorts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geography::region_of;
use crate::pagination::{calculate_pagination, Pagination, DEFAULT_PAGE_SIZE};
use crate::tier::Classification;

/// One filter dimension: the `All` sentinel or a concrete value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension<T> {
    /// Impose no constraint on this dimension
    All,
    Only(T),
}

impl<T> Default for Dimension<T> {
    fn default() -> Self {
        Dimension::All
    }
}

impl<T> Dimension<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Dimension::All)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Dimension::All => None,
            Dimension::Only(value) => Some(value),
        }
    }

    /// `All` is always true; otherwise defer to `predicate`
    pub fn admits(&self, predicate: impl FnOnce(&T) -> bool) -> bool {
        match self {
            Dimension::All => true,
            Dimension::Only(value) => predicate(value),
        }
    }
}

impl<T> From<Option<T>> for Dimension<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Dimension::Only).unwrap_or(Dimension::All)
    }
}

impl Dimension<String> {
    /// Parse a text dimension: empty, whitespace or "ALL" (any case) is the sentinel
    pub fn parse_text(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Dimension::All,
            Some(s) if s.eq_ignore_ascii_case("all") => Dimension::All,
            Some(s) => Dimension::Only(s.to_string()),
        }
    }
}

/// Inclusive date range; a missing end is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Where each filter dimension lives on an entity of type `T`
pub trait FieldAccessors<T> {
    /// Derived state compared by equality (e.g. active / probation)
    type State: PartialEq;
    /// Tier label compared by equality
    type Tier: PartialEq;

    /// String fields searched by the free-text dimension
    fn search_fields<'a>(&self, entity: &'a T) -> Vec<&'a str>;

    /// Planning-area display name the entity belongs to
    fn planning_area<'a>(&self, entity: &'a T) -> &'a str;

    /// Derived state, if the entity has one
    fn state(&self, entity: &T) -> Option<Self::State>;

    /// Tier of the entity's tiered metric
    fn tier(&self, entity: &T) -> Classification<Self::Tier>;

    /// Date compared against the date-range dimension
    fn date(&self, entity: &T) -> Option<NaiveDate>;
}

/// Conjunctive filter over all dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter<S, K> {
    pub search: Dimension<String>,
    pub region: Dimension<String>,
    pub area: Dimension<String>,
    pub state: Dimension<S>,
    pub tier: Dimension<K>,
    pub dates: Dimension<DateRange>,
}

impl<S, K> Default for Filter<S, K> {
    fn default() -> Self {
        Self {
            search: Dimension::All,
            region: Dimension::All,
            area: Dimension::All,
            state: Dimension::All,
            tier: Dimension::All,
            dates: Dimension::All,
        }
    }
}

/// A single setFilter(dimension, value) operation
#[derive(Debug, Clone, PartialEq)]
pub enum FilterUpdate<S, K> {
    Search(Dimension<String>),
    Region(Dimension<String>),
    Area(Dimension<String>),
    State(Dimension<S>),
    Tier(Dimension<K>),
    Dates(Dimension<DateRange>),
}

impl<S, K> Filter<S, K> {
    /// Filter with every dimension set to `All`
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, text: &str) -> Self {
        self.search = Dimension::parse_text(Some(text));
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Dimension::Only(region.to_string());
        self
    }

    pub fn with_area(mut self, area: &str) -> Self {
        self.area = Dimension::Only(area.to_string());
        self
    }

    pub fn with_state(mut self, state: S) -> Self {
        self.state = Dimension::Only(state);
        self
    }

    pub fn with_tier(mut self, tier: K) -> Self {
        self.tier = Dimension::Only(tier);
        self
    }

    pub fn with_dates(mut self, range: DateRange) -> Self {
        self.dates = Dimension::Only(range);
        self
    }

    /// Apply one dimension change, leaving the others untouched
    pub fn set(&mut self, update: FilterUpdate<S, K>) {
        match update {
            FilterUpdate::Search(d) => {
                self.search = match d {
                    Dimension::Only(text) => Dimension::parse_text(Some(&text)),
                    Dimension::All => Dimension::All,
                }
            }
            FilterUpdate::Region(d) => self.region = d,
            FilterUpdate::Area(d) => self.area = d,
            FilterUpdate::State(d) => self.state = d,
            FilterUpdate::Tier(d) => self.tier = d,
            FilterUpdate::Dates(d) => self.dates = d,
        }
    }

    /// True when no dimension constrains anything
    pub fn is_unconstrained(&self) -> bool {
        self.search.is_all()
            && self.region.is_all()
            && self.area.is_all()
            && self.state.is_all()
            && self.tier.is_all()
            && self.dates.is_all()
    }
}

/// Filter with its search needle lowercased once per query
struct CompiledFilter<'f, S, K> {
    filter: &'f Filter<S, K>,
    needle: Option<String>,
}

impl<'f, S: PartialEq, K: PartialEq> CompiledFilter<'f, S, K> {
    fn new(filter: &'f Filter<S, K>) -> Self {
        let needle = filter.search.value().map(|s| s.trim().to_lowercase());
        Self { filter, needle }
    }

    // Cheapest predicates first; substring search runs last.
    fn matches<T, A>(&self, accessors: &A, entity: &T) -> bool
    where
        A: FieldAccessors<T, State = S, Tier = K>,
    {
        let f = self.filter;

        f.state.admits(|want| accessors.state(entity).as_ref() == Some(want))
            && f.tier.admits(|want| accessors.tier(entity).tier() == Some(want))
            && f.area.admits(|want| accessors.planning_area(entity) == want)
            && f.region.admits(|want| region_of(accessors.planning_area(entity)).matches(want))
            && f.dates.admits(|range| accessors.date(entity).is_some_and(|d| range.contains(d)))
            && self.needle.as_deref().map_or(true, |needle| {
                accessors
                    .search_fields(entity)
                    .iter()
                    .any(|field| contains_ignore_case(field, needle))
            })
    }
}

/// Case-insensitive substring test; `needle` must already be lowercase
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.is_ascii() && needle.is_ascii() {
        let (h, n) = (haystack.as_bytes(), needle.as_bytes());
        return h.len() >= n.len() && h.windows(n.len()).any(|w| w.eq_ignore_ascii_case(n));
    }
    haystack.to_lowercase().contains(needle)
}

/// One page of filtered results plus the full match count
#[derive(Debug, Clone, Serialize)]
pub struct FilterPage<T> {
    #[serde(flatten)]
    pub pagination: Pagination,
    /// "showing first N of M" style disclosure for the list view
    pub showing: String,
    pub items: Vec<T>,
}

impl<T> FilterPage<T> {
    fn new(pagination: Pagination, items: Vec<T>) -> Self {
        Self {
            showing: pagination.disclosure(),
            pagination,
            items,
        }
    }

    /// Total matches before truncation
    pub fn total(&self) -> usize {
        self.pagination.total
    }

    pub fn is_truncated(&self) -> bool {
        self.pagination.is_truncated()
    }

    pub fn disclosure(&self) -> &str {
        &self.showing
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> FilterPage<U> {
        FilterPage {
            pagination: self.pagination,
            showing: self.showing,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Filter engine bound to one entity shape via its accessors
#[derive(Debug, Clone)]
pub struct FilterEngine<A> {
    accessors: A,
    page_size: usize,
}

impl<A> FilterEngine<A> {
    pub fn new(accessors: A) -> Self {
        Self {
            accessors,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn accessors(&self) -> &A {
        &self.accessors
    }

    /// Test a single entity against `filter`
    pub fn matches<T>(&self, entity: &T, filter: &Filter<A::State, A::Tier>) -> bool
    where
        A: FieldAccessors<T>,
    {
        CompiledFilter::new(filter).matches(&self.accessors, entity)
    }

    /// Every match, in input order
    pub fn filter<'a, T, I>(&self, entities: I, filter: &Filter<A::State, A::Tier>) -> Vec<&'a T>
    where
        T: 'a,
        A: FieldAccessors<T>,
        I: IntoIterator<Item = &'a T>,
    {
        let compiled = CompiledFilter::new(filter);
        entities
            .into_iter()
            .filter(|entity| compiled.matches(&self.accessors, *entity))
            .collect()
    }

    /// Filter, then cut page `page` (1-indexed, clamped) at the engine's page size
    pub fn apply<'a, T, I>(
        &self,
        entities: I,
        filter: &Filter<A::State, A::Tier>,
        page: usize,
    ) -> FilterPage<&'a T>
    where
        T: 'a,
        A: FieldAccessors<T>,
        I: IntoIterator<Item = &'a T>,
    {
        let matched = self.filter(entities, filter);
        let pagination = calculate_pagination(matched.len(), page, self.page_size);
        let items = matched
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.page_size)
            .collect();

        FilterPage::new(pagination, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::{gpe_ratio_tiers, PerformanceTier, TierTable};

    #[derive(Debug, Clone, PartialEq)]
    struct Job {
        title: &'static str,
        crew: &'static str,
        area: &'static str,
        open: bool,
        ratio: f64,
        due: Option<NaiveDate>,
    }

    struct JobFields {
        tiers: TierTable<PerformanceTier>,
    }

    impl FieldAccessors<Job> for JobFields {
        type State = bool;
        type Tier = PerformanceTier;

        fn search_fields<'a>(&self, job: &'a Job) -> Vec<&'a str> {
            vec![job.title, job.crew]
        }

        fn planning_area<'a>(&self, job: &'a Job) -> &'a str {
            job.area
        }

        fn state(&self, job: &Job) -> Option<bool> {
            Some(job.open)
        }

        fn tier(&self, job: &Job) -> Classification<PerformanceTier> {
            self.tiers.classify(job.ratio)
        }

        fn date(&self, job: &Job) -> Option<NaiveDate> {
            job.due
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn jobs() -> Vec<Job> {
        vec![
            Job { title: "Water heater swap", crew: "Delgado", area: "CA Metro", open: true, ratio: 101.0, due: Some(day(2)) },
            Job { title: "Panel upgrade", crew: "Okafor", area: "CA North", open: false, ratio: 108.0, due: Some(day(9)) },
            Job { title: "Roof patch", crew: "Lindqvist", area: "NV Metro", open: true, ratio: 125.0, due: None },
            Job { title: "Gutter clean", crew: "DELGADO", area: "bogus", open: true, ratio: f64::NAN, due: Some(day(20)) },
        ]
    }

    fn engine() -> FilterEngine<JobFields> {
        FilterEngine::new(JobFields { tiers: gpe_ratio_tiers() })
    }

    fn titles(found: &[&Job]) -> Vec<&'static str> {
        found.iter().map(|j| j.title).collect()
    }

    #[test]
    fn test_all_sentinel_admits_everything() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all());
        assert_eq!(found.len(), data.len());
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all().with_search("delgado"));
        assert_eq!(titles(&found), vec!["Water heater swap", "Gutter clean"]);

        let found = engine().filter(&data, &Filter::all().with_search("PANEL"));
        assert_eq!(titles(&found), vec!["Panel upgrade"]);
    }

    #[test]
    fn test_blank_search_is_all() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all().with_search("   "));
        assert_eq!(found.len(), data.len());
    }

    #[test]
    fn test_region_uses_leading_token() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all().with_region("CA"));
        assert_eq!(titles(&found), vec!["Water heater swap", "Panel upgrade"]);
    }

    #[test]
    fn test_malformed_area_never_matches_region() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all().with_region("unknown"));
        assert!(found.is_empty());
    }

    #[test]
    fn test_unclassified_only_matches_all_tier() {
        let data = jobs();
        let found = engine().filter(&data, &Filter::all().with_tier(PerformanceTier::Bronze));
        assert_eq!(titles(&found), vec!["Roof patch"]);
    }

    #[test]
    fn test_state_and_area_equality() {
        let data = jobs();
        let filter = Filter::all().with_state(true).with_area("NV Metro");
        assert_eq!(titles(&engine().filter(&data, &filter)), vec!["Roof patch"]);
    }

    #[test]
    fn test_date_range_inclusive_and_missing_dates_excluded() {
        let data = jobs();
        let filter = Filter::all().with_dates(DateRange::new(Some(day(2)), Some(day(9))));
        assert_eq!(
            titles(&engine().filter(&data, &filter)),
            vec!["Water heater swap", "Panel upgrade"]
        );

        let open_ended = Filter::all().with_dates(DateRange::new(Some(day(10)), None));
        assert_eq!(titles(&engine().filter(&data, &open_ended)), vec!["Gutter clean"]);
    }

    #[test]
    fn test_set_updates_single_dimension() {
        let mut filter: Filter<bool, PerformanceTier> = Filter::all().with_region("CA");
        filter.set(FilterUpdate::Search(Dimension::Only("panel".to_string())));
        assert_eq!(filter.region, Dimension::Only("CA".to_string()));
        assert_eq!(filter.search, Dimension::Only("panel".to_string()));

        filter.set(FilterUpdate::Region(Dimension::All));
        filter.set(FilterUpdate::Search(Dimension::Only(" ".to_string())));
        assert!(filter.is_unconstrained());
    }

    #[test]
    fn test_apply_reports_total_and_truncates() {
        let data = jobs();
        let page = engine().with_page_size(3).apply(&data, &Filter::all(), 1);
        assert_eq!(page.total(), 4);
        assert_eq!(page.items.len(), 3);
        assert!(page.is_truncated());
        assert_eq!(page.disclosure(), "showing first 3 of 4");

        let page = engine().with_page_size(3).apply(&data, &Filter::all(), 2);
        assert_eq!(titles(&page.items), vec!["Gutter clean"]);
    }

    #[test]
    fn test_parse_text_sentinels() {
        assert_eq!(Dimension::parse_text(None), Dimension::All);
        assert_eq!(Dimension::parse_text(Some("ALL")), Dimension::All);
        assert_eq!(Dimension::parse_text(Some("all")), Dimension::All);
        assert_eq!(Dimension::parse_text(Some(" CA ")), Dimension::Only("CA".to_string()));
    }

    #[test]
    fn test_contains_ignore_case_non_ascii() {
        assert!(contains_ignore_case("Éclair Plumbing", "éclair"));
        assert!(contains_ignore_case("anything", ""));
        assert!(!contains_ignore_case("ab", "abc"));
    }
}
