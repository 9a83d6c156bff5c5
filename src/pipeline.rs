use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Place;
use crate::classifier::{classify, classify_multi, LabelMode};
use crate::errors::{AppError, AppResult};
use crate::merge::{
    self, backfill_ratings, backfill_tags, MergeMode, MergeStats, OverridePolicy, OverrideTable,
};
use crate::open_data::{build_places, fetch_feed};
use crate::places::{JsonFetcher, PlaceDetails, PlacesClient, RequestBudget, SearchHit};
use crate::refine::{PlaceRefiner, ReviewGate};
use crate::reviews::{upsert_bundles, ReviewBundle, ReviewFilter};
use crate::store::{self, DataPaths};
use crate::taxonomy::{extract_city, FALLBACK_TAG};

pub const SEED_MAX_REQUESTS: u32 = 100;
pub const SEED_DELAY_MS: u64 = 200;
pub const REVIEW_MAX_REQUESTS: u32 = 300;
pub const REVIEW_DELAY_MS: u64 = 100;

const PROGRESS_EVERY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    BudgetExhausted,
    QuotaExceeded(String),
}

impl StopReason {
    fn from_error(err: &AppError) -> Option<Self> {
        if !err.is_run_stop() {
            return None;
        }
        match err {
            AppError::QuotaExceeded(detail) => Some(Self::QuotaExceeded(detail.clone())),
            AppError::BudgetExhausted { .. } => Some(Self::BudgetExhausted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: &'static str,
    pub collected: usize,
    pub updated: usize,
    pub total: usize,
    pub requests_used: u32,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStats>,
}

impl RunReport {
    fn new(run: &'static str) -> Self {
        Self {
            run,
            collected: 0,
            updated: 0,
            total: 0,
            requests_used: 0,
            stop: StopReason::Completed,
            merge: None,
        }
    }

    pub fn quota_exceeded(&self) -> bool {
        matches!(self.stop, StopReason::QuotaExceeded(_))
    }
}

pub async fn run_open_data(
    fetcher: &dyn JsonFetcher,
    url: &str,
    paths: &DataPaths,
    mode: MergeMode,
) -> AppResult<RunReport> {
    let mut report = RunReport::new("open-data");
    let records = fetch_feed(fetcher, url).await?;
    let mut places = build_places(&records);
    report.collected = places.len();

    let refiner = PlaceRefiner::train(&places);
    let refined = refiner.refine(&mut places);
    if refiner.is_active() {
        info!(refined, "refined fallback categories");
    }

    let catalog = store::load_catalog_or_default(&paths.catalog)?;
    let overrides = store::load_overrides(&paths.overrides);
    let outcome = merge::merge(catalog, overrides, places, mode, OverridePolicy::Apply)?;

    store::persist_document(&paths.overrides, &outcome.overrides)?;
    store::persist_document(&paths.catalog, &outcome.catalog)?;
    info!(
        catalog = %paths.catalog.display(),
        overrides = %paths.overrides.display(),
        "wrote open data results"
    );

    report.updated = outcome.stats.updated;
    report.total = outcome.stats.total;
    report.merge = Some(outcome.stats);
    Ok(report)
}

pub async fn run_google_seed(
    client: &PlacesClient,
    budget: &RequestBudget,
    queries: &[String],
    paths: &DataPaths,
    mode: MergeMode,
) -> AppResult<RunReport> {
    let mut report = RunReport::new("seed-google");
    let catalog = store::load_catalog(&paths.catalog)?;
    let existing_bundles = store::load_review_bundles(&paths.reviews)?;
    let filter = ReviewFilter::default();

    let mut seen: HashSet<String> = HashSet::new();
    let mut fresh: Vec<Place> = Vec::new();
    let mut bundles: Vec<ReviewBundle> = Vec::new();

    'queries: for query in queries {
        if budget.is_exhausted() {
            report.stop = StopReason::BudgetExhausted;
            break;
        }
        let hits = match client.search_results(budget, query).await {
            Ok(hits) => hits,
            Err(err) => match StopReason::from_error(&err) {
                Some(reason) => {
                    warn!(error = %err, "stopping seed run");
                    report.stop = reason;
                    break;
                }
                None => {
                    warn!(query = %query, error = %err, "text search failed; skipping query");
                    continue;
                }
            },
        };

        for hit in hits {
            let Some(place_id) = hit.place_id.clone().filter(|id| !id.is_empty()) else {
                continue;
            };
            if hit.name.is_empty() || seen.contains(&place_id) || seen.contains(&hit.name) {
                continue;
            }
            seen.insert(place_id.clone());
            seen.insert(hit.name.clone());

            let details = match client.place_details(budget, &place_id).await {
                Ok(details) => details,
                Err(err) => match StopReason::from_error(&err) {
                    Some(reason) => {
                        warn!(error = %err, "stopping seed run");
                        report.stop = reason;
                        break 'queries;
                    }
                    None => {
                        warn!(name = %hit.name, error = %err, "details failed; skipping place");
                        continue;
                    }
                },
            };
            let (place, bundle) = seed_place(&place_id, &hit, details.as_ref(), &filter);
            fresh.push(place);
            bundles.push(bundle);
        }
        info!(
            query = %query,
            accumulated = fresh.len(),
            used = budget.used(),
            limit = budget.limit(),
            "finished query"
        );
    }

    report.collected = fresh.len();
    report.requests_used = budget.used();

    let outcome = merge::merge(
        catalog,
        OverrideTable::default(),
        fresh,
        mode,
        OverridePolicy::Ignore,
    )?;
    store::persist_document(&paths.catalog, &outcome.catalog)?;
    if !bundles.is_empty() {
        let merged = upsert_bundles(existing_bundles, bundles);
        store::persist_document(&paths.reviews, &merged)?;
    }
    info!(
        catalog = %paths.catalog.display(),
        added_or_updated = report.collected,
        "wrote seed results"
    );

    report.updated = outcome.stats.updated;
    report.total = outcome.stats.total;
    report.merge = Some(outcome.stats);
    Ok(report)
}

pub fn seed_place(
    place_id: &str,
    hit: &SearchHit,
    details: Option<&PlaceDetails>,
    filter: &ReviewFilter,
) -> (Place, ReviewBundle) {
    let name = hit.name.clone();
    let address = hit.formatted_address.clone();
    let location = match details.and_then(|d| d.geometry.as_ref()) {
        Some(geometry) => geometry.location,
        None => hit.location(),
    }
    .unwrap_or_default();
    let types = details
        .map(|d| d.types.clone())
        .filter(|types| !types.is_empty())
        .unwrap_or_else(|| hit.types.clone());
    let rating = details.and_then(|d| d.rating).or(hit.rating);
    let ratings_total = details
        .and_then(|d| d.user_ratings_total)
        .or(hit.user_ratings_total);
    let editorial = details.map(PlaceDetails::editorial).unwrap_or_default();
    let raw_reviews = details.map(PlaceDetails::review_texts).unwrap_or_default();
    let reviews = filter.clean(&raw_reviews, None);

    let text = format!("{name} {address} {editorial} {}", reviews.join(" "));
    let tags = classify(&text, &types, None, LabelMode::Multi);
    let category = tags
        .first()
        .cloned()
        .unwrap_or_else(|| FALLBACK_TAG.to_string());

    let place = Place {
        id: place_id.to_string(),
        name: name.clone(),
        category,
        tags,
        city: extract_city(&address).to_string(),
        address: address.clone(),
        lat: location.lat,
        lng: location.lng,
        description: editorial.clone(),
        rating,
        user_ratings_total: ratings_total,
        ..Place::default()
    };
    let bundle = ReviewBundle {
        source_name: Some(name.clone()),
        name,
        formatted_address: Some(address),
        rating,
        user_ratings_total: ratings_total,
        types,
        editorial_summary: editorial,
        reviews,
        ..ReviewBundle::default()
    };
    (place, bundle)
}

pub async fn run_review_enrichment(
    client: &PlacesClient,
    budget: &RequestBudget,
    paths: &DataPaths,
    use_model: bool,
    merge_to_db: bool,
) -> AppResult<RunReport> {
    let mut report = RunReport::new("enrich-reviews");
    let mut catalog = store::load_catalog(&paths.catalog)?;
    let places = catalog.places()?;
    let total_places = places.len();

    let mut staged: Vec<(ReviewBundle, Vec<String>)> = Vec::new();
    let mut pool: Vec<String> = Vec::new();

    for (idx, place) in places.iter().enumerate() {
        if place.name.is_empty() {
            continue;
        }
        let category = if place.category.is_empty() {
            FALLBACK_TAG.to_string()
        } else {
            place.category.clone()
        };
        let query = format!("{} {}", place.name, place.city).trim().to_string();

        let hit = match client.text_search(budget, &query).await {
            Ok(hit) => hit,
            Err(err) => match StopReason::from_error(&err) {
                Some(reason) => {
                    warn!(error = %err, "stopping review run");
                    report.stop = reason;
                    break;
                }
                None => {
                    warn!(name = %place.name, error = %err, "text search failed; skipping");
                    continue;
                }
            },
        };
        let Some(place_id) = hit.and_then(|h| h.place_id).filter(|id| !id.is_empty()) else {
            info!(name = %place.name, "no place id found; skipping");
            continue;
        };

        let details = match client.place_details(budget, &place_id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                info!(name = %place.name, "no details returned; skipping");
                continue;
            }
            Err(err) => match StopReason::from_error(&err) {
                Some(reason) => {
                    warn!(error = %err, "stopping review run");
                    report.stop = reason;
                    break;
                }
                None => {
                    warn!(name = %place.name, error = %err, "details failed; skipping");
                    continue;
                }
            },
        };

        let raw_reviews = details.review_texts();
        pool.extend(raw_reviews.iter().cloned());
        let location = details.location();
        let bundle = ReviewBundle {
            source_name: Some(place.name.clone()),
            category: Some(category),
            place_id: Some(place_id),
            name: details.name.clone(),
            address: Some(details.formatted_address.clone()),
            lat: location.map(|l| l.lat),
            lng: location.map(|l| l.lng),
            rating: details.rating,
            user_ratings_total: details.user_ratings_total,
            editorial_summary: details.editorial(),
            types: details.types,
            ..ReviewBundle::default()
        };
        staged.push((bundle, raw_reviews));

        if (idx + 1) % PROGRESS_EVERY == 0 {
            info!(
                progress = idx + 1,
                total = total_places,
                used = budget.used(),
                limit = budget.limit(),
                "review run progress"
            );
        }
        if budget.is_exhausted() {
            info!(limit = budget.limit(), "request budget reached; ending early");
            report.stop = StopReason::BudgetExhausted;
            break;
        }
    }

    let gate = if use_model {
        ReviewGate::train(&pool)
    } else {
        ReviewGate::Noop
    };
    let filter = ReviewFilter::default();
    let output: Vec<ReviewBundle> = staged
        .into_iter()
        .map(|(mut bundle, raw_reviews)| {
            bundle.reviews = filter.clean(&raw_reviews, gate.as_quality_gate());
            let source_name = bundle.source_name.clone().unwrap_or_default();
            let text = format!(
                "{} {} {}",
                source_name,
                bundle.editorial_summary,
                bundle.reviews.join(" ")
            );
            let fallback = bundle.category.as_deref().unwrap_or(FALLBACK_TAG);
            bundle.tags = Some(classify_multi(&text, &bundle.types, Some(fallback)));
            bundle
        })
        .collect();

    report.collected = output.len();
    report.requests_used = budget.used();
    store::persist_document(&paths.reviews, &output)?;
    info!(
        path = %paths.reviews.display(),
        bundles = output.len(),
        requests = budget.used(),
        "wrote review bundles"
    );

    if merge_to_db {
        let mut places = places;
        report.updated = backfill_tags(&mut places, &output);
        report.total = places.len();
        catalog.set_places(&places)?;
        store::persist_document(&paths.catalog, &catalog)?;
        info!(updated = report.updated, "merged review tags into catalog");
    } else {
        debug!("catalog merge disabled");
    }
    Ok(report)
}

pub fn run_merge_tags(paths: &DataPaths) -> AppResult<RunReport> {
    run_backfill("merge-tags", paths, backfill_tags)
}

pub fn run_merge_ratings(paths: &DataPaths) -> AppResult<RunReport> {
    run_backfill("merge-ratings", paths, backfill_ratings)
}

fn run_backfill(
    run: &'static str,
    paths: &DataPaths,
    apply: fn(&mut [Place], &[ReviewBundle]) -> usize,
) -> AppResult<RunReport> {
    let mut catalog = store::load_catalog(&paths.catalog)?;
    let bundles = store::require_review_bundles(&paths.reviews)?;
    let mut places = catalog.places()?;

    let updated = apply(&mut places, &bundles);
    catalog.set_places(&places)?;
    store::persist_document(&paths.catalog, &catalog)?;
    info!(run, updated, total = places.len(), "backfilled catalog");

    let mut report = RunReport::new(run);
    report.collected = bundles.len();
    report.updated = updated;
    report.total = places.len();
    Ok(report)
}
