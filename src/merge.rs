use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::catalog::{filter_fresh_batch, CatalogDocument, Place};
use crate::errors::AppResult;
use crate::reviews::ReviewBundle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Merge,
    Replace,
}

impl MergeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Some(Self::Merge),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    Apply,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideDecision {
    Tags(Vec<String>),
    Category(String),
    Keep,
}

impl OverrideDecision {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::Tags(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            Value::String(category) if !category.trim().is_empty() => {
                Self::Category(category.trim().to_string())
            }
            _ => Self::Keep,
        }
    }

    pub fn apply(&self, place: &mut Place) -> bool {
        match self {
            Self::Tags(tags) => place.apply_tags(tags),
            Self::Category(category) => place.apply_category(category),
            Self::Keep => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable {
    entries: Map<String, Value>,
}

impl OverrideTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn decision(&self, name: &str) -> Option<OverrideDecision> {
        self.entries.get(name).map(OverrideDecision::from_value)
    }

    pub fn record_if_absent(&mut self, name: &str, tags: Vec<String>) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        let encoded = Value::Array(tags.into_iter().map(Value::String).collect());
        self.entries.insert(name.to_string(), encoded);
        true
    }
}

impl From<Map<String, Value>> for OverrideTable {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

pub fn apply_overrides(places: &mut [Place], overrides: &OverrideTable) -> usize {
    if overrides.is_empty() {
        return 0;
    }
    let mut applied = 0;
    for place in places.iter_mut() {
        if let Some(decision) = overrides.decision(&place.name) {
            if decision.apply(place) {
                applied += 1;
            }
        }
    }
    applied
}

pub fn refresh_overrides(overrides: &mut OverrideTable, places: &[Place]) -> usize {
    let mut added = 0;
    for place in places {
        if overrides.record_if_absent(&place.name, place.effective_tags()) {
            added += 1;
        }
    }
    added
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub fresh: usize,
    pub dropped: usize,
    pub updated: usize,
    pub appended: usize,
    pub overrides_applied: usize,
    pub overrides_added: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub catalog: CatalogDocument,
    pub overrides: OverrideTable,
    pub stats: MergeStats,
}

/// Folds `fresh` into `existing` by id, then by name; unmatched records are
/// appended. Indices cover the existing records only, so two fresh records
/// sharing a name are both kept. When existing records repeat an id or name,
/// the last one is the match.
pub fn merge_places(existing: Vec<Place>, fresh: Vec<Place>) -> (Vec<Place>, usize, usize) {
    let mut merged = existing;
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, place) in merged.iter().enumerate() {
        if !place.id.is_empty() {
            by_id.insert(place.id.clone(), idx);
        }
        if !place.name.is_empty() {
            by_name.insert(place.name.clone(), idx);
        }
    }

    let (mut updated, mut appended) = (0, 0);
    for place in fresh {
        let target = by_id
            .get(&place.id)
            .or_else(|| by_name.get(&place.name))
            .copied();
        match target {
            Some(idx) => {
                merged[idx].update_from(place);
                updated += 1;
            }
            None => {
                merged.push(place);
                appended += 1;
            }
        }
    }
    (merged, updated, appended)
}

pub fn merge(
    existing: CatalogDocument,
    overrides: OverrideTable,
    fresh: Vec<Place>,
    mode: MergeMode,
    policy: OverridePolicy,
) -> AppResult<MergeOutcome> {
    let fresh_count = fresh.len();
    let mut fresh = filter_fresh_batch(fresh);
    let mut overrides = overrides;
    let mut stats = MergeStats {
        fresh: fresh_count,
        dropped: fresh_count - fresh.len(),
        ..MergeStats::default()
    };

    if policy == OverridePolicy::Apply {
        stats.overrides_applied = apply_overrides(&mut fresh, &overrides);
        stats.overrides_added = refresh_overrides(&mut overrides, &fresh);
    }

    let merged = match mode {
        MergeMode::Replace => {
            stats.appended = fresh.len();
            fresh
        }
        MergeMode::Merge => {
            let (merged, updated, appended) = merge_places(existing.places()?, fresh);
            stats.updated = updated;
            stats.appended = appended;
            merged
        }
    };
    stats.total = merged.len();

    let mut catalog = existing;
    catalog.set_places(&merged)?;
    info!(
        mode = mode.as_str(),
        fresh = stats.fresh,
        dropped = stats.dropped,
        updated = stats.updated,
        appended = stats.appended,
        total = stats.total,
        "merged catalog"
    );
    if policy == OverridePolicy::Apply {
        debug!(
            applied = stats.overrides_applied,
            added = stats.overrides_added,
            entries = overrides.len(),
            "refreshed override table"
        );
    }

    Ok(MergeOutcome {
        catalog,
        overrides,
        stats,
    })
}

pub fn backfill_tags(places: &mut [Place], bundles: &[ReviewBundle]) -> usize {
    let mut by_name: HashMap<&str, Option<Vec<String>>> = HashMap::new();
    for bundle in bundles {
        let key = bundle.key();
        let has_list = bundle.tags.as_ref().is_some_and(|tags| !tags.is_empty());
        if key.is_empty() || !has_list {
            continue;
        }
        by_name.insert(key, bundle.usable_tags());
    }

    let mut updated = 0;
    for place in places.iter_mut() {
        if let Some(Some(tags)) = by_name.get(place.lookup_key()) {
            place.tags = tags.clone();
            place.category = tags[0].clone();
            updated += 1;
        }
    }
    updated
}

pub fn backfill_ratings(places: &mut [Place], bundles: &[ReviewBundle]) -> usize {
    let mut by_name: HashMap<&str, &ReviewBundle> = HashMap::new();
    for bundle in bundles {
        let key = bundle.key();
        if !key.is_empty() {
            by_name.insert(key, bundle);
        }
    }

    let mut updated = 0;
    for place in places.iter_mut() {
        let Some(bundle) = by_name.get(place.lookup_key()) else {
            continue;
        };
        if bundle.rating.is_none() && bundle.user_ratings_total.is_none() {
            continue;
        }
        place.rating = bundle.rating;
        place.user_ratings_total = bundle.user_ratings_total;
        updated += 1;
    }
    updated
}
