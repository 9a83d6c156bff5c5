use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::lenient;
use crate::refine::ModelError;

pub const MIN_REVIEW_LEN: usize = 12;
pub const REVIEWS_LIMIT: usize = 5;
pub const MIN_MODEL_PROB: f64 = 0.55;

const NOISE_HINTS: &[&str] = &[
    "哈哈", "呵呵", "👍", "讚", "推", "推推", "好讚", "超讚", "很棒", "不錯",
];
const NOISE_MAX_LEN: usize = 30;

const INFO_HINTS: &[&str] = &[
    "交通", "停車", "導覽", "展覽", "門票", "票價", "環境", "服務", "親子", "步道", "景色",
    "風景", "餐廳", "咖啡", "人潮", "排隊", "廁所", "推薦", "地址", "捷運", "公車",
];

pub trait QualityGate {
    fn positive_probability(&self, text: &str) -> Result<f64, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewFilter {
    pub min_len: usize,
    pub limit: usize,
    pub min_probability: f64,
}

impl Default for ReviewFilter {
    fn default() -> Self {
        Self {
            min_len: MIN_REVIEW_LEN,
            limit: REVIEWS_LIMIT,
            min_probability: MIN_MODEL_PROB,
        }
    }
}

impl ReviewFilter {
    /// Trims, drops short texts and repeats, consults the gate when given,
    /// and stops at `limit`. Input order is preserved. A gate error keeps
    /// the candidate.
    pub fn clean<S: AsRef<str>>(&self, raw: &[S], gate: Option<&dyn QualityGate>) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cleaned = Vec::new();
        for entry in raw {
            if cleaned.len() >= self.limit {
                break;
            }
            let text = entry.as_ref().trim();
            if text.chars().count() < self.min_len || seen.contains(text) {
                continue;
            }
            if let Some(gate) = gate {
                match gate.positive_probability(text) {
                    Ok(score) if score < self.min_probability => continue,
                    Ok(_) => {}
                    Err(err) => debug!(?err, "quality gate failed; keeping review"),
                }
            }
            seen.insert(text);
            cleaned.push(text.to_string());
        }
        cleaned
    }
}

pub fn label_review(text: &str) -> Option<bool> {
    let length = text.chars().count();
    if length < MIN_REVIEW_LEN {
        return Some(false);
    }
    if length < NOISE_MAX_LEN && NOISE_HINTS.iter().any(|hint| text.contains(hint)) {
        return Some(false);
    }
    if INFO_HINTS.iter().any(|hint| text.contains(hint)) {
        return Some(true);
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewBundle {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub source_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub category: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub place_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub address: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub formatted_address: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub lat: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub user_ratings_total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub editorial_summary: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub reviews: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string_list"
    )]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewBundle {
    pub fn key(&self) -> &str {
        self.source_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
            .trim()
    }

    pub fn usable_tags(&self) -> Option<Vec<String>> {
        let tags: Vec<String> = self
            .tags
            .as_ref()?
            .iter()
            .filter(|tag| !tag.trim().is_empty())
            .cloned()
            .collect();
        (!tags.is_empty()).then_some(tags)
    }
}

pub fn bundles_from_value(value: Value) -> Option<Vec<ReviewBundle>> {
    let Value::Array(items) = value else {
        return None;
    };
    let mut bundles = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            continue;
        }
        match serde_json::from_value::<ReviewBundle>(item) {
            Ok(bundle) => bundles.push(bundle),
            Err(err) => debug!(?err, "skipping malformed review bundle"),
        }
    }
    Some(bundles)
}

pub fn upsert_bundles(existing: Vec<ReviewBundle>, fresh: Vec<ReviewBundle>) -> Vec<ReviewBundle> {
    let mut ordered: Vec<ReviewBundle> = Vec::with_capacity(existing.len() + fresh.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    let mut put = |bundle: ReviewBundle, ordered: &mut Vec<ReviewBundle>| {
        let key = bundle.key().to_string();
        match positions.get(&key) {
            Some(&idx) => ordered[idx] = bundle,
            None => {
                positions.insert(key, ordered.len());
                ordered.push(bundle);
            }
        }
    };

    for bundle in existing {
        put(bundle, &mut ordered);
    }
    for bundle in fresh {
        if bundle.key().is_empty() {
            continue;
        }
        put(bundle, &mut ordered);
    }
    ordered
}
