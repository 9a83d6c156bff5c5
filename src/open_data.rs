use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::Place;
use crate::classifier::{classify_single, compose_text};
use crate::errors::{AppError, AppResult};
use crate::lenient;
use crate::places::JsonFetcher;

pub const MAX_ITEMS: usize = 1200;
pub const KEEP_COUNT: usize = 300;

const INFO_POINTER: &str = "/XML_Head/Infos/Info";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpenDataRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub toldescribe: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub class1: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub class2: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub add: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub picture1: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub py: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub px: f64,
}

pub fn parse_feed(document: &Value) -> AppResult<Vec<OpenDataRecord>> {
    let items = document
        .pointer(INFO_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Config("open data feed has no XML_Head.Infos.Info array".into()))?;

    let mut records = Vec::with_capacity(items.len());
    for item in items.iter().filter(|item| item.is_object()) {
        match OpenDataRecord::deserialize(item) {
            Ok(record) => records.push(record),
            Err(err) => warn!(?err, "skipping malformed open data record"),
        }
    }
    Ok(records)
}

pub async fn fetch_feed(fetcher: &dyn JsonFetcher, url: &str) -> AppResult<Vec<OpenDataRecord>> {
    info!(url, "downloading open data feed");
    let document = fetcher.fetch(url, &[]).await?;
    let records = parse_feed(&document)?;
    info!(items = records.len(), "fetched open data feed");
    Ok(records)
}

pub fn build_places(records: &[OpenDataRecord]) -> Vec<Place> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut places = Vec::new();

    for record in records.iter().take(MAX_ITEMS) {
        let name = record.name.as_str();
        if name.is_empty() || seen.contains(name) {
            continue;
        }
        if record.py == 0.0 && record.px == 0.0 {
            debug!(name, "skipping record without coordinates");
            continue;
        }
        seen.insert(name);

        let description = record.toldescribe.trim();
        let text = compose_text([
            name,
            description,
            record.class1.as_str(),
            record.class2.as_str(),
        ]);
        let category = classify_single(&text);

        places.push(Place {
            id: first_non_empty(&record.id, name),
            name: name.to_string(),
            category: category.to_string(),
            tags: vec![category.to_string()],
            city: first_non_empty(&record.region, &record.city),
            address: record.add.clone(),
            lat: record.py,
            lng: record.px,
            description: description.to_string(),
            image_url: record.picture1.clone(),
            ..Place::default()
        });
        if places.len() >= KEEP_COUNT {
            break;
        }
    }
    info!(kept = places.len(), "built places from open data");
    places
}

fn first_non_empty(primary: &str, fallback: &str) -> String {
    if primary.is_empty() {
        fallback.to_string()
    } else {
        primary.to_string()
    }
}
