use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::AppResult;
use crate::lenient;
use crate::taxonomy::FALLBACK_TAG;

const PLACES_KEY: &str = "places";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub lat: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub lng: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub image_url: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub rating: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_u64"
    )]
    pub user_ratings_total: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Place {
    pub fn is_retainable(&self) -> bool {
        !self.name.trim().is_empty() && !(self.lat == 0.0 && self.lng == 0.0)
    }

    pub fn lookup_key(&self) -> &str {
        self.name.trim()
    }

    pub fn apply_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cleaned: Vec<String> = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        if cleaned.is_empty() {
            self.category = FALLBACK_TAG.to_string();
            self.tags = vec![FALLBACK_TAG.to_string()];
        } else {
            self.category = cleaned[0].clone();
            self.tags = cleaned;
        }
    }

    pub fn apply_category(&mut self, category: &str) {
        self.category = category.to_string();
        self.tags = vec![category.to_string()];
    }

    pub fn adopt_category(&mut self, label: &str) {
        self.category = label.to_string();
        if !self.tags.iter().any(|tag| tag == label) {
            self.tags.push(label.to_string());
        }
    }

    pub fn effective_tags(&self) -> Vec<String> {
        if !self.tags.is_empty() {
            self.tags.clone()
        } else if !self.category.is_empty() {
            vec![self.category.clone()]
        } else {
            vec![FALLBACK_TAG.to_string()]
        }
    }

    pub fn update_from(&mut self, fresh: Place) {
        let Place {
            id,
            name,
            category,
            tags,
            city,
            address,
            lat,
            lng,
            description,
            image_url,
            rating,
            user_ratings_total,
            extra,
        } = fresh;
        self.id = id;
        self.name = name;
        self.category = category;
        self.tags = tags;
        self.city = city;
        self.address = address;
        self.lat = lat;
        self.lng = lng;
        self.description = description;
        self.image_url = image_url;
        self.rating = rating;
        self.user_ratings_total = user_ratings_total;
        self.extra.extend(extra);
    }
}

pub fn filter_fresh_batch(places: Vec<Place>) -> Vec<Place> {
    let before = places.len();
    let kept: Vec<Place> = places.into_iter().filter(Place::is_retainable).collect();
    if kept.len() < before {
        debug!(
            dropped = before - kept.len(),
            kept = kept.len(),
            "filtered invalid records from fresh batch"
        );
    }
    kept
}

/// The persisted catalog. Only the `places` key is owned by the pipeline;
/// every sibling key is written back exactly as it was read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogDocument {
    root: Map<String, Value>,
}

impl CatalogDocument {
    pub fn places(&self) -> AppResult<Vec<Place>> {
        match self.root.get(PLACES_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    pub fn set_places(&mut self, places: &[Place]) -> AppResult<()> {
        let encoded = serde_json::to_value(places)?;
        self.root.insert(PLACES_KEY.to_string(), encoded);
        Ok(())
    }

    pub fn sibling(&self, key: &str) -> Option<&Value> {
        if key == PLACES_KEY {
            return None;
        }
        self.root.get(key)
    }
}

impl From<Map<String, Value>> for CatalogDocument {
    fn from(root: Map<String, Value>) -> Self {
        Self { root }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn place(id: &str, name: &str, lat: f64, lng: f64) -> Place {
        Place {
            id: id.into(),
            name: name.into(),
            category: FALLBACK_TAG.into(),
            tags: vec![FALLBACK_TAG.into()],
            lat,
            lng,
            ..Place::default()
        }
    }

    #[test]
    fn zero_zero_coordinates_are_dropped() {
        let batch = vec![
            place("a", "Origin", 0.0, 0.0),
            place("b", "Meridian", 0.0, 25.03),
            place("c", "   ", 25.0, 121.5),
        ];
        let kept = filter_fresh_batch(batch);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");
    }

    #[test]
    fn apply_tags_trims_and_falls_back() {
        let mut p = place("a", "A", 1.0, 1.0);
        p.apply_tags([" heritage ", "", "temple"]);
        assert_eq!(p.category, "heritage");
        assert_eq!(p.tags, vec!["heritage", "temple"]);

        p.apply_tags(["  "]);
        assert_eq!(p.category, FALLBACK_TAG);
        assert_eq!(p.tags, vec![FALLBACK_TAG]);
    }

    #[test]
    fn adopt_category_extends_tags() {
        let mut p = place("a", "A", 1.0, 1.0);
        p.adopt_category("museum");
        assert_eq!(p.category, "museum");
        assert_eq!(p.tags, vec![FALLBACK_TAG, "museum"]);
        p.adopt_category("museum");
        assert_eq!(p.tags.len(), 2);
    }

    #[test]
    fn serializes_with_catalog_field_names() {
        let mut p = place("a", "A", 1.5, 2.5);
        p.image_url = "https://img".into();
        p.user_ratings_total = Some(10);
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["imageUrl"], "https://img");
        assert_eq!(value["userRatingsTotal"], 10);
        assert!(value.get("rating").is_none());
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "id");
        assert_eq!(keys[9], "imageUrl");
    }

    #[test]
    fn keeps_unknown_fields_through_update() {
        let mut existing: Place = serde_json::from_value(json!({
            "id": "a",
            "name": "Old",
            "lat": 1.0,
            "lng": 1.0,
            "featured": true
        }))
        .unwrap();
        let fresh = place("a", "New", 2.0, 2.0);
        existing.update_from(fresh);
        assert_eq!(existing.name, "New");
        assert_eq!(existing.lat, 2.0);
        assert_eq!(existing.extra.get("featured"), Some(&json!(true)));
    }

    #[test]
    fn document_preserves_sibling_keys_and_order() {
        let raw = json!({
            "users": [{"id": 1}],
            "places": [{"id": "a", "name": "A", "lat": 1.0, "lng": 2.0}],
            "version": 3
        });
        let mut doc: CatalogDocument = serde_json::from_value(raw).unwrap();
        let mut places = doc.places().unwrap();
        places.push(place("b", "B", 3.0, 4.0));
        doc.set_places(&places).unwrap();

        let value = serde_json::to_value(&doc).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["users", "places", "version"]);
        assert_eq!(value["users"], json!([{"id": 1}]));
        assert_eq!(value["places"].as_array().unwrap().len(), 2);
        assert_eq!(doc.sibling("version"), Some(&json!(3)));
        assert!(doc.sibling("places").is_none());
    }

    #[test]
    fn missing_places_key_reads_as_empty() {
        let doc: CatalogDocument = serde_json::from_value(json!({"users": []})).unwrap();
        assert!(doc.places().unwrap().is_empty());
    }
}
