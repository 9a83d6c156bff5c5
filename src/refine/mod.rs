mod centroid;
mod logistic;
mod vectorizer;

use thiserror::Error;
use tracing::{debug, info};

pub use centroid::CentroidClassifier;
pub use logistic::LogisticModel;
pub use vectorizer::{tokenize, TfidfVectorizer};

use crate::catalog::Place;
use crate::reviews::{label_review, QualityGate};
use crate::taxonomy::FALLBACK_TAG;

pub const MIN_PLACE_SAMPLES: usize = 2;
pub const MIN_REVIEW_SAMPLES: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("text has no features known to the model")]
    EmptyFeatures,
    #[error("model has no classes")]
    Untrained,
}

pub fn enabled() -> bool {
    cfg!(feature = "refine")
}

#[derive(Debug, Clone)]
pub enum PlaceRefiner {
    Centroid(CentroidClassifier),
    Noop,
}

impl PlaceRefiner {
    pub fn train(places: &[Place]) -> Self {
        if !enabled() {
            return Self::Noop;
        }
        let samples: Vec<(String, String)> = places
            .iter()
            .filter(|place| !place.category.is_empty() && place.category != FALLBACK_TAG)
            .map(|place| {
                (
                    format!("{} {}", place.name, place.description),
                    place.category.clone(),
                )
            })
            .collect();
        if samples.len() < MIN_PLACE_SAMPLES {
            debug!(samples = samples.len(), "too few labelled places to train refiner");
            return Self::Noop;
        }
        match CentroidClassifier::fit(&samples) {
            Some(model) => {
                info!(samples = samples.len(), "trained place refiner");
                Self::Centroid(model)
            }
            None => {
                debug!("labelled places cover a single category; refiner disabled");
                Self::Noop
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Centroid(_))
    }

    pub fn refine(&self, places: &mut [Place]) -> usize {
        let Self::Centroid(model) = self else {
            return 0;
        };
        let mut changed = 0;
        for place in places.iter_mut().filter(|p| p.category == FALLBACK_TAG) {
            let text = format!("{} {}", place.name, place.description);
            match model.predict(&text) {
                Ok(label) => {
                    place.adopt_category(label);
                    changed += 1;
                }
                Err(err) => debug!(name = %place.name, %err, "refiner skipped record"),
            }
        }
        changed
    }
}

#[derive(Debug, Clone)]
pub enum ReviewGate {
    Logistic(LogisticModel),
    Noop,
}

impl ReviewGate {
    pub fn train<S: AsRef<str>>(reviews: &[S]) -> Self {
        if !enabled() {
            return Self::Noop;
        }
        let samples: Vec<(String, bool)> = reviews
            .iter()
            .filter_map(|text| {
                let text = text.as_ref();
                label_review(text).map(|label| (text.to_string(), label))
            })
            .collect();
        if samples.len() < MIN_REVIEW_SAMPLES {
            debug!(samples = samples.len(), "too few labelled reviews to train gate");
            return Self::Noop;
        }
        match LogisticModel::fit(&samples) {
            Some(model) => {
                info!(samples = samples.len(), "trained review quality gate");
                Self::Logistic(model)
            }
            None => {
                debug!("review labels are one-sided; quality gate disabled");
                Self::Noop
            }
        }
    }

    pub fn as_quality_gate(&self) -> Option<&dyn QualityGate> {
        match self {
            Self::Logistic(model) => Some(model),
            Self::Noop => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(name: &str, description: &str, category: &str) -> Place {
        Place {
            id: name.into(),
            name: name.into(),
            description: description.into(),
            category: category.into(),
            tags: vec![category.into()],
            lat: 25.0,
            lng: 121.5,
            ..Place::default()
        }
    }

    #[test]
    fn refiner_needs_two_categories() {
        let places = vec![
            place("A", "museum exhibits", "museum"),
            place("B", "museum gallery", "museum"),
            place("C", "unknown", FALLBACK_TAG),
        ];
        assert!(!PlaceRefiner::train(&places).is_active());
        assert!(!PlaceRefiner::train(&places[..1]).is_active());
    }

    #[cfg(feature = "refine")]
    #[test]
    fn refiner_only_touches_fallback_records() {
        let mut places = vec![
            place("History Hall", "museum exhibits history", "museum"),
            place("Art House", "museum gallery art", "museum"),
            place("Sand Bay", "beach waves sand", "beach"),
            place("Surf Point", "beach surfing coast", "beach"),
            place("Mystery Spot", "old history exhibits", FALLBACK_TAG),
            place("Nothing", "zzz", FALLBACK_TAG),
        ];
        let refiner = PlaceRefiner::train(&places);
        assert!(refiner.is_active());

        let changed = refiner.refine(&mut places);
        assert_eq!(changed, 1);
        assert_eq!(places[4].category, "museum");
        assert_eq!(places[4].tags, vec![FALLBACK_TAG, "museum"]);
        assert_eq!(places[5].category, FALLBACK_TAG);
        assert_eq!(places[2].category, "beach");
    }

    #[test]
    fn noop_refiner_changes_nothing() {
        let mut places = vec![place("A", "", FALLBACK_TAG)];
        assert_eq!(PlaceRefiner::Noop.refine(&mut places), 0);
        assert_eq!(places[0].category, FALLBACK_TAG);
    }

    #[test]
    fn gate_needs_enough_labelled_reviews() {
        let reviews = vec!["附近停車不方便，建議搭捷運過來"; 10];
        assert!(ReviewGate::train(&reviews).as_quality_gate().is_none());
    }

    #[cfg(feature = "refine")]
    #[test]
    fn gate_trains_on_weak_labels() {
        let mut reviews: Vec<String> = Vec::new();
        for i in 0..50 {
            reviews.push(format!("附近停車不方便，建議搭捷運過來第{i}次"));
            reviews.push(format!("哈哈哈哈很棒{i}"));
        }
        let gate = ReviewGate::train(&reviews);
        let gate = gate.as_quality_gate().unwrap();
        let score = gate.positive_probability("停車方便，捷運站就在旁邊").unwrap();
        assert!(score > 0.5, "score {score}");
    }
}
