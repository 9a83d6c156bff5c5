use std::collections::BTreeMap;

use super::vectorizer::{dot, SparseVector, TfidfVectorizer, MAX_FEATURES};
use super::ModelError;

#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    vectorizer: TfidfVectorizer,
    centroids: Vec<(String, Vec<f64>)>,
}

impl CentroidClassifier {
    pub fn fit(samples: &[(String, String)]) -> Option<Self> {
        let texts: Vec<&str> = samples.iter().map(|(text, _)| text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&texts, MAX_FEATURES);
        let width = vectorizer.len();

        let mut sums: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
        for (text, label) in samples {
            let entry = sums
                .entry(label.as_str())
                .or_insert_with(|| (vec![0.0; width], 0));
            for (index, weight) in vectorizer.transform(text) {
                entry.0[index] += weight;
            }
            entry.1 += 1;
        }
        if sums.len() < 2 {
            return None;
        }

        let centroids = sums
            .into_iter()
            .map(|(label, (mut sum, count))| {
                for value in &mut sum {
                    *value /= count as f64;
                }
                let norm = sum.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for value in &mut sum {
                        *value /= norm;
                    }
                }
                (label.to_string(), sum)
            })
            .collect();
        Some(Self {
            vectorizer,
            centroids,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.centroids.iter().map(|(label, _)| label.as_str())
    }

    /// Label of the centroid with the highest cosine similarity. Rows and
    /// centroids are unit length, so the dot product is the cosine.
    pub fn predict(&self, text: &str) -> Result<&str, ModelError> {
        let row: SparseVector = self.vectorizer.transform(text);
        if row.is_empty() {
            return Err(ModelError::EmptyFeatures);
        }
        let mut best: Option<(&str, f64)> = None;
        for (label, centroid) in &self.centroids {
            let score = dot(&row, centroid);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((label.as_str(), score));
            }
        }
        best.map(|(label, _)| label).ok_or(ModelError::Untrained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, label: &str) -> (String, String) {
        (text.to_string(), label.to_string())
    }

    #[test]
    fn predicts_nearest_label() {
        let model = CentroidClassifier::fit(&[
            sample("history museum exhibits", "museum"),
            sample("art museum gallery", "museum"),
            sample("sandy beach waves", "beach"),
            sample("beach surfing coast", "beach"),
        ])
        .unwrap();
        assert_eq!(model.predict("museum of modern art").unwrap(), "museum");
        assert_eq!(model.predict("quiet beach").unwrap(), "beach");
        assert_eq!(model.labels().collect::<Vec<_>>(), vec!["beach", "museum"]);
    }

    #[test]
    fn spread_out_class_still_wins_on_cosine() {
        let model = CentroidClassifier::fit(&[
            sample("xx yy ss", "a"),
            sample("xx zz rr", "a"),
            sample("xx ww qq", "a"),
            sample("xx vv pp", "a"),
            sample("xx uu", "b"),
        ])
        .unwrap();
        assert_eq!(model.predict("xx").unwrap(), "a");
    }

    #[test]
    fn centroids_are_unit_length() {
        let model = CentroidClassifier::fit(&[
            sample("museum gallery", "museum"),
            sample("museum exhibits", "museum"),
            sample("beach", "beach"),
        ])
        .unwrap();
        for (_, centroid) in &model.centroids {
            let norm = centroid.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unseen_vocabulary_is_an_error() {
        let model = CentroidClassifier::fit(&[
            sample("museum", "museum"),
            sample("beach", "beach"),
        ])
        .unwrap();
        assert_eq!(model.predict("zzz"), Err(ModelError::EmptyFeatures));
    }

    #[test]
    fn needs_two_labels() {
        assert!(CentroidClassifier::fit(&[
            sample("museum one", "museum"),
            sample("museum two", "museum"),
        ])
        .is_none());
    }
}
