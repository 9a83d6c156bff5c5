use super::vectorizer::{dot, SparseVector, TfidfVectorizer, MAX_FEATURES};
use super::ModelError;
use crate::reviews::QualityGate;

const LEARNING_RATE: f64 = 0.5;
const EPOCHS: usize = 300;
const L2_PENALTY: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct LogisticModel {
    vectorizer: TfidfVectorizer,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    pub fn fit(samples: &[(String, bool)]) -> Option<Self> {
        let positives = samples.iter().filter(|(_, label)| *label).count();
        if positives == 0 || positives == samples.len() {
            return None;
        }

        let texts: Vec<&str> = samples.iter().map(|(text, _)| text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&texts, MAX_FEATURES);
        let rows: Vec<SparseVector> = texts.iter().map(|text| vectorizer.transform(text)).collect();
        let targets: Vec<f64> = samples
            .iter()
            .map(|(_, label)| if *label { 1.0 } else { 0.0 })
            .collect();

        let n = samples.len() as f64;
        let mut weights = vec![0.0; vectorizer.len()];
        let mut bias = 0.0;
        for _ in 0..EPOCHS {
            let mut grad_w = vec![0.0; weights.len()];
            let mut grad_b = 0.0;
            for (row, target) in rows.iter().zip(&targets) {
                let error = sigmoid(dot(row, &weights) + bias) - target;
                for (index, value) in row {
                    grad_w[*index] += error * value;
                }
                grad_b += error;
            }
            for (weight, grad) in weights.iter_mut().zip(&grad_w) {
                *weight -= LEARNING_RATE * (grad / n + L2_PENALTY * *weight);
            }
            bias -= LEARNING_RATE * grad_b / n;
        }

        Some(Self {
            vectorizer,
            weights,
            bias,
        })
    }

    pub fn probability(&self, text: &str) -> Result<f64, ModelError> {
        let row = self.vectorizer.transform(text);
        if row.is_empty() {
            return Err(ModelError::EmptyFeatures);
        }
        Ok(sigmoid(dot(&row, &self.weights) + self.bias))
    }
}

impl QualityGate for LogisticModel {
    fn positive_probability(&self, text: &str) -> Result<f64, ModelError> {
        self.probability(text)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(String, bool)> {
        let mut samples = Vec::new();
        for i in 0..20 {
            samples.push((format!("parking near the metro station exit {i}"), true));
            samples.push((format!("lol lol nice {i}"), false));
        }
        samples
    }

    #[test]
    fn separates_informative_from_noise() {
        let model = LogisticModel::fit(&corpus()).unwrap();
        let good = model.probability("parking at the metro station").unwrap();
        let bad = model.probability("lol nice").unwrap();
        assert!(good > 0.5, "informative score {good}");
        assert!(bad < 0.5, "noise score {bad}");
    }

    #[test]
    fn single_class_is_rejected() {
        let samples: Vec<(String, bool)> =
            corpus().into_iter().filter(|(_, label)| *label).collect();
        assert!(LogisticModel::fit(&samples).is_none());
    }

    #[test]
    fn out_of_vocabulary_text_is_an_error() {
        let model = LogisticModel::fit(&corpus()).unwrap();
        assert_eq!(model.probability("§§§"), Err(ModelError::EmptyFeatures));
    }
}
