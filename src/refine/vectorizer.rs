use std::collections::{BTreeMap, HashMap, HashSet};

pub const MAX_FEATURES: usize = 8000;

pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = tokenize(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        let total_docs = documents.len() as f64;
        let mut vocabulary = HashMap::with_capacity(ranked.len());
        let mut idf = Vec::with_capacity(ranked.len());
        for (index, (term, df)) in ranked.into_iter().enumerate() {
            idf.push(((1.0 + total_docs) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }
        Self { vocabulary, idf }
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        let mut row: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, weight) in &mut row {
                *weight /= norm;
            }
        }
        row
    }
}

/// Splits text into ASCII words (lowercased, two or more characters) and
/// character bigrams over runs of other alphanumeric characters. A lone
/// non-ASCII character is kept as a unigram.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut ascii_run = String::new();
    let mut wide_run: Vec<char> = Vec::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            flush_wide(&mut wide_run, &mut tokens);
            ascii_run.push(ch.to_ascii_lowercase());
        } else if ch.is_alphanumeric() {
            flush_ascii(&mut ascii_run, &mut tokens);
            wide_run.push(ch);
        } else {
            flush_ascii(&mut ascii_run, &mut tokens);
            flush_wide(&mut wide_run, &mut tokens);
        }
    }
    flush_ascii(&mut ascii_run, &mut tokens);
    flush_wide(&mut wide_run, &mut tokens);
    tokens
}

fn flush_ascii(run: &mut String, tokens: &mut Vec<String>) {
    if run.len() >= 2 {
        tokens.push(std::mem::take(run));
    } else {
        run.clear();
    }
}

fn flush_wide(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    match run.len() {
        0 => {}
        1 => tokens.push(run[0].to_string()),
        _ => tokens.extend(run.windows(2).map(|pair| pair.iter().collect::<String>())),
    }
    run.clear();
}

pub fn dot(row: &SparseVector, dense: &[f64]) -> f64 {
    row.iter().map(|(index, weight)| weight * dense[*index]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_mixed_scripts() {
        assert_eq!(
            tokenize("Taipei 101 台北 好 a"),
            vec!["taipei", "101", "台北", "好"]
        );
        assert_eq!(tokenize("博物館!"), vec!["博物", "物館"]);
        assert_eq!(tokenize("台北101大樓"), vec!["台北", "101", "大樓"]);
    }

    #[test]
    fn caps_vocabulary_by_document_frequency() {
        let docs = ["cafe cafe tea", "cafe juice", "cafe tea"];
        let vectorizer = TfidfVectorizer::fit(&docs, 2);
        assert_eq!(vectorizer.len(), 2);
        assert!(vectorizer.transform("juice").is_empty());
        assert_eq!(vectorizer.transform("tea").len(), 1);
    }

    #[test]
    fn rows_are_unit_length_and_sorted() {
        let docs = ["museum art", "museum history", "beach sand"];
        let vectorizer = TfidfVectorizer::fit(&docs, MAX_FEATURES);
        let row = vectorizer.transform("museum art art beach");
        let norm: f64 = row.iter().map(|(_, w)| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(row.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }
}
