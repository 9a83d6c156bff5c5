use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::taxonomy::{
    self, COMPANY_MARKER, FALLBACK_TAG, INTEREST_RULES, RELIGIOUS_MARKERS, TEMPLE_TAG,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    Single,
    Multi,
}

pub fn compose_text<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn classify(text: &str, types: &[String], fallback: Option<&str>, mode: LabelMode) -> Vec<String> {
    match mode {
        LabelMode::Single => vec![classify_single(text).to_string()],
        LabelMode::Multi => classify_multi(text, types, fallback),
    }
}

pub fn classify_single(text: &str) -> &'static str {
    if is_religious_site(text) {
        return TEMPLE_TAG;
    }
    INTEREST_RULES
        .iter()
        .find(|rule| text.contains(rule.keyword))
        .map(|rule| rule.tag)
        .unwrap_or(FALLBACK_TAG)
}

pub fn classify_multi(text: &str, types: &[String], fallback: Option<&str>) -> Vec<String> {
    let mut tags: BTreeSet<String> = BTreeSet::new();
    if let Some(seed) = fallback.filter(|seed| !seed.is_empty()) {
        tags.insert(seed.to_string());
    }
    for rule in taxonomy::multi_label_rules() {
        if text.contains(rule.keyword) {
            tags.insert(rule.tag.to_string());
        }
    }
    for place_type in types {
        if let Some(tag) = taxonomy::tag_for_place_type(place_type) {
            tags.insert(tag.to_string());
        }
    }
    if tags.is_empty() {
        tags.insert(FALLBACK_TAG.to_string());
    }
    tags.into_iter().collect()
}

fn is_religious_site(text: &str) -> bool {
    !text.contains(COMPANY_MARKER) && RELIGIOUS_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn temple_rule_runs_before_keyword_table() {
        assert_eq!(classify_single("台北府城隍廟"), TEMPLE_TAG);
        // 觀光工廠 is the very first rule, the religious marker still wins.
        assert_eq!(classify_single("觀光工廠旁的龍山寺"), TEMPLE_TAG);
    }

    #[test]
    fn company_marker_disables_temple_rule() {
        assert_eq!(classify_single("宮原眼科股份有限公司"), FALLBACK_TAG);
        assert_eq!(classify_single("金宮酒廠股份有限公司"), "creative_park");
    }

    #[test]
    fn single_label_uses_table_order() {
        // 園區 (creative_park) precedes 森林 (national_park) in the table.
        assert_eq!(classify_single("森林園區"), "creative_park");
        assert_eq!(classify_single("國立故宮博物院"), TEMPLE_TAG);
        assert_eq!(classify_single("奇美博物館"), "museum");
        assert_eq!(classify_single("Taipei 101"), FALLBACK_TAG);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(
            classify_multi("Night Market", &[], None),
            vec![FALLBACK_TAG.to_string()]
        );
    }

    #[test]
    fn multi_label_collects_all_matches_sorted() {
        let tags = classify_multi("淡水老街 海岸 咖啡", &types(&["cafe", "unknown"]), None);
        assert_eq!(tags, vec!["beach", "cafe", "heritage"]);
    }

    #[test]
    fn multi_label_treats_religious_markers_as_keywords() {
        // The company exemption only applies to single-label mode.
        let tags = classify_multi("金宮股份有限公司", &[], None);
        assert_eq!(tags, vec![TEMPLE_TAG]);
    }

    #[test]
    fn multi_label_keeps_seed_tag() {
        let tags = classify_multi("奇美博物館", &[], Some(FALLBACK_TAG));
        assert_eq!(tags, vec!["museum", FALLBACK_TAG]);
        let tags = classify_multi("nothing here", &[], Some(""));
        assert_eq!(tags, vec![FALLBACK_TAG]);
    }

    #[test]
    fn multi_label_never_returns_empty() {
        for text in ["", " ", "abc", "🙂"] {
            let tags = classify_multi(text, &[], None);
            assert_eq!(tags, vec![FALLBACK_TAG]);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "安平古堡 歷史 海岸 夜市 湖";
        let place_types = types(&["tourist_attraction", "park"]);
        let first = classify(text, &place_types, None, LabelMode::Multi);
        let second = classify(text, &place_types, None, LabelMode::Multi);
        assert_eq!(first, second);
        assert_eq!(
            classify(text, &place_types, None, LabelMode::Single),
            vec!["night_market"]
        );
    }

    #[test]
    fn composes_text_skipping_empty_parts() {
        assert_eq!(compose_text(["名稱", "", "描述", "類別"]), "名稱 描述 類別");
        assert_eq!(compose_text(Vec::<&str>::new()), "");
    }
}
