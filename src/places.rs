use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{trace, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::lenient;

const USER_AGENT: &str = concat!("poi-catalog/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const QUOTA_STATUSES: &[&str] = &["OVER_QUERY_LIMIT", "RESOURCE_EXHAUSTED"];
const DETAIL_FIELDS: &str = "place_id,name,formatted_address,geometry,editorial_summary,reviews,rating,user_ratings_total,types";

#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> AppResult<Value>;
}

pub struct HttpJsonFetcher {
    http: reqwest::Client,
    api_key: Option<SecretString>,
}

impl HttpJsonFetcher {
    pub fn new(api_key: Option<SecretString>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, api_key })
    }
}

#[async_trait]
impl JsonFetcher for HttpJsonFetcher {
    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> AppResult<Value> {
        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        if let Some(key) = &self.api_key {
            query.push(("key", key.expose_secret()));
        }

        trace!(url, "fetching json");
        let response = self.http.get(url).query(&query).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::QuotaExceeded("HTTP 429".into()));
        }
        let body = response.error_for_status()?.bytes().await?;
        let value = parse_json_body(&body)?;
        check_quota(&value)?;
        Ok(value)
    }
}

pub fn parse_json_body(body: &[u8]) -> AppResult<Value> {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    Ok(serde_json::from_slice(body)?)
}

fn check_quota(value: &Value) -> AppResult<()> {
    match value.get("status").and_then(Value::as_str) {
        Some(status) if QUOTA_STATUSES.contains(&status) => {
            Err(AppError::QuotaExceeded(status.to_string()))
        }
        _ => Ok(()),
    }
}

#[derive(Debug)]
pub struct RequestBudget {
    limit: u32,
    used: AtomicU32,
}

impl RequestBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    pub fn acquire(&self) -> AppResult<()> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| AppError::BudgetExhausted { limit: self.limit })
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.limit
    }
}

pub struct Throttle {
    interval: Duration,
    last_tick: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let delay = {
            let mut guard = self.last_tick.lock();
            let delay = guard
                .map(|prev| self.interval.saturating_sub(prev.elapsed()))
                .unwrap_or_default();
            *guard = Some(Instant::now() + delay);
            delay
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct LatLng {
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub lat: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub location: Option<LatLng>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub place_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub formatted_address: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub user_ratings_total: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaceDetails {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub place_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub formatted_address: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub editorial_summary: Option<Value>,
    #[serde(default)]
    pub reviews: Value,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub user_ratings_total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub types: Vec<String>,
}

impl PlaceDetails {
    pub fn review_texts(&self) -> Vec<String> {
        let Some(reviews) = self.reviews.as_array() else {
            return Vec::new();
        };
        reviews
            .iter()
            .filter(|review| review.is_object())
            .map(|review| {
                review
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    pub fn editorial(&self) -> String {
        self.editorial_summary
            .as_ref()
            .and_then(|summary| summary.get("overview"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn location(&self) -> Option<LatLng> {
        self.geometry.as_ref().and_then(|g| g.location)
    }
}

impl SearchHit {
    pub fn location(&self) -> Option<LatLng> {
        self.geometry.as_ref().and_then(|g| g.location)
    }
}

#[derive(Clone)]
pub struct PlacesClient {
    fetcher: Arc<dyn JsonFetcher>,
    api_base: String,
    language: String,
    throttle: Arc<Throttle>,
}

impl PlacesClient {
    pub fn new(
        fetcher: Arc<dyn JsonFetcher>,
        api_base: impl Into<String>,
        language: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            language: language.into(),
            throttle: Arc::new(Throttle::new(delay)),
        }
    }

    pub fn from_config(config: &AppConfig, default_delay_ms: u64) -> AppResult<Self> {
        let key = config
            .google_maps_api_key
            .clone()
            .ok_or(AppError::MissingCredential("GOOGLE_MAPS_API_KEY"))?;
        let fetcher = HttpJsonFetcher::new(Some(key))?;
        let delay = Duration::from_millis(config.request_delay_ms.unwrap_or(default_delay_ms));
        Ok(Self::new(
            Arc::new(fetcher),
            config.places_api_base.clone(),
            config.places_language.clone(),
            delay,
        ))
    }

    pub async fn search_results(&self, budget: &RequestBudget, query: &str) -> AppResult<Vec<SearchHit>> {
        budget.acquire()?;
        self.throttle.wait().await;
        let url = format!("{}/textsearch/json", self.api_base);
        let params = [("query", query.to_string()), ("language", self.language.clone())];
        let mut value = self.fetcher.fetch(&url, &params).await?;

        let Value::Array(results) = value
            .get_mut("results")
            .map(Value::take)
            .unwrap_or(Value::Null)
        else {
            return Ok(Vec::new());
        };
        let hits = results
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| match serde_json::from_value::<SearchHit>(item) {
                Ok(hit) => Some(hit),
                Err(err) => {
                    warn!(?err, "skipping malformed search result");
                    None
                }
            })
            .collect();
        Ok(hits)
    }

    pub async fn text_search(&self, budget: &RequestBudget, query: &str) -> AppResult<Option<SearchHit>> {
        Ok(self.search_results(budget, query).await?.into_iter().next())
    }

    /// Details for a place id. Any status other than `OK`, or an empty
    /// result, reads as not found.
    pub async fn place_details(
        &self,
        budget: &RequestBudget,
        place_id: &str,
    ) -> AppResult<Option<PlaceDetails>> {
        budget.acquire()?;
        self.throttle.wait().await;
        let url = format!("{}/details/json", self.api_base);
        let params = [
            ("place_id", place_id.to_string()),
            ("language", self.language.clone()),
            ("reviews_sort", "most_relevant".to_string()),
            ("fields", DETAIL_FIELDS.to_string()),
        ];
        let mut value = self.fetcher.fetch(&url, &params).await?;
        if value.get("status").and_then(Value::as_str) != Some("OK") {
            return Ok(None);
        }
        match value.get_mut("result").map(Value::take) {
            Some(Value::Object(result)) if !result.is_empty() => {
                Ok(Some(serde_json::from_value(Value::Object(result))?))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct ScriptedFetcher {
        responses: Mutex<Vec<AppResult<Value>>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedFetcher {
        fn new(mut responses: Vec<AppResult<Value>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JsonFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, params: &[(&str, String)]) -> AppResult<Value> {
            self.calls.lock().push((
                url.to_string(),
                params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ));
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(json!({"status": "ZERO_RESULTS"})))
        }
    }

    fn client(fetcher: Arc<ScriptedFetcher>) -> PlacesClient {
        PlacesClient::new(fetcher, "http://places.test/api/", "zh-TW", Duration::ZERO)
    }

    #[test]
    fn budget_stops_at_limit() {
        let budget = RequestBudget::new(2);
        assert!(budget.acquire().is_ok());
        assert!(budget.acquire().is_ok());
        let err = budget.acquire().unwrap_err();
        assert!(matches!(err, AppError::BudgetExhausted { limit: 2 }));
        assert!(err.is_run_stop());
        assert_eq!(budget.used(), 2);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn parses_bom_prefixed_body() {
        let value = parse_json_body(b"\xEF\xBB\xBF{\"ok\": true}").unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn quota_status_is_an_error() {
        let err = check_quota(&json!({"status": "OVER_QUERY_LIMIT"})).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded(_)));
        assert!(check_quota(&json!({"status": "OK"})).is_ok());
    }

    #[tokio::test]
    async fn search_and_details_consume_budget() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(json!({
                "status": "OK",
                "results": [
                    {"place_id": "p1", "name": "淡水老街", "types": ["tourist_attraction"]},
                    "junk"
                ]
            })),
            Ok(json!({
                "status": "OK",
                "result": {
                    "name": "淡水老街",
                    "editorial_summary": {"overview": "historic street"},
                    "reviews": [{"text": "nice"}, {"rating": 5}],
                    "geometry": {"location": {"lat": 25.17, "lng": "121.44"}}
                }
            })),
            Ok(json!({"status": "NOT_FOUND"})),
        ]));
        let places = client(fetcher.clone());
        let budget = RequestBudget::new(3);

        let hit = places.text_search(&budget, "淡水").await.unwrap().unwrap();
        assert_eq!(hit.place_id.as_deref(), Some("p1"));

        let details = places.place_details(&budget, "p1").await.unwrap().unwrap();
        assert_eq!(details.editorial(), "historic street");
        assert_eq!(details.review_texts(), vec!["nice", ""]);
        assert_eq!(details.location(), Some(LatLng { lat: 25.17, lng: 121.44 }));

        assert!(places.place_details(&budget, "p2").await.unwrap().is_none());
        let err = places.place_details(&budget, "p3").await.unwrap_err();
        assert!(matches!(err, AppError::BudgetExhausted { .. }));

        let calls = fetcher.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "http://places.test/api/textsearch/json");
        assert_eq!(calls[1].0, "http://places.test/api/details/json");
        assert!(calls[1]
            .1
            .contains(&("reviews_sort".to_string(), "most_relevant".to_string())));
    }

    #[tokio::test]
    async fn http_fetcher_detects_quota_and_strips_bom() {
        use httptest::matchers::{all_of, contains, request, url_decoded};
        use httptest::responders::status_code;
        use httptest::{Expectation, Server};

        let server = Server::run();
        server.expect(
            Expectation::matching(all_of!(
                request::method_path("GET", "/feed"),
                request::query(url_decoded(contains(("key", "secret")))),
            ))
            .respond_with(status_code(200).body("\u{feff}{\"status\": \"OK\"}")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/limited"))
                .respond_with(status_code(200).body(r#"{"status": "RESOURCE_EXHAUSTED"}"#)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/throttled"))
                .respond_with(status_code(429)),
        );

        let fetcher = HttpJsonFetcher::new(Some(SecretString::from("secret"))).unwrap();
        let ok = fetcher.fetch(&server.url_str("/feed"), &[]).await.unwrap();
        assert_eq!(ok["status"], "OK");

        let limited = fetcher.fetch(&server.url_str("/limited"), &[]).await;
        assert!(matches!(limited, Err(AppError::QuotaExceeded(_))));
        let throttled = fetcher.fetch(&server.url_str("/throttled"), &[]).await;
        assert!(matches!(throttled, Err(AppError::QuotaExceeded(_))));
    }
}
