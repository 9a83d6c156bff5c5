use std::path::PathBuf;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use crate::merge::MergeMode;

pub const DEFAULT_OPEN_DATA_URL: &str =
    "https://media.taiwan.net.tw/XMLReleaseALL_public/scenic_spot_C_f.json";
pub const DEFAULT_PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";

const DEFAULT_QUERIES: &[&str] = &[
    "台北 景點",
    "台中 景點",
    "台南 景點",
    "高雄 景點",
    "花蓮 景點",
    "台東 景點",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_maps_api_key: Option<SecretString>,
    pub place_queries: Vec<String>,
    pub max_requests: Option<u32>,
    pub request_delay_ms: Option<u64>,
    pub merge_mode: MergeMode,
    pub data_dir: PathBuf,
    pub open_data_url: String,
    pub places_api_base: String,
    pub places_language: String,
    pub use_review_model: bool,
    pub merge_to_db: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub place_queries: Vec<String>,
    pub max_requests: Option<u32>,
    pub request_delay_ms: Option<u64>,
    pub merge_mode: MergeMode,
    pub data_dir: String,
    pub open_data_url: String,
    pub places_api_base: String,
    pub places_language: String,
    pub use_review_model: bool,
    pub merge_to_db: bool,
    pub has_api_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            place_queries: parse_queries(env::var("GOOGLE_PLACE_QUERIES").ok()),
            max_requests: parse_optional_u32("MAX_REQUESTS"),
            request_delay_ms: parse_optional_u64("REQUEST_DELAY_MS"),
            merge_mode: parse_merge_mode("MERGE_MODE"),
            data_dir: env::var("POI_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            open_data_url: env::var("OPEN_DATA_URL")
                .unwrap_or_else(|_| DEFAULT_OPEN_DATA_URL.to_string()),
            places_api_base: env::var("PLACES_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_PLACES_API_BASE.to_string()),
            places_language: env::var("PLACES_LANGUAGE").unwrap_or_else(|_| "zh-TW".to_string()),
            use_review_model: parse_bool("USE_REVIEW_MODEL", true),
            merge_to_db: parse_bool("MERGE_TO_DB", true),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            place_queries: self.place_queries.clone(),
            max_requests: self.max_requests,
            request_delay_ms: self.request_delay_ms,
            merge_mode: self.merge_mode,
            data_dir: self.data_dir.to_string_lossy().to_string(),
            open_data_url: self.open_data_url.clone(),
            places_api_base: self.places_api_base.clone(),
            places_language: self.places_language.clone(),
            use_review_model: self.use_review_model,
            merge_to_db: self.merge_to_db,
            has_api_key: self.google_maps_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_queries(raw: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = raw
        .map(|value| {
            value
                .split(',')
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if parsed.is_empty() {
        DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        parsed
    }
}

fn parse_merge_mode(key: &str) -> MergeMode {
    match env::var(key) {
        Ok(value) => MergeMode::parse(&value).unwrap_or_else(|| {
            warn!(value = %value, "unknown merge mode; using merge");
            MergeMode::Merge
        }),
        Err(_) => MergeMode::Merge,
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_optional_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn parse_optional_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u32>().ok())
}
