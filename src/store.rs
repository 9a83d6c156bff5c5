use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::CatalogDocument;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::merge::OverrideTable;
use crate::reviews::{bundles_from_value, ReviewBundle};

pub const CATALOG_FILE: &str = "db.json";
pub const OVERRIDES_FILE: &str = "places_reviewed.json";
pub const REVIEWS_FILE: &str = "places_with_reviews.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub catalog: PathBuf,
    pub overrides: PathBuf,
    pub reviews: PathBuf,
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let dir = data_dir.as_ref();
        Self {
            catalog: dir.join(CATALOG_FILE),
            overrides: dir.join(OVERRIDES_FILE),
            reviews: dir.join(REVIEWS_FILE),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.data_dir)
    }
}

pub fn load_catalog(path: &Path) -> AppResult<CatalogDocument> {
    match read_json(path)? {
        Some(value) => catalog_from_value(value),
        None => Err(AppError::MissingInput {
            path: path.to_path_buf(),
        }),
    }
}

pub fn load_catalog_or_default(path: &Path) -> AppResult<CatalogDocument> {
    match read_json(path)? {
        Some(value) => catalog_from_value(value),
        None => {
            debug!(path = %path.display(), "no catalog yet; starting empty");
            Ok(CatalogDocument::default())
        }
    }
}

fn catalog_from_value(value: Value) -> AppResult<CatalogDocument> {
    match value {
        Value::Object(root) => Ok(CatalogDocument::from(root)),
        _ => Err(AppError::Config(
            "catalog document must be a JSON object".into(),
        )),
    }
}

pub fn load_overrides(path: &Path) -> OverrideTable {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return OverrideTable::default(),
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "failed to read overrides; using empty table");
            return OverrideTable::default();
        }
    };
    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(entries)) => OverrideTable::from(entries),
        Ok(_) => {
            warn!(path = %path.display(), "overrides file is not an object; using empty table");
            OverrideTable::default()
        }
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "failed to parse overrides; using empty table");
            OverrideTable::default()
        }
    }
}

pub fn load_review_bundles(path: &Path) -> AppResult<Vec<ReviewBundle>> {
    Ok(read_review_bundles(path).unwrap_or_default())
}

pub fn require_review_bundles(path: &Path) -> AppResult<Vec<ReviewBundle>> {
    read_review_bundles(path).ok_or_else(|| AppError::MissingInput {
        path: path.to_path_buf(),
    })
}

// `None` only when the file is absent; unreadable or malformed reads as empty.
fn read_review_bundles(path: &Path) -> Option<Vec<ReviewBundle>> {
    match read_json(path) {
        Ok(Some(value)) => Some(bundles_or_empty(path, value)),
        Ok(None) => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read reviews; treating as empty");
            Some(Vec::new())
        }
    }
}

fn bundles_or_empty(path: &Path, value: Value) -> Vec<ReviewBundle> {
    bundles_from_value(value).unwrap_or_else(|| {
        warn!(path = %path.display(), "reviews document is not an array; treating as empty");
        Vec::new()
    })
}

fn read_json(path: &Path) -> AppResult<Option<Value>> {
    match fs::read(path) {
        Ok(bytes) => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
            Ok(Some(serde_json::from_slice(bytes)?))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(AppError::Io(err)),
    }
}

pub fn persist_document<T: Serialize + ?Sized>(path: &Path, document: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut serialized = serde_json::to_string_pretty(document)?;
    serialized.push('\n');

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.json".to_string());
    let staging = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&staging, serialized)?;
    fs::rename(&staging, path)?;
    debug!(path = %path.display(), "persisted document");
    Ok(())
}
