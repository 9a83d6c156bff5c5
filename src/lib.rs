pub mod catalog;
pub mod classifier;
mod config;
mod errors;
mod lenient;
pub mod merge;
pub mod open_data;
pub mod pipeline;
pub mod places;
pub mod refine;
pub mod reviews;
pub mod store;
pub mod taxonomy;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use catalog::{CatalogDocument, Place};
pub use classifier::{classify, LabelMode};
pub use config::{AppConfig, PublicAppConfig};
pub use errors::{AppError, AppResult};
pub use merge::{merge, MergeMode, MergeOutcome, OverridePolicy, OverrideTable};
pub use pipeline::{RunReport, StopReason};
pub use places::{HttpJsonFetcher, JsonFetcher, PlacesClient, RequestBudget};
pub use reviews::{ReviewBundle, ReviewFilter};
pub use store::DataPaths;

pub const DEFAULT_LOG_FILTER: &str = "info,poi_catalog=debug";

pub fn init_tracing(directives: &str) {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directives));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    });
}
