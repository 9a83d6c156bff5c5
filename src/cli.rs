//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};

use poi_catalog::{MergeMode, DEFAULT_LOG_FILTER};

/// Builds and reconciles the points-of-interest catalog.
///
/// Every run reads and rewrites the JSON documents in `POI_DATA_DIR`.
#[derive(Parser, Debug)]
#[command(name = "poi-catalog")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Import the government scenic-spot feed with single-label tags
    OpenData {
        /// How fresh records combine with the existing catalog
        #[arg(long, value_enum, default_value_t = ModeArg::Replace)]
        mode: ModeArg,
    },
    /// Seed the catalog from Places text search
    SeedGoogle {
        /// Overrides MERGE_MODE
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Fetch reviews for catalog places and derive multi-label tags
    EnrichReviews {
        /// Only write the reviews document
        #[arg(long)]
        no_merge: bool,
    },
    /// Copy review-derived tags into the catalog
    MergeTags,
    /// Copy ratings from the reviews document into the catalog
    MergeRatings,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Merge,
    Replace,
}

impl From<ModeArg> for MergeMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Merge => MergeMode::Merge,
            ModeArg::Replace => MergeMode::Replace,
        }
    }
}

impl Args {
    /// Default filter directives when `RUST_LOG` is unset.
    pub fn log_directives(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => DEFAULT_LOG_FILTER,
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Args::try_parse_from(["poi-catalog"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_open_data_defaults_to_replace() {
        let args = Args::try_parse_from(["poi-catalog", "open-data"]).unwrap();
        assert_eq!(
            args.command,
            Command::OpenData {
                mode: ModeArg::Replace
            }
        );

        let args = Args::try_parse_from(["poi-catalog", "open-data", "--mode", "merge"]).unwrap();
        assert_eq!(
            args.command,
            Command::OpenData {
                mode: ModeArg::Merge
            }
        );
    }

    #[test]
    fn test_cli_seed_mode_is_optional() {
        let args = Args::try_parse_from(["poi-catalog", "seed-google"]).unwrap();
        assert_eq!(args.command, Command::SeedGoogle { mode: None });

        let result = Args::try_parse_from(["poi-catalog", "seed-google", "--mode", "upsert"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::InvalidValue
        );
    }

    #[test]
    fn test_cli_enrich_reviews_no_merge_flag() {
        let args = Args::try_parse_from(["poi-catalog", "enrich-reviews", "--no-merge"]).unwrap();
        assert_eq!(args.command, Command::EnrichReviews { no_merge: true });
    }

    #[test]
    fn test_cli_backfill_subcommands() {
        let args = Args::try_parse_from(["poi-catalog", "merge-tags"]).unwrap();
        assert_eq!(args.command, Command::MergeTags);
        let args = Args::try_parse_from(["poi-catalog", "merge-ratings"]).unwrap();
        assert_eq!(args.command, Command::MergeRatings);
    }

    #[test]
    fn test_cli_verbosity_picks_directives() {
        let args = Args::try_parse_from(["poi-catalog", "merge-tags"]).unwrap();
        assert_eq!(args.log_directives(), DEFAULT_LOG_FILTER);

        let args = Args::try_parse_from(["poi-catalog", "-vv", "merge-tags"]).unwrap();
        assert_eq!(args.log_directives(), "trace");

        let args = Args::try_parse_from(["poi-catalog", "merge-tags", "-q"]).unwrap();
        assert_eq!(args.log_directives(), "warn");
    }

    #[test]
    fn test_cli_mode_arg_converts() {
        assert_eq!(MergeMode::from(ModeArg::Replace), MergeMode::Replace);
        assert_eq!(MergeMode::from(ModeArg::Merge), MergeMode::Merge);
    }
}
