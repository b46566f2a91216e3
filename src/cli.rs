//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Monitors a media library, searches configured indexers, applies quality
/// policy, dispatches grabs, and imports finished transfers.
#[derive(Parser, Debug)]
#[command(name = "fetchbay")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the catalog database file (defaults to `fetchbay.db` in the
    /// current directory; `:memory:` for a throwaway in-memory catalog).
    #[arg(long, global = true, default_value = "fetchbay.db")]
    pub db_path: PathBuf,

    /// Path to the config file; falls back to the XDG default and then to
    /// built-in defaults when unset.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the scheduler and dispatcher tick loops in the foreground until
    /// interrupted.
    Run {
        /// Seconds between scheduler ticks.
        #[arg(long, default_value_t = 300)]
        tick_interval_secs: u64,
    },
    /// Runs an aggregated search for a media item and prints the ranked
    /// release list.
    Search {
        /// Id of the media item to search for.
        media_item_id: i64,
        /// Minimum seeder count a release must report to be returned.
        #[arg(long, default_value_t = 0)]
        minimum_seeders: i64,
    },
    /// Queues a manual grab against a release, bypassing quality policy.
    Grab {
        /// Id of the downloader plugin that should handle this source.
        plugin_id: String,
        /// Human-readable name for the download (usually the release title).
        name: String,
        /// Source URI or magnet link.
        source: String,
        /// GUID of the release being grabbed, for dedupe/reconciliation.
        release_guid: String,
        /// Id of the media item this grab satisfies.
        #[arg(long)]
        media_item_id: i64,
        /// Quality label to record against the grab (e.g. "HD-1080p").
        #[arg(long, default_value = "unknown")]
        quality_label: String,
    },
    /// Imports a completed download's file into the library by hand.
    Import {
        /// Path to the completed download's media file.
        source_path: PathBuf,
        /// Id of the media item this file satisfies.
        media_item_id: i64,
        /// Quality label to render into naming templates, if any.
        #[arg(long)]
        quality_label: Option<String>,
    },
    /// Creates a monitoring rule for a media item and, if the rule fires
    /// `search_on_add`, runs its first search immediately.
    Monitor {
        /// Id of the media item to monitor (a series, season, or leaf item).
        media_item_id: i64,
        /// Quality profile governing acceptable releases.
        profile_id: i64,
        /// Monitoring mode: all, future_only, missing, or explicit_list.
        #[arg(long, default_value = "all")]
        mode: String,
        /// Seconds between automatic searches.
        #[arg(long, default_value_t = 21_600)]
        search_interval_secs: i64,
    },
    /// Prints the current state of the background scheduler job.
    Jobs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_parses_with_default_tick_interval() {
        let args = Args::try_parse_from(["fetchbay", "run"]).unwrap();
        assert!(matches!(args.command, Command::Run { tick_interval_secs: 300 }));
    }

    #[test]
    fn search_requires_a_media_item_id() {
        let result = Args::try_parse_from(["fetchbay", "search"]);
        assert!(result.is_err());
    }

    #[test]
    fn grab_parses_positional_and_flag_arguments() {
        let args = Args::try_parse_from([
            "fetchbay",
            "grab",
            "downloader-qbittorrent",
            "Arrival.2016.1080p.WEB-DL",
            "magnet:?xt=urn:btih:abc",
            "guid-1",
            "--media-item-id",
            "42",
        ])
        .unwrap();
        match args.command {
            Command::Grab { media_item_id, quality_label, .. } => {
                assert_eq!(media_item_id, 42);
                assert_eq!(quality_label, "unknown");
            }
            other => panic!("expected Grab, got {other:?}"),
        }
    }

    #[test]
    fn monitor_parses_with_default_mode_and_interval() {
        let args = Args::try_parse_from(["fetchbay", "monitor", "7", "1"]).unwrap();
        match args.command {
            Command::Monitor { media_item_id, profile_id, mode, search_interval_secs } => {
                assert_eq!(media_item_id, 7);
                assert_eq!(profile_id, 1);
                assert_eq!(mode, "all");
                assert_eq!(search_interval_secs, 21_600);
            }
            other => panic!("expected Monitor, got {other:?}"),
        }
    }

    #[test]
    fn verbose_flag_increments_count() {
        let args = Args::try_parse_from(["fetchbay", "-vv", "jobs"]).unwrap();
        assert_eq!(args.verbose, 2);
    }
}
