//! Worker configuration from environment variables and command-line flags

use std::collections::BTreeSet;
use std::env;

use repertoire::{BatchOptions, FindingKind, NameMatching, Side, WalkOptions, DEFAULT_LINK_TEMPLATE};
use tracing::info;

use crate::error::WorkerError;
use crate::filter::{parse_date, parse_time_classes, GameFilter};

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Glob of repertoire study PGN files, one study per file
    pub study_glob: String,

    /// Glob of game files: `.pgn` or Chess.com monthly archive `.json`
    pub games_glob: String,

    /// Player whose games are analyzed
    pub username: String,

    /// JSON report destination, `-` for stdout
    pub output_path: String,

    /// Parallel game workers
    pub worker_threads: usize,

    /// Batch deadline in seconds (0 = none)
    pub analysis_timeout_secs: u64,

    pub batch: BatchOptions,

    pub filter: GameFilter,
}

impl WorkerConfig {
    /// Load from the process environment, then let command-line flags override.
    pub fn load() -> Result<Self, WorkerError> {
        let args: Vec<String> = env::args().skip(1).collect();
        let config = Self::from_sources(|key| env::var(key).ok(), &args)?;
        info!(
            study_glob = %config.study_glob,
            games_glob = %config.games_glob,
            username = %config.username,
            workers = config.worker_threads,
            "Worker config loaded"
        );
        Ok(config)
    }

    /// Build from a variable lookup and command-line flags.
    pub fn from_sources<F>(var: F, args: &[String]) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut study_glob = var("STUDY_GLOB");
        let mut games_glob = var("GAMES_GLOB");
        let mut username = var("PLAYER_USERNAME");
        let mut output_path = var("OUTPUT_PATH").unwrap_or_else(|| "-".to_string());

        // Flags win over the environment.
        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--studies" => {
                    study_glob = value.or(study_glob);
                    i += 2;
                }
                "--games" => {
                    games_glob = value.or(games_glob);
                    i += 2;
                }
                "--username" => {
                    username = value.or(username);
                    i += 2;
                }
                "--out" => {
                    output_path = value.unwrap_or(output_path);
                    i += 2;
                }
                _ => i += 1,
            }
        }

        let study_glob = study_glob.ok_or(WorkerError::Config("STUDY_GLOB not set (or pass --studies)"))?;
        let games_glob = games_glob.ok_or(WorkerError::Config("GAMES_GLOB not set (or pass --games)"))?;
        let username = username.ok_or(WorkerError::Config("PLAYER_USERNAME not set (or pass --username)"))?;

        let worker_threads = var("WORKER_THREADS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or_else(num_cpus::get);

        let analysis_timeout_secs = var("ANALYSIS_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let kinds = match var("FINDING_KINDS") {
            Some(list) => Some(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(FindingKind::parse)
                    .collect::<Option<BTreeSet<_>>>()
                    .ok_or(WorkerError::Config("FINDING_KINDS has an unknown kind"))?,
            ),
            None => None,
        };

        let include_no_deviation = parse_bool(var("INCLUDE_NO_DEVIATION"))
            || kinds.as_ref().is_some_and(|k| k.contains(&FindingKind::NoDeviation));

        let name_matching = match var("NAME_MATCHING") {
            Some(v) => NameMatching::parse(&v).ok_or(WorkerError::Config("NAME_MATCHING must be exact or fuzzy"))?,
            None => NameMatching::default(),
        };

        let batch = BatchOptions {
            include_no_deviation,
            kinds,
            name_matching,
            walk: WalkOptions {
                follow_transpositions: parse_bool(var("FOLLOW_TRANSPOSITIONS")),
            },
            link_template: var("ANALYSIS_LINK_TEMPLATE").unwrap_or_else(|| DEFAULT_LINK_TEMPLATE.to_string()),
        };

        let filter = GameFilter {
            time_classes: match var("TIME_CLASSES") {
                Some(v) => parse_time_classes(&v).ok_or(WorkerError::Config("TIME_CLASSES has an unknown class"))?,
                None => Vec::new(),
            },
            rated_only: parse_bool(var("RATED_ONLY")),
            color: match var("PLAYER_COLOR") {
                Some(v) => Some(Side::parse(&v).ok_or(WorkerError::Config("PLAYER_COLOR must be white or black"))?),
                None => None,
            },
            from_date: match var("FROM_DATE") {
                Some(v) => Some(parse_date(&v).ok_or(WorkerError::Config("FROM_DATE must be YYYY-MM-DD"))?),
                None => None,
            },
            to_date: match var("TO_DATE") {
                Some(v) => Some(parse_date(&v).ok_or(WorkerError::Config("TO_DATE must be YYYY-MM-DD"))?),
                None => None,
            },
        };

        Ok(Self {
            study_glob,
            games_glob,
            username,
            output_path,
            worker_threads,
            analysis_timeout_secs,
            batch,
            filter,
        })
    }
}

fn parse_bool(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
