//! SyntaViz CLI
//!
//! Browse a query corpus by the structure of its dependency parses:
//! - `segment`: pair raw parser transcripts with query ids and write corpus records
//! - `summary`, `keys`, `queries`, `stats`: walk the cluster trie
//! - `set`: combine two clusters (union / intersect / subtract)
//! - `roots`, `actions`: root-pattern clusters and action histograms
//!
//! Paths are cluster labels joined by the delimiter (default `|`); the empty
//! path is the whole corpus.

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;

use syntaviz_trie::{BuildStrategy, QueryOrder, SetOp, Window};

mod browse;
mod config;
mod corpus;
mod logging;
mod segment;

use config::ClusterConfig;
use corpus::LoadedCorpus;

#[derive(Parser)]
#[command(name = "syntaviz")]
#[command(
    author,
    version,
    about = "SyntaViz: cluster and browse queries by dependency-parse structure"
)]
struct Cli {
    /// JSON config file (delimiter, max_depth, strategy, threads, conll_layout, window).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (`-v` debug, `-vv` trace). Otherwise `SYNTAVIZ_LOG` applies.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn parser output into corpus records (`query \t tree \t [rows \t] id`).
    Segment {
        /// Indentation transcript (`Input:` / `Parse:` blocks with ascii trees).
        input: PathBuf,
        /// Parser input file (`id \t query`), paired with transcripts in order.
        #[arg(long)]
        ids: PathBuf,
        /// Tabular (CoNLL) transcript of the same queries.
        #[arg(long)]
        tabular: Option<PathBuf>,
        /// Output record file.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Corpus totals and the top-level clusters.
    Summary {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Sub-clusters of a path, ranked.
    Keys {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Cluster path (empty for the root labels).
        #[arg(default_value = "")]
        path: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Rank by frequency-weighted count instead of occurrences.
        #[arg(long)]
        weighted: bool,
    },

    /// Member queries of a path.
    Queries {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Cluster path (empty for every query).
        #[arg(default_value = "")]
        path: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Order by query id instead of frequency.
        #[arg(long)]
        by_id: bool,
    },

    /// Occurrence, weighted, and non-dependent counts of a path.
    Stats {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(default_value = "")]
        path: String,
    },

    /// Combine the members of two paths.
    Set {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(value_enum)]
        op: SetOpArg,
        left: String,
        right: String,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Cluster queries by root word and tag.
    Roots {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Histogram of the actions taken for a path's queries.
    Actions {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(default_value = "")]
        path: String,
        /// Action table (`query \t action`).
        #[arg(long)]
        actions: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct CorpusArgs {
    /// Corpus record file written by `segment`.
    records: PathBuf,

    /// Query table (`id \t query ... \t frequency`). Without it every query weighs 1.
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Deepest tree level to index (root label = 0).
    #[arg(long)]
    max_depth: Option<usize>,

    /// How records are merged into the trie.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Path delimiter.
    #[arg(long)]
    delimiter: Option<char>,

    /// Worker threads for decoding and sharded builds.
    #[arg(long)]
    threads: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone, Copy)]
struct WindowArgs {
    /// First rank shown.
    #[arg(long)]
    start: Option<usize>,
    /// Last rank shown (inclusive).
    #[arg(long)]
    end: Option<usize>,
}

impl WindowArgs {
    fn resolve(self, default: Window) -> Window {
        Window::new(
            self.start.unwrap_or(default.start),
            self.end.unwrap_or(default.end),
        )
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum StrategyArg {
    SingleWriter,
    ShardByRoot,
}

impl From<StrategyArg> for BuildStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::SingleWriter => BuildStrategy::SingleWriter,
            StrategyArg::ShardByRoot => BuildStrategy::ShardByRoot,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SetOpArg {
    Union,
    Intersect,
    Subtract,
}

impl From<SetOpArg> for SetOp {
    fn from(arg: SetOpArg) -> Self {
        match arg {
            SetOpArg::Union => SetOp::Union,
            SetOpArg::Intersect => SetOp::Intersect,
            SetOpArg::Subtract => SetOp::Subtract,
        }
    }
}

fn apply_overrides(config: &mut ClusterConfig, args: &CorpusArgs) {
    if let Some(delimiter) = args.delimiter {
        config.delimiter = delimiter;
    }
    if args.max_depth.is_some() {
        config.max_depth = args.max_depth;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
}

fn load(config: &ClusterConfig, args: &CorpusArgs) -> Result<LoadedCorpus> {
    let mut config = config.clone();
    apply_overrides(&mut config, args);
    corpus::load(&args.records, args.queries.as_deref(), &config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = ClusterConfig::load(cli.config.as_deref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Segment {
            input,
            ids,
            tabular,
            out: path,
        } => {
            let report =
                segment::run(&input, &ids, tabular.as_deref(), &path, &config.conll_layout)?;
            eprintln!(
                "{} wrote {} records to {} ({} rebuilt from tabular rows, {} dropped, {} without id)",
                "ok".green().bold(),
                report.written,
                path.display().to_string().bold(),
                report.recovered,
                report.dropped.len(),
                report.unpaired,
            );
            for (index, reason) in &report.dropped {
                eprintln!("  {} transcript {index}: {reason}", "dropped".yellow());
            }
        }
        Commands::Summary { corpus, window } => {
            let loaded = load(&config, &corpus)?;
            browse::summary(&loaded, window.resolve(config.window), corpus.json, &mut out)?;
        }
        Commands::Keys {
            corpus,
            path,
            window,
            weighted,
        } => {
            let loaded = load(&config, &corpus)?;
            browse::keys(
                &loaded,
                &path,
                window.resolve(config.window),
                weighted,
                corpus.json,
                &mut out,
            )?;
        }
        Commands::Queries {
            corpus,
            path,
            window,
            by_id,
        } => {
            let loaded = load(&config, &corpus)?;
            let order = if by_id {
                QueryOrder::ById
            } else {
                QueryOrder::ByFrequency
            };
            browse::queries(
                &loaded,
                &path,
                window.resolve(config.window),
                order,
                corpus.json,
                &mut out,
            )?;
        }
        Commands::Stats { corpus, path } => {
            let loaded = load(&config, &corpus)?;
            browse::stats(&loaded, &path, corpus.json, &mut out)?;
        }
        Commands::Set {
            corpus,
            op,
            left,
            right,
            window,
        } => {
            let loaded = load(&config, &corpus)?;
            browse::set(
                &loaded,
                op.into(),
                &left,
                &right,
                window.resolve(config.window),
                corpus.json,
                &mut out,
            )?;
        }
        Commands::Roots { corpus, window } => {
            let loaded = load(&config, &corpus)?;
            browse::roots(&loaded, window.resolve(config.window), corpus.json, &mut out)?;
        }
        Commands::Actions {
            corpus,
            path,
            actions,
        } => {
            let loaded = load(&config, &corpus)?;
            let actions = corpus::load_actions(&actions)?;
            browse::actions(&loaded, &path, &actions, corpus.json, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
