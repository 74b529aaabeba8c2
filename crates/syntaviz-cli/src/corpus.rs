//! Loading a corpus: records → trie, plus the query/frequency tables.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use syntaviz_trie::{
    ingest_lines, ActionTable, CancelFlag, ClusterTrie, CorpusTables, IngestReport,
};

use crate::config::ClusterConfig;

pub struct LoadedCorpus {
    pub trie: ClusterTrie,
    pub tables: CorpusTables,
    pub report: IngestReport,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Build the trie from a record file. Without a query table the records'
/// own query texts are used and every query weighs 1.
///
/// Ctrl-C during the build keeps what was already indexed.
pub fn load(records: &Path, queries: Option<&Path>, config: &ClusterConfig) -> Result<LoadedCorpus> {
    let cancel = CancelFlag::new();
    let sig = signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.handle())
        .context("failed to install SIGINT handler")?;

    let options = config.build_options();
    let reader = open(records)?;
    let ingest = || ingest_lines(reader, &options, config.strategy, &cancel);
    let ingested = match config.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("failed to build thread pool")?
            .install(ingest),
        None => ingest(),
    };
    signal_hook::low_level::unregister(sig);
    let ingested = ingested.with_context(|| format!("failed to read {}", records.display()))?;

    if ingested.report.cancelled {
        tracing::warn!(
            inserted = ingested.report.inserted,
            "interrupted; continuing with a partial corpus"
        );
    }

    let tables = match queries {
        Some(path) => CorpusTables::from_reader(open(path)?)
            .with_context(|| format!("failed to read query table {}", path.display()))?,
        None => CorpusTables::from_records(&ingested.records),
    };
    tracing::debug!(queries = tables.len(), "loaded query table");

    Ok(LoadedCorpus {
        trie: ingested.trie,
        tables,
        report: ingested.report,
    })
}

pub fn load_actions(path: &Path) -> Result<ActionTable> {
    ActionTable::from_reader(open(path)?)
        .with_context(|| format!("failed to read action table {}", path.display()))
}
