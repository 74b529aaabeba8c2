//! Read-only browse commands over a loaded corpus, as text or JSON.
//!
//! JSON listings use positional tuples: keys are `[rank, count, path]`,
//! queries are `[rank, query_id, query]`.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use std::io::Write;

use syntaviz_trie::{
    share_percent, ActionTable, KeyEntry, KeyRanking, QueryOrder, SetOp, TrieError, Window,
};

use crate::corpus::LoadedCorpus;

fn write_json<W: Write>(out: &mut W, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(all queries)"
    } else {
        path
    }
}

pub fn summary<W: Write>(
    corpus: &LoadedCorpus,
    window: Window,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let trie = &corpus.trie;
    let totals = trie.totals(corpus.tables.frequency());
    let keys = trie.list_keys(
        "",
        window,
        KeyRanking::OccurrenceWithWeights(corpus.tables.frequency()),
    )?;

    if json {
        let rows: Vec<_> = keys
            .iter()
            .map(|k| json!([k.rank, k.occurrence_count, k.path]))
            .collect();
        return write_json(
            out,
            &json!({
                "queries": totals.unique,
                "weighted": totals.weighted,
                "clusters": trie.node_count() - 1,
                "root_labels": trie.node(trie.root()).child_count(),
                "report": &corpus.report,
                "keys": rows,
            }),
        );
    }

    writeln!(
        out,
        "{} {} queries (weighted {}), {} root labels, {} clusters",
        "corpus:".bold(),
        totals.unique,
        totals.weighted,
        trie.node(trie.root()).child_count(),
        trie.node_count() - 1,
    )?;
    if corpus.report.skipped() > 0 {
        writeln!(
            out,
            "{} {} corrupt, {} rejected",
            "skipped:".yellow().bold(),
            corpus.report.corrupt.len(),
            corpus.report.rejected.len(),
        )?;
    }
    if corpus.report.cancelled {
        writeln!(out, "{}", "interrupted: corpus is partial".yellow())?;
    }
    write_key_rows(corpus, &keys, out)
}

fn write_key_rows<W: Write>(corpus: &LoadedCorpus, keys: &[KeyEntry], out: &mut W) -> Result<()> {
    let totals = corpus.trie.totals(corpus.tables.frequency());
    for key in keys {
        let weighted = key.weighted_count.unwrap_or(0);
        writeln!(
            out,
            "{:>5} {:>8} {:>6.2}% {:>10} {:>6.2}%  {}",
            key.rank,
            key.occurrence_count,
            share_percent(key.occurrence_count, totals.unique),
            weighted,
            share_percent(weighted, totals.weighted),
            key.path.cyan(),
        )?;
    }
    Ok(())
}

pub fn keys<W: Write>(
    corpus: &LoadedCorpus,
    path: &str,
    window: Window,
    weighted: bool,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let frequency = corpus.tables.frequency();
    let ranking = if weighted {
        KeyRanking::Weighted(frequency)
    } else {
        KeyRanking::OccurrenceWithWeights(frequency)
    };
    let keys = corpus.trie.list_keys(path, window, ranking)?;

    if json {
        let rows: Vec<_> = keys
            .iter()
            .map(|k| {
                let count = if weighted {
                    k.weighted_count.unwrap_or(0)
                } else {
                    k.occurrence_count
                };
                json!([k.rank, count, k.path])
            })
            .collect();
        return write_json(out, &json!(rows));
    }

    writeln!(out, "{}", display_path(path).bold())?;
    if keys.is_empty() {
        writeln!(out, "  (no sub-clusters in window)")?;
    }
    write_key_rows(corpus, &keys, out)
}

pub fn queries<W: Write>(
    corpus: &LoadedCorpus,
    path: &str,
    window: Window,
    order: QueryOrder,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let entries = corpus.trie.list_queries(path, window, order, &corpus.tables)?;

    if json {
        let rows: Vec<_> = entries
            .iter()
            .map(|q| json!([q.rank, q.query_id, q.query]))
            .collect();
        return write_json(out, &json!(rows));
    }

    let totals = corpus.trie.totals(corpus.tables.frequency());
    writeln!(out, "{}", display_path(path).bold())?;
    for q in &entries {
        writeln!(
            out,
            "{:>5} {:>8} {:>8} {:>7.3}%  {}",
            q.rank,
            q.query_id,
            q.weight,
            share_percent(q.weight, totals.weighted),
            q.query,
        )?;
    }
    Ok(())
}

pub fn stats<W: Write>(corpus: &LoadedCorpus, path: &str, json: bool, out: &mut W) -> Result<()> {
    let stats = corpus.trie.statistics(path, corpus.tables.frequency())?;

    if json {
        return write_json(out, &serde_json::to_value(&stats)?);
    }

    let totals = corpus.trie.totals(corpus.tables.frequency());
    writeln!(out, "{}", display_path(path).bold())?;
    writeln!(
        out,
        "  occurrences:            {} ({:.2}%)",
        stats.occurrence_count,
        share_percent(stats.occurrence_count, totals.unique)
    )?;
    writeln!(
        out,
        "  weighted:               {} ({:.2}%)",
        stats.weighted_count,
        share_percent(stats.weighted_count, totals.weighted)
    )?;
    writeln!(out, "  ending here:            {}", stats.non_dependent_count)?;
    writeln!(out, "  ending here (weighted): {}", stats.non_dependent_weighted)?;
    writeln!(out, "  continuing below:       {}", stats.id_to_children.len())?;
    Ok(())
}

pub fn set<W: Write>(
    corpus: &LoadedCorpus,
    op: SetOp,
    left: &str,
    right: &str,
    window: Window,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let ids = corpus.trie.combine(left, right, op)?;

    let mut rows = Vec::new();
    for (rank, query_id) in window.apply(ids.iter()) {
        let query = corpus
            .tables
            .query(query_id)
            .ok_or(TrieError::UnknownQueryId(query_id))?;
        rows.push((rank, query_id, query));
    }

    if json {
        let rows: Vec<_> = rows.iter().map(|(r, id, q)| json!([r, id, q])).collect();
        return write_json(out, &json!({ "count": ids.len(), "queries": rows }));
    }

    writeln!(
        out,
        "{} {:?} {}: {} queries",
        display_path(left).bold(),
        op,
        display_path(right).bold(),
        ids.len()
    )?;
    for (rank, query_id, query) in rows {
        writeln!(out, "{rank:>5} {query_id:>8}  {query}")?;
    }
    Ok(())
}

pub fn roots<W: Write>(
    corpus: &LoadedCorpus,
    window: Window,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let clusters = corpus.trie.root_clusters();
    let ranked = window.apply(clusters.ranked());

    if json {
        let rows: Vec<_> = ranked
            .map(|(rank, (pattern, ids))| json!([rank, ids.len(), pattern]))
            .collect();
        return write_json(out, &json!(rows));
    }

    let total = corpus.trie.query_count();
    writeln!(out, "{} {} root patterns", "roots:".bold(), clusters.len())?;
    for (rank, (pattern, ids)) in ranked {
        writeln!(
            out,
            "{:>5} {:>8} {:>6.2}%  {}",
            rank,
            ids.len(),
            share_percent(ids.len() as u64, total),
            pattern.cyan()
        )?;
    }
    Ok(())
}

pub fn actions<W: Write>(
    corpus: &LoadedCorpus,
    path: &str,
    actions: &ActionTable,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let histogram = corpus.trie.action_histogram(path, &corpus.tables, actions)?;

    if json {
        return write_json(out, &json!(histogram));
    }

    let total: u64 = histogram.iter().map(|(_, n)| n).sum();
    writeln!(
        out,
        "{} ({} queries with an action)",
        display_path(path).bold(),
        total
    )?;
    for (action, count) in &histogram {
        writeln!(
            out,
            "{:>8} {:>6.2}%  {}",
            count,
            share_percent(*count, total),
            action
        )?;
    }
    Ok(())
}
