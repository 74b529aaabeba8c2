//! `syntaviz segment`: turn raw parser output into corpus records.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use syntaviz_parse::{
    format_record, tree_from_tabular, ConllLayout, CorpusRecord, IndentedSegmenter,
    ParsedTranscript, SegmentError, TabularRecord, TabularSegmenter,
};

/// Outcome of one segmentation run.
#[derive(Debug, Default, Serialize)]
pub struct SegmentReport {
    pub written: usize,
    /// Transcripts rebuilt from the tabular transcript after the ascii tree failed.
    pub recovered: usize,
    /// `(transcript index, reason)` for every transcript left out.
    pub dropped: Vec<(usize, String)>,
    /// Transcripts with no id line left to pair with.
    pub unpaired: usize,
}

/// Lines decoded lossily, with the 1-based numbers of lines that
/// were not valid UTF-8. I/O errors are returned, never truncated.
fn read_lossy<R: BufRead>(reader: R) -> io::Result<(Vec<String>, Vec<usize>)> {
    let mut lines = Vec::new();
    let mut invalid = Vec::new();
    for (index, bytes) in reader.split(b'\n').enumerate() {
        let mut bytes = bytes?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(line) => lines.push(line),
            Err(err) => {
                invalid.push(index + 1);
                lines.push(String::from_utf8_lossy(err.as_bytes()).into_owned());
            }
        }
    }
    Ok((lines, invalid))
}

/// Read `id \t query` lines; only the id is used.
pub fn read_ids<R: BufRead>(reader: R) -> Result<Vec<u32>> {
    let (lines, _) = read_lossy(reader).context("failed to read id file")?;
    let mut ids = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let id = line.split('\t').next().unwrap_or_default().trim();
        let id = id
            .parse()
            .with_context(|| format!("id file line {}: invalid id `{id}`", index + 1))?;
        ids.push(id);
    }
    Ok(ids)
}

fn header_line(parsed: &std::result::Result<ParsedTranscript, SegmentError>) -> usize {
    match parsed {
        Ok(parsed) => parsed.header_line,
        Err(err) => err.header_line,
    }
}

/// Pair transcripts with ids in order and write one record per pair.
///
/// A transcript whose ascii tree does not reconstruct is rebuilt from its
/// tabular transcript when one is supplied, and dropped otherwise. A
/// transcript containing a line that is not valid UTF-8 is dropped.
pub fn segment<R, T, W>(
    transcripts: R,
    tabular: Option<T>,
    ids: &[u32],
    layout: &ConllLayout,
    out: &mut W,
) -> Result<SegmentReport>
where
    R: BufRead,
    T: BufRead,
    W: Write,
{
    let mut report = SegmentReport::default();

    let (lines, invalid) = read_lossy(transcripts).context("failed to read transcripts")?;
    let parsed: Vec<_> = IndentedSegmenter::new(lines.iter()).collect();

    // lossy decoding keeps one line per input line, so groups stay aligned
    let mut tabular = match tabular {
        Some(reader) => {
            let (rows, bad) = read_lossy(reader).context("failed to read tabular transcript")?;
            if let Some(first) = bad.first() {
                tracing::warn!(line = first, count = bad.len(), "tabular lines are not valid UTF-8");
            }
            Some(TabularSegmenter::new(rows.into_iter()))
        }
        None => None,
    };
    let mut ids = ids.iter();

    let starts: Vec<usize> = parsed.iter().map(header_line).collect();
    for (index, parsed) in parsed.into_iter().enumerate() {
        let rows: Option<Vec<TabularRecord>> = tabular.as_mut().and_then(Iterator::next);
        let Some(&query_id) = ids.next() else {
            report.unpaired += 1;
            continue;
        };

        let start = starts[index];
        let end = starts.get(index + 1).copied().unwrap_or(usize::MAX);
        if let Some(bad) = invalid.iter().find(|&&n| n >= start && n < end) {
            tracing::warn!(index, query_id, line = bad, "dropping transcript with invalid UTF-8");
            report
                .dropped
                .push((index, format!("input line {bad} is not valid UTF-8")));
            continue;
        }

        let (query, tree) = match parsed {
            Ok(parsed) => (parsed.query, parsed.tree),
            Err(err) => match rows.as_deref().map(|r| tree_from_tabular(r, layout)) {
                Some(Ok(tree)) => {
                    tracing::debug!(index, error = %err, "rebuilt transcript from tabular rows");
                    report.recovered += 1;
                    (err.query, tree)
                }
                _ => {
                    tracing::warn!(index, query_id, error = %err, "dropping transcript");
                    report.dropped.push((index, err.to_string()));
                    continue;
                }
            },
        };

        let record = CorpusRecord {
            query,
            tree,
            tabular: rows,
            query_id,
        };
        writeln!(out, "{}", format_record(&record))?;
        report.written += 1;
    }

    if report.unpaired > 0 {
        tracing::warn!(unpaired = report.unpaired, "more transcripts than ids");
    }
    Ok(report)
}

pub fn run(
    input: &Path,
    ids: &Path,
    tabular: Option<&Path>,
    out: &Path,
    layout: &ConllLayout,
) -> Result<SegmentReport> {
    let open = |path: &Path| -> Result<BufReader<File>> {
        Ok(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ))
    };

    let ids = read_ids(open(ids)?)?;
    let tabular = tabular.map(open).transpose()?;
    let mut writer = BufWriter::new(
        File::create(out).with_context(|| format!("failed to create {}", out.display()))?,
    );
    let report = segment(open(input)?, tabular, &ids, layout, &mut writer)?;
    writer.flush()?;

    tracing::info!(
        written = report.written,
        recovered = report.recovered,
        dropped = report.dropped.len(),
        "segmented transcripts"
    );
    Ok(report)
}
