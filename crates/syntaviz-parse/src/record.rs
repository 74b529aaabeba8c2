//! Corpus record lines: `query \t tree_json [\t tabular_json] \t query_id`.

use std::io::BufRead;

use crate::error::ParseError;
use crate::tabular::{records_from_json, records_to_json, TabularRecord};
use crate::tree::TreeNode;

/// One parsed query as handed from segmentation to indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    pub query: String,
    pub tree: TreeNode,
    pub tabular: Option<Vec<TabularRecord>>,
    pub query_id: u32,
}

/// Parse one record line. `line_no` is only used for error reporting.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<CorpusRecord, ParseError> {
    let corrupt = |reason: String| ParseError::CorruptRecord {
        line: line_no,
        reason,
    };

    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let (query, tree_json, tabular_json, id) = match cols.as_slice() {
        [query, tree, id] => (*query, *tree, None, *id),
        [query, tree, tabular, id] => (*query, *tree, Some(*tabular), *id),
        other => {
            return Err(corrupt(format!(
                "expected 3 or 4 tab-separated columns, found {}",
                other.len()
            )))
        }
    };

    let query_id: u32 = id
        .trim()
        .parse()
        .map_err(|_| corrupt(format!("invalid query id `{id}`")))?;
    let tree = TreeNode::from_json(tree_json).map_err(|e| corrupt(e.to_string()))?;
    let tabular = tabular_json
        .map(|text| records_from_json(text).map_err(|e| corrupt(format!("tabular payload: {e}"))))
        .transpose()?;

    Ok(CorpusRecord {
        query: query.to_string(),
        tree,
        tabular,
        query_id,
    })
}

/// Render a record line (no trailing newline).
pub fn format_record(record: &CorpusRecord) -> String {
    let query = record.query.replace(['\t', '\n', '\r'], " ");
    match &record.tabular {
        Some(rows) => format!(
            "{query}\t{}\t{}\t{}",
            record.tree.to_json(),
            records_to_json(rows),
            record.query_id
        ),
        None => format!("{query}\t{}\t{}", record.tree.to_json(), record.query_id),
    }
}

/// Stream records from a reader, yielding `(line_index, result)` per
/// non-blank line. `line_index` is zero-based. A line that is not valid
/// UTF-8 is a corrupt record; the stream carries on past it.
pub fn read_records<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = (usize, Result<CorpusRecord, ParseError>)> {
    reader
        .split(b'\n')
        .enumerate()
        .filter_map(|(index, bytes)| {
            let mut bytes = match bytes {
                Ok(bytes) => bytes,
                Err(err) => return Some((index, Err(ParseError::Io(err)))),
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            match String::from_utf8(bytes) {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some((index, parse_record_line(&line, index + 1))),
                Err(err) => Some((
                    index,
                    Err(ParseError::CorruptRecord {
                        line: index + 1,
                        reason: format!("not valid UTF-8 ({})", err.utf8_error()),
                    }),
                )),
            }
        })
}
