//! Externally supplied corpus tables: query texts and frequency weights.
//!
//! Both tables are keyed by query id and sparse: ids come from record files
//! and need not be dense.

use std::io::{self, BufRead};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use syntaviz_parse::CorpusRecord;

use crate::error::{Result, TrieError};
use crate::QueryId;

/// Lines of `reader` as raw bytes, `\n` and `\r\n` endings removed.
pub(crate) fn byte_lines<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<Vec<u8>>> {
    reader.split(b'\n').map(|line| {
        line.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            bytes
        })
    })
}

/// One table line as text. Invalid UTF-8 is a corrupt table at `line`.
pub(crate) fn table_line(bytes: Vec<u8>, line: usize) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| TrieError::CorruptTable {
        line,
        reason: format!("not valid UTF-8 ({})", err.utf8_error()),
    })
}

/// Per-query weights keyed by query id. Unknown ids weigh 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable(AHashMap<QueryId, u64>);

impl FrequencyTable {
    /// Dense weights: `weights[i]` is the weight of query id `i`.
    pub fn new(weights: Vec<u64>) -> Self {
        Self(
            weights
                .into_iter()
                .enumerate()
                .map(|(id, w)| (id as QueryId, w))
                .collect(),
        )
    }

    pub fn weight(&self, query_id: QueryId) -> u64 {
        self.0.get(&query_id).copied().unwrap_or(0)
    }

    /// Sum of weights, counting repeated ids each time.
    pub fn weighted_sum<I>(&self, ids: I) -> u64
    where
        I: IntoIterator<Item = QueryId>,
    {
        ids.into_iter().map(|id| self.weight(id)).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Query texts plus frequency weights, both keyed by query id.
#[derive(Debug, Clone, Default)]
pub struct CorpusTables {
    queries: AHashMap<QueryId, String>,
    frequency: FrequencyTable,
}

impl CorpusTables {
    /// Dense query texts: `queries[i]` is the text of query id `i`.
    pub fn new(queries: Vec<String>, frequency: FrequencyTable) -> Self {
        let queries = queries
            .into_iter()
            .enumerate()
            .map(|(id, q)| (id as QueryId, q))
            .collect();
        Self { queries, frequency }
    }

    /// Read a query table file: `id \t query [\t ...] \t frequency` per line.
    ///
    /// The query id is the zero-based line number. Two-column lines carry no
    /// frequency and weigh 0; a blank line is an empty query.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut queries = Vec::new();
        let mut weights = Vec::new();

        for (index, bytes) in byte_lines(reader).enumerate() {
            let line = table_line(bytes?, index + 1)?;
            let line = line.as_str();
            if line.trim().is_empty() {
                queries.push(String::new());
                weights.push(0);
                continue;
            }

            let cols: Vec<&str> = line.split('\t').collect();
            let (query, weight) = match cols.as_slice() {
                [_, query] => (*query, 0),
                [_, query, .., freq] => {
                    let weight = freq.trim().parse::<u64>().map_err(|_| {
                        TrieError::CorruptTable {
                            line: index + 1,
                            reason: format!("invalid frequency `{freq}`"),
                        }
                    })?;
                    (*query, weight)
                }
                _ => {
                    return Err(TrieError::CorruptTable {
                        line: index + 1,
                        reason: "expected `id \\t query [\\t frequency]`".to_string(),
                    })
                }
            };
            queries.push(query.trim().to_string());
            weights.push(weight);
        }

        Ok(Self::new(queries, FrequencyTable::new(weights)))
    }

    /// Tables implied by the records themselves: each record's query text
    /// at its id, every query weighing 1. Ids no record carries stay unknown.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CorpusRecord>,
    {
        let mut queries = AHashMap::new();
        let mut weights = AHashMap::new();
        for record in records {
            queries.insert(record.query_id, record.query.clone());
            weights.insert(record.query_id, 1);
        }
        Self {
            queries,
            frequency: FrequencyTable(weights),
        }
    }

    pub fn query(&self, query_id: QueryId) -> Option<&str> {
        self.queries.get(&query_id).map(String::as_str)
    }

    pub fn frequency(&self) -> &FrequencyTable {
        &self.frequency
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syntaviz_parse::TreeNode;

    #[test]
    fn reads_query_and_last_column_frequency() {
        let text = "0\tshow movies\t12\n1\tfind hbo\textra\t3\n\n3\tnews\n";
        let tables = CorpusTables::from_reader(text.as_bytes()).unwrap();
        assert_eq!(tables.len(), 4);
        assert_eq!(tables.query(0), Some("show movies"));
        assert_eq!(tables.query(1), Some("find hbo"));
        assert_eq!(tables.query(2), Some(""));
        assert_eq!(tables.frequency().weight(0), 12);
        assert_eq!(tables.frequency().weight(1), 3);
        assert_eq!(tables.frequency().weight(3), 0);
        assert_eq!(tables.frequency().weight(99), 0);
    }

    #[test]
    fn bad_frequency_is_a_corrupt_table() {
        let err = CorpusTables::from_reader("0\tq\tmany\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrieError::CorruptTable { line: 1, .. }));
        let err = CorpusTables::from_reader("lonely\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrieError::CorruptTable { line: 1, .. }));
    }

    #[test]
    fn weighted_sum_counts_duplicates() {
        let freq = FrequencyTable::new(vec![5, 2]);
        assert_eq!(freq.weighted_sum([0, 0, 1, 7]), 12);
    }

    #[test]
    fn tables_from_sparse_records() {
        let records = [
            CorpusRecord {
                query: "b".into(),
                tree: TreeNode::new("b NN ROOT"),
                tabular: None,
                query_id: 2,
            },
            CorpusRecord {
                query: "a".into(),
                tree: TreeNode::new("a NN ROOT"),
                tabular: None,
                query_id: 0,
            },
        ];
        let tables = CorpusTables::from_records(&records);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables.query(0), Some("a"));
        assert_eq!(tables.query(1), None);
        assert_eq!(tables.frequency().weight(1), 0);
        assert_eq!(tables.frequency().weight(2), 1);
    }

    #[test]
    fn huge_record_ids_stay_sparse() {
        let records = [CorpusRecord {
            query: "hbo".into(),
            tree: TreeNode::new("hbo NN ROOT"),
            tabular: None,
            query_id: 4_000_000_000,
        }];
        let tables = CorpusTables::from_records(&records);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables.query(4_000_000_000), Some("hbo"));
        assert_eq!(tables.query(4_000_000_001), None);
        assert_eq!(tables.frequency().weight(4_000_000_000), 1);
        assert_eq!(tables.frequency().len(), 1);
    }

    #[test]
    fn invalid_utf8_names_the_table_line() {
        let bytes = b"0\tshow movies\t2\n1\tcaf\xe9\t1\n";
        let err = CorpusTables::from_reader(&bytes[..]).unwrap_err();
        assert!(matches!(err, TrieError::CorruptTable { line: 2, .. }));
        assert!(err.to_string().contains("UTF-8"));
    }
}
