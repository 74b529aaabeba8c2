//! SyntaViz transcript formats and canonical dependency trees.
//!
//! The external dependency parser emits one of two transcript encodings:
//!
//! - an **indentation transcript** (an ascii tree per query, `+-- ` markers
//!   every 4 columns), reconstructed line-by-line by [`TreeReconstructor`]
//!   and segmented per query by [`IndentedSegmenter`];
//! - a **tabular transcript** (CoNLL-style rows, one blank-line-terminated
//!   group per query), segmented by [`TabularSegmenter`] and assembled by
//!   [`tree_from_tabular`].
//!
//! Both produce the same [`TreeNode`]. Trees travel between stages as
//! [`CorpusRecord`] lines (`query \t tree_json [\t tabular_json] \t id`).

pub mod error;
pub mod record;
pub mod segment;
pub mod tabular;
pub mod transcript;
pub mod tree;

pub use error::{ParseError, ReconstructError, TreeFormatError};
pub use record::{format_record, parse_record_line, read_records, CorpusRecord};
pub use segment::{IndentedSegmenter, ParsedTranscript, SegmentError};
pub use tabular::{tree_from_tabular, ConllLayout, TabularRecord, TabularSegmenter};
pub use transcript::{reconstruct, TranscriptLine, TreeReconstructor};
pub use tree::{TreeItem, TreeNode};
