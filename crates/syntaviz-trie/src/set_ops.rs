//! Set algebra over cluster memberships.

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ClusterTrie;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOp {
    Union,
    Intersect,
    /// Left minus right.
    Subtract,
}

impl SetOp {
    pub fn apply(self, left: &RoaringBitmap, right: &RoaringBitmap) -> RoaringBitmap {
        match self {
            SetOp::Union => left | right,
            SetOp::Intersect => left & right,
            SetOp::Subtract => left - right,
        }
    }
}

impl ClusterTrie {
    /// Distinct members of the node named by `path`.
    pub fn member_set(&self, path: &str) -> Result<RoaringBitmap> {
        Ok(self.node(self.lookup(path)?).member_set())
    }

    /// Both paths are resolved before anything is computed.
    pub fn combine(&self, left: &str, right: &str, op: SetOp) -> Result<RoaringBitmap> {
        let left = self.member_set(left)?;
        let right = self.member_set(right)?;
        Ok(op.apply(&left, &right))
    }
}
