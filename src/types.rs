//! Validated newtypes for the core data model (spec §3). Each type enforces
//! its invariant at construction so illegal values cannot flow downstream.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal, dense document identifier. Strictly positive; zero means
/// "none" and is never held inside this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentNumber(u64);

impl DocumentNumber {
    pub fn new(value: u64) -> Result<Self> {
        ensure!(value > 0, "DocumentNumber must be strictly positive");
        Ok(Self(value))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (type-id, value-id) pair packed into one 64-bit number: the type-id
/// occupies the upper 32 bits, the value-id the lower 32 bits. A given
/// (type-string, value-string) pair has exactly one `TermNumber` for the
/// lifetime of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermNumber(u64);

impl TermNumber {
    pub fn new(type_id: u32, value_id: u32) -> Result<Self> {
        ensure!(type_id > 0, "term type id must be strictly positive");
        ensure!(value_id > 0, "term value id must be strictly positive");
        Ok(Self(((type_id as u64) << 32) | value_id as u64))
    }

    pub fn type_id(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn value_id(&self) -> u32 {
        self.0 as u32
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A document-local ordinal position of a token occurrence. Positions are
/// not byte offsets; a document's positions start at 1 and may have gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position(u32);

impl Position {
    pub fn new(value: u32) -> Result<Self> {
        ensure!(value > 0, "Position must be strictly positive");
        Ok(Self(value))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn checked_add(&self, delta: u32) -> Option<Position> {
        self.0.checked_add(delta).map(Position)
    }
}

/// A posting: (document, position, length). Orderable by (doc, position)
/// to match the storage iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub docno: DocumentNumber,
    pub pos: Position,
    pub length: u32,
}

impl Posting {
    pub fn new(docno: DocumentNumber, pos: Position, length: u32) -> Result<Self> {
        ensure!(length >= 1, "posting length must be at least 1");
        Ok(Self { docno, pos, length })
    }
}

impl PartialOrd for Posting {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Posting {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.docno, self.pos).cmp(&(other.docno, other.pos))
    }
}

/// A half-open range of positions, `[start, end)`, used to scope
/// summarization and weighting to part of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: u32,
    pub end: u32,
}

impl IndexRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        ensure!(end >= start, "IndexRange end must be >= start");
        Ok(Self { start, end })
    }

    pub fn contains(&self, pos: Position) -> bool {
        let p = pos.get();
        p >= self.start && p < self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A totally ordered (seconds-since-epoch, sub-second counter) pair,
/// tagging every committed statistics blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    secs: i64,
    counter: u32,
}

impl Timestamp {
    pub fn new(secs: i64, counter: u32) -> Result<Self> {
        ensure!(secs >= 0, "Timestamp seconds must be non-negative");
        Ok(Self { secs, counter })
    }

    pub fn now_with_counter(counter: u32) -> Self {
        let secs = chrono::Utc::now().timestamp();
        Self { secs, counter }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Renders as a string that sorts lexicographically equivalent to the
    /// timestamp's total order (fixed-width zero-padded decimal fields),
    /// matching the `stats_<ts>.bin` filename scheme in spec §6.
    pub fn to_sortable_string(&self) -> String {
        format!("{:020}.{:010}", self.secs, self.counter)
    }

    pub fn from_sortable_string(s: &str) -> Result<Self> {
        let (secs_part, counter_part) = s
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("malformed timestamp string: {s}"))?;
        let secs: i64 = secs_part.parse()?;
        let counter: u32 = counter_part.parse()?;
        Timestamp::new(secs, counter)
    }
}

/// A per-document signed delta to a term's document frequency, the
/// currency of statistics distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfDelta {
    pub term_type: String,
    pub term_value: String,
    pub delta: i32,
}
