//! Transaction identifiers

use std::fmt;

/// Protocol-level correlation identifier linking one request to its one response
///
/// On MBAP (TCP/UDP) framing this is the 16-bit transaction identifier field
/// that the server echoes back. Framings without such a field share the single
/// [`TransactionId::IMPLICIT`] slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u16);

impl TransactionId {
    /// Reserved value, also used as the only slot of id-less framings
    pub const IMPLICIT: TransactionId = TransactionId(0);

    /// First value handed out by sequential allocation
    pub const FIRST: TransactionId = TransactionId(1);

    /// Largest value representable on the wire
    pub const MAX: TransactionId = TransactionId(u16::MAX);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// The id following this one, skipping the reserved zero on wraparound
    pub fn next(self) -> Self {
        match self.0.checked_add(1) {
            Some(value) => Self(value),
            None => Self::FIRST,
        }
    }

    pub fn is_implicit(self) -> bool {
        self == Self::IMPLICIT
    }
}

impl From<u16> for TransactionId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<TransactionId> for u16 {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a framing carries transaction identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMode {
    /// Every frame carries an id; many requests may be pipelined
    Sequential,
    /// No id on the wire; one request at a time in the implicit slot
    Implicit,
}

impl IdMode {
    /// Maximum number of requests that can be outstanding at once
    pub fn pipeline_depth(self) -> usize {
        match self {
            IdMode::Sequential => u16::MAX as usize,
            IdMode::Implicit => 1,
        }
    }
}
