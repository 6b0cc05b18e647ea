//! Error taxonomy for the core: not a type hierarchy, four kinds of failure
//! with distinct propagation policies (spec §7).

use thiserror::Error;

/// The four error kinds the core ever raises. Iterator "not found" is
/// expressed as a zero return, never as a `CoreError` — see `posting`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The 21-bit trie block index saturated, or a 32-bit counter would
    /// overflow. Surfaced to the caller; the operation is aborted and no
    /// state is mutated.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// Corrupt block header, unknown node class, negative df, mismatched
    /// lexeme during patch. Fatal to the current operation; the component
    /// is not safe to use further in this process.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Cardinality greater than arity, a range argument given to an
    /// operator that forbids it, an unknown parameter name. Reported to
    /// the caller; the operation is a no-op.
    #[error("input domain error: {0}")]
    InputDomain(String),

    /// KV store write failure, disk I/O error during a statistics log
    /// write. The transaction rolls back staging and removes any
    /// half-written files where possible.
    #[error("external error: {0}")]
    External(#[source] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn capacity(msg: impl Into<String>) -> Self {
        CoreError::Capacity(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CoreError::Invariant(msg.into())
    }

    pub fn input_domain(msg: impl Into<String>) -> Self {
        CoreError::InputDomain(msg.into())
    }

    pub fn external(err: impl Into<anyhow::Error>) -> Self {
        CoreError::External(err.into())
    }
}

/// A drain-on-first-error sink, matching the builder/viewer propagation
/// policy in spec §7: after the first error, subsequent operations become
/// no-ops until the sink is drained.
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Vec<CoreError>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, err: CoreError) {
        self.errors.push(err);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns every reported error and clears the sink.
    pub fn drain(&mut self) -> Vec<CoreError> {
        std::mem::take(&mut self.errors)
    }
}
