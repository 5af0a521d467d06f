//! Pipeline-level error types.
//!
//! Individual matcher failures are recoverable: the pipeline logs them and
//! proceeds with whatever the other matchers returned. The only error a
//! caller ever sees from `match_text` is an unknown strategy name, which
//! indicates a caller bug rather than a data problem.

use crate::store::StoreError;

/// A failure inside one matcher. Distinguishes "found nothing" (an empty
/// `Ok` list) from "could not run".
#[derive(thiserror::Error, Debug)]
pub enum MatcherError {
    #[error("reference store failure: {0}")]
    Store(#[from] StoreError),
    #[error("matcher task failed: {0}")]
    Task(String),
}

/// A failure of the whole `match_text` call.
#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("unknown strategy: {0:?}")]
    UnknownStrategy(String),
}
