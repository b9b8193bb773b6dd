//! Candidate selection for batch reconciliation.
//!
//! Candidates are taken in service order. Candidates without a score vector
//! are skipped and do not count toward the cap.

use crate::output::OutputRow;
use crate::response::Candidate;

/// Number of candidates retained per record.
pub const DEFAULT_MAX_CANDIDATES: usize = 6;

/// Retained candidates, in service order, at most `max`.
pub fn select(candidates: &[Candidate], max: usize) -> Vec<&Candidate> {
    candidates
        .iter()
        .filter(|candidate| candidate.has_vector())
        .take(max)
        .collect()
}

/// Output rows for one record's candidates.
pub fn rows_for(
    query_name: &str,
    record_id: &str,
    candidates: &[Candidate],
    max: usize,
) -> Vec<OutputRow> {
    select(candidates, max)
        .into_iter()
        .map(|candidate| OutputRow::from_candidate(query_name, record_id, candidate))
        .collect()
}
