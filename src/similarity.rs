use std::collections::HashSet;

use crate::model::PlaceCandidate;

pub fn jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<char> = a.to_lowercase().chars().collect();
    let right: HashSet<char> = b.to_lowercase().chars().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: PlaceCandidate,
    pub score: f64,
}

/// Ranks candidates by descending score. Equal scores keep the upstream
/// service order, so the ranking is deterministic for a given response.
pub fn rank_candidates(name: &str, candidates: Vec<PlaceCandidate>) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| ScoredCandidate {
            score: jaccard(name, &candidate.display_name),
            candidate,
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}
