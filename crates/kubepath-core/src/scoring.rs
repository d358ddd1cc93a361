//! Attack path scoring weights.
//!
//! Formula: `score = Σ over edges (confidence + criticality_weight(end node))`.
//! An additive heuristic, not a probability. The Neo4j store evaluates the
//! same formula in Cypher; the in-memory store calls [`path_score`].

/// Confidence assumed for an edge stored without one.
pub const DEFAULT_EDGE_CONFIDENCE: f64 = 0.2;

pub const HIGH_WEIGHT: f64 = 2.0;
pub const MEDIUM_WEIGHT: f64 = 1.0;
pub const FALLBACK_WEIGHT: f64 = 0.5;

/// Weight of a stored criticality value.
pub fn criticality_weight(criticality: Option<&str>) -> f64 {
    match criticality {
        Some("HIGH") => HIGH_WEIGHT,
        Some("MEDIUM") => MEDIUM_WEIGHT,
        _ => FALLBACK_WEIGHT,
    }
}

/// Contribution of one edge to its path's score.
pub fn edge_score(confidence: Option<f64>, end_criticality: Option<&str>) -> f64 {
    confidence.unwrap_or(DEFAULT_EDGE_CONFIDENCE) + criticality_weight(end_criticality)
}

/// Score a path given `(confidence, end node criticality)` per edge.
pub fn path_score<'a, I>(edges: I) -> f64
where
    I: IntoIterator<Item = (Option<f64>, Option<&'a str>)>,
{
    edges
        .into_iter()
        .map(|(confidence, criticality)| edge_score(confidence, criticality))
        .sum()
}

/// Round a score to two decimals for presentation.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
