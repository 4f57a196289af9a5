// proximity/store.rs
//! Candidate storage seam for crossings and hazards reported from outside.

use std::collections::HashMap;

use super::ProximityCandidate;
use crate::core::geometry::{self, Coordinate};

/// Minimal CRUD over proximity candidates
pub trait CandidateStore {
    /// Inserts or replaces a candidate by id
    fn add(&mut self, candidate: ProximityCandidate);
    /// Removes a candidate, returning it if it existed
    fn remove(&mut self, id: &str) -> Option<ProximityCandidate>;
    /// Candidates within `radius_m` of `center`
    fn query_radius(&self, center: &Coordinate, radius_m: f64) -> Vec<ProximityCandidate>;
}

/// Hash-map backed store
#[derive(Debug, Default, Clone)]
pub struct InMemoryCandidateStore {
    candidates: HashMap<String, ProximityCandidate>,
}

impl InMemoryCandidateStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl CandidateStore for InMemoryCandidateStore {
    fn add(&mut self, candidate: ProximityCandidate) {
        self.candidates.insert(candidate.id.clone(), candidate);
    }

    fn remove(&mut self, id: &str) -> Option<ProximityCandidate> {
        self.candidates.remove(id)
    }

    fn query_radius(&self, center: &Coordinate, radius_m: f64) -> Vec<ProximityCandidate> {
        let mut found: Vec<(f64, &ProximityCandidate)> = self
            .candidates
            .values()
            .map(|c| (geometry::distance(center, &c.coordinate), c))
            .filter(|(d, _)| *d <= radius_m)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, c)| c.clone()).collect()
    }
}
