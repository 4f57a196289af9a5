//! Proximity engines for PathSense
//!
//! One engine shape serves turns, street crossings and hazards. Each engine
//! holds a set of candidates, finds the nearest one whose influence radius
//! contains the walker, grades it into a tier and throttles repeats. Turn
//! candidates come from the route plan (see [`turns::TurnMonitor`]); crossings
//! and hazards are supplied from outside through [`CandidateStore`].

pub mod store;
pub mod turns;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ProximitySettings;
use crate::core::geometry::{self, Coordinate};

pub use store::{CandidateStore, InMemoryCandidateStore};
pub use turns::{TurnEvent, TurnMonitor};

/// Which engine produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityKind {
    /// Upcoming turn on the route
    Turn,
    /// Street crossing
    Crossing,
    /// Reported hazard
    Hazard,
}

/// Warning urgency, ordered from least to most urgent.
///
/// For turns the tiers read as early warning, approaching and at turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityTier {
    /// Inside the influence radius, still far
    Distant,
    /// Getting close
    Approaching,
    /// Right there
    Immediate,
}

impl ProximityTier {
    /// One tier more urgent, saturating at `Immediate`
    pub fn promoted(self) -> Self {
        match self {
            ProximityTier::Distant => ProximityTier::Approaching,
            ProximityTier::Approaching | ProximityTier::Immediate => ProximityTier::Immediate,
        }
    }

    /// Label used when announcing this tier for the given engine
    pub fn label(self, kind: ProximityKind) -> &'static str {
        match (kind, self) {
            (ProximityKind::Turn, ProximityTier::Distant) => "early warning",
            (ProximityKind::Turn, ProximityTier::Approaching) => "approaching",
            (ProximityKind::Turn, ProximityTier::Immediate) => "at turn",
            (_, ProximityTier::Distant) => "distant",
            (_, ProximityTier::Approaching) => "approaching",
            (_, ProximityTier::Immediate) => "immediate",
        }
    }
}

/// Candidate severity. High and Critical promote the tier by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a mention
    Low,
    /// Ordinary obstacle
    #[default]
    Medium,
    /// Promoted one tier
    High,
    /// Most severe; promoted one tier
    Critical,
}

impl Severity {
    /// Whether warnings for this severity are promoted one tier
    pub fn escalates(&self) -> bool {
        *self >= Severity::High
    }
}

/// A point of interest the walker should be warned about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityCandidate {
    /// Unique id within its engine
    pub id: String,
    /// Location
    pub coordinate: Coordinate,
    /// Influence radius, meters
    pub radius_m: f64,
    /// Severity
    pub severity: Severity,
    /// Free-form category ("construction", "signalised", ...)
    pub category: String,
    /// Expiry; `None` never expires
    pub valid_until: Option<DateTime<Utc>>,
}

impl ProximityCandidate {
    /// Medium-severity candidate without expiry
    pub fn new(id: impl Into<String>, coordinate: Coordinate, radius_m: f64) -> Self {
        ProximityCandidate {
            id: id.into(),
            coordinate,
            radius_m,
            severity: Severity::default(),
            category: String::new(),
            valid_until: None,
        }
    }

    /// Sets the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the category label
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets an expiry time
    pub fn valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.valid_until = Some(until);
        self
    }

    /// Whether the candidate has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| now >= until)
    }
}

/// What happened to a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProximitySignal {
    /// Warn at this tier
    Warning(ProximityTier),
    /// Previously warned candidate no longer applies
    Cleared,
}

/// Output of an engine update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityEvent {
    /// Emitting engine
    pub kind: ProximityKind,
    /// Candidate concerned
    pub candidate_id: String,
    /// Distance at emission time, meters
    pub distance_m: f64,
    /// Warning tier or clearing
    pub signal: ProximitySignal,
    /// Emission time
    pub timestamp: DateTime<Utc>,
}

/// Distance thresholds for the inner tiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// At or below: Approaching
    pub approaching_m: f64,
    /// At or below: Immediate
    pub immediate_m: f64,
}

#[derive(Debug, Clone, Copy)]
struct WarningRecord {
    tier: ProximityTier,
    at: DateTime<Utc>,
    distance_m: f64,
}

/// Tiered, throttled proximity monitor over one candidate set
pub struct ProximityEngine {
    kind: ProximityKind,
    thresholds: TierThresholds,
    default_radius_m: f64,
    throttle: chrono::Duration,
    candidates: HashMap<String, ProximityCandidate>,
    warned: HashMap<String, WarningRecord>,
    monitoring: bool,
}

impl ProximityEngine {
    /// Engine configured from crossing/hazard settings
    pub fn new(kind: ProximityKind, settings: &ProximitySettings) -> Self {
        ProximityEngine::with_thresholds(
            kind,
            TierThresholds {
                approaching_m: settings.approaching_m,
                immediate_m: settings.immediate_m,
            },
            settings.default_radius_m,
            settings.throttle(),
        )
    }

    /// Engine with explicit thresholds
    pub fn with_thresholds(
        kind: ProximityKind,
        thresholds: TierThresholds,
        default_radius_m: f64,
        throttle: chrono::Duration,
    ) -> Self {
        ProximityEngine {
            kind,
            thresholds,
            default_radius_m,
            throttle,
            candidates: HashMap::new(),
            warned: HashMap::new(),
            monitoring: false,
        }
    }

    /// Starts monitoring. `Some` replaces the candidate set, `None` keeps it.
    pub fn start_monitoring(&mut self, candidates: Option<Vec<ProximityCandidate>>) {
        if let Some(candidates) = candidates {
            self.candidates.clear();
            for candidate in candidates {
                self.add(candidate);
            }
        }
        self.warned.clear();
        self.monitoring = true;
        info!("{:?} monitoring started with {} candidates", self.kind, self.candidates.len());
    }

    /// Stops monitoring and forgets warning history. Candidates are kept.
    pub fn stop_monitoring(&mut self) {
        if self.monitoring {
            info!("{:?} monitoring stopped", self.kind);
        }
        self.monitoring = false;
        self.warned.clear();
    }

    /// Whether updates are processed
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Number of known candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when no candidates are known
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Removes a candidate without emitting a clearing event
    pub fn retire(&mut self, id: &str) {
        self.candidates.remove(id);
        self.warned.remove(id);
    }

    /// Pulls candidates near `center` from an external store
    pub fn load_from(&mut self, store: &dyn CandidateStore, center: &Coordinate, radius_m: f64) -> usize {
        let found = store.query_radius(center, radius_m);
        let count = found.len();
        for candidate in found {
            self.add(candidate);
        }
        debug!("{:?}: loaded {} candidates within {:.0} m", self.kind, count, radius_m);
        count
    }

    /// Tier for a distance, after severity promotion
    pub fn classify(&self, distance_m: f64, severity: Severity) -> ProximityTier {
        let tier = if distance_m <= self.thresholds.immediate_m {
            ProximityTier::Immediate
        } else if distance_m <= self.thresholds.approaching_m {
            ProximityTier::Approaching
        } else {
            ProximityTier::Distant
        };

        if severity.escalates() { tier.promoted() } else { tier }
    }

    /// Processes a new position and returns clearing and warning events
    pub fn update_position(&mut self, point: &Coordinate, now: DateTime<Utc>) -> Vec<ProximityEvent> {
        if !self.monitoring {
            return Vec::new();
        }

        let expired: Vec<String> = self
            .candidates
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id.clone())
            .collect();
        for id in expired {
            debug!("{:?} candidate {} expired", self.kind, id);
            self.candidates.remove(&id);
        }

        let mut events = Vec::new();

        // Clear warned candidates that left their radius or disappeared
        let cleared: Vec<(String, f64)> = self
            .warned
            .iter()
            .filter_map(|(id, record)| match self.candidates.get(id) {
                None => Some((id.clone(), record.distance_m)),
                Some(candidate) => {
                    let d = geometry::distance(point, &candidate.coordinate);
                    (d > candidate.radius_m).then(|| (id.clone(), d))
                }
            })
            .collect();
        for (id, distance_m) in cleared {
            self.warned.remove(&id);
            events.push(ProximityEvent {
                kind: self.kind,
                candidate_id: id,
                distance_m,
                signal: ProximitySignal::Cleared,
                timestamp: now,
            });
        }

        let nearest = self
            .candidates
            .values()
            .map(|c| (c, geometry::distance(point, &c.coordinate)))
            .filter(|(c, d)| *d <= c.radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, d)| (c.id.clone(), c.severity, d));

        if let Some((id, severity, distance_m)) = nearest {
            let tier = self.classify(distance_m, severity);
            let emit = match self.warned.get(&id) {
                None => true,
                Some(record) if tier > record.tier => true,
                Some(record) => now - record.at >= self.throttle,
            };

            if emit {
                self.warned.insert(id.clone(), WarningRecord { tier, at: now, distance_m });
                events.push(ProximityEvent {
                    kind: self.kind,
                    candidate_id: id,
                    distance_m,
                    signal: ProximitySignal::Warning(tier),
                    timestamp: now,
                });
            } else if let Some(record) = self.warned.get_mut(&id) {
                record.distance_m = distance_m;
            }
        }

        events
    }
}

impl CandidateStore for ProximityEngine {
    fn add(&mut self, mut candidate: ProximityCandidate) {
        if !(candidate.radius_m > 0.0) {
            candidate.radius_m = self.default_radius_m;
        }
        self.candidates.insert(candidate.id.clone(), candidate);
    }

    fn remove(&mut self, id: &str) -> Option<ProximityCandidate> {
        self.candidates.remove(id)
    }

    fn query_radius(&self, center: &Coordinate, radius_m: f64) -> Vec<ProximityCandidate> {
        self.candidates
            .values()
            .filter(|c| geometry::distance(center, &c.coordinate) <= radius_m)
            .cloned()
            .collect()
    }
}
