//! Navigation session for PathSense
//!
//! `NavigationSession` owns one walk from start to arrival. It consumes
//! position samples, keeps the route tracker, turn monitor and crossing/hazard
//! engines in step, decides when to reroute, and publishes everything that
//! happens as `NavigationEvent`s.
//!
//! The session is single-threaded: every mutation happens inside a method call
//! on `&mut self`. Location samples arrive on a bounded queue drained by
//! `pump`, and reroute results come back from a worker thread and are picked
//! up on the next call, so no event is ever published from another thread.
//!
//! Each accepted sample is processed in a fixed order: tracker, position and
//! deviation events, arrival check, turns, crossings and hazards, then the
//! reroute rule.

pub mod events;
pub mod reroute;
pub mod state;

pub use events::{EventBus, NavigationEvent};
pub use reroute::RerouteWorker;
pub use state::{EmergencyAction, EmergencyKind, NavigationState};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NavigatorConfig;
use crate::core::geometry::{self, Coordinate};
use crate::core::route::{AvoidArea, PositionSample, RoutePlan};
use crate::core::tracker::{RouteProgressTracker, TrackingState};
use crate::error::{NavigationError, Result, RoutingError};
use crate::proximity::store::CandidateStore;
use crate::proximity::turns::TurnMonitor;
use crate::proximity::{ProximityCandidate, ProximityEngine, ProximityEvent, ProximityKind, ProximitySignal};
use crate::providers::{LocationProvider, LocationService, PositionSender, RoutingProvider, position_feed};

/// Deviation changes smaller than this are not reported, meters
const DEVIATION_REPORT_STEP_M: f64 = 1.0;

/// One navigation from start to arrival
pub struct NavigationSession {
    config: NavigatorConfig,
    state: NavigationState,
    tracker: RouteProgressTracker,
    turns: TurnMonitor,
    crossings: ProximityEngine,
    hazards: ProximityEngine,
    reroute: RerouteWorker,
    location: LocationService,
    feed_tx: PositionSender,
    feed_rx: Receiver<PositionSample>,
    events: EventBus,
    // newest sample received while a reroute was in flight
    pending_sample: Option<PositionSample>,
    arrived_at: Option<DateTime<Utc>>,
    last_reported_deviation: Option<f64>,
    // sample clock anchor: (sample time, wall instant it was accepted)
    last_sample: Option<(DateTime<Utc>, Instant)>,
}

impl NavigationSession {
    /// Builds an idle session. Fails if `config` does not validate.
    pub fn new(
        config: NavigatorConfig,
        location: Box<dyn LocationProvider>,
        routing: Arc<dyn RoutingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let (feed_tx, feed_rx) = position_feed(config.location.feed_capacity);

        info!("Navigation session created ({:?} profile)", config.profile);
        Ok(NavigationSession {
            tracker: RouteProgressTracker::new(config.tracker.clone()),
            turns: TurnMonitor::new(&config.turns),
            crossings: ProximityEngine::new(ProximityKind::Crossing, &config.crossings),
            hazards: ProximityEngine::new(ProximityKind::Hazard, &config.hazards),
            reroute: RerouteWorker::new(routing, config.reroute.clone()),
            location: LocationService::new(location, config.location.clone()),
            feed_tx,
            feed_rx,
            events: EventBus::new(),
            state: NavigationState::Idle,
            pending_sample: None,
            arrived_at: None,
            last_reported_deviation: None,
            last_sample: None,
            config,
        })
    }

    /// Receiver for events published from now on
    pub fn subscribe(&mut self) -> Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Latest tracking snapshot
    pub fn tracking(&self) -> &TrackingState {
        self.tracker.state()
    }

    /// Active route plan
    pub fn route(&self) -> Option<&RoutePlan> {
        self.tracker.route()
    }

    /// Configuration in use
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Whether a reroute request is outstanding
    pub fn is_rerouting(&self) -> bool {
        self.reroute.is_in_flight()
    }

    /// Starts following `plan`. A session that is not idle is stopped first.
    ///
    /// If the location provider cannot be started the session keeps the plan
    /// and enters `Error`; `resume` retries the subscription.
    pub fn start_navigation(&mut self, plan: RoutePlan) -> Result<()> {
        plan.validate()?;
        if self.state != NavigationState::Idle {
            info!("Replacing the running session ({})", self.state);
            self.stop_navigation();
        }

        self.tracker.start_tracking(plan)?;
        if let Some(route) = self.tracker.route() {
            self.turns.start_monitoring(route);
        }
        self.crossings.start_monitoring(None);
        self.hazards.start_monitoring(None);

        match self.location.start(self.feed_tx.clone()) {
            Ok(()) => self.set_state(NavigationState::Active),
            Err(err) => {
                error!("Location unavailable at start: {}", err);
                self.emit(NavigationEvent::Error(format!("Location unavailable: {}", err)));
                self.set_state(NavigationState::Error(err.to_string()));
            }
        }
        Ok(())
    }

    /// Ends the session and releases every resource. Idempotent.
    pub fn stop_navigation(&mut self) {
        self.reroute.reset();
        self.location.stop();
        self.drain_feed();
        self.tracker.stop_tracking();
        self.turns.stop_monitoring();
        self.crossings.stop_monitoring();
        self.hazards.stop_monitoring();
        self.pending_sample = None;
        self.arrived_at = None;
        self.last_reported_deviation = None;
        self.last_sample = None;
        self.set_state(NavigationState::Idle);
    }

    /// Stops consuming positions but keeps the plan
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            NavigationState::Active => {}
            NavigationState::Paused => return Ok(()),
            ref other => {
                return Err(NavigationError::InvalidTransition {
                    from: other.name().to_string(),
                    action: "pause",
                });
            }
        }
        self.enter_paused();
        Ok(())
    }

    /// Resumes a paused session, or retries the location subscription after
    /// an `Error`
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            NavigationState::Paused | NavigationState::Error(_) => {}
            NavigationState::Active => return Ok(()),
            ref other => {
                return Err(NavigationError::InvalidTransition {
                    from: other.name().to_string(),
                    action: "resume",
                });
            }
        }
        if !self.tracker.is_tracking() {
            return Err(NavigationError::NotTracking);
        }

        match self.location.start(self.feed_tx.clone()) {
            Ok(()) => {
                self.set_state(NavigationState::Active);
                Ok(())
            }
            Err(err) => {
                warn!("Resume failed: {}", err);
                self.emit(NavigationEvent::Error(format!("Location unavailable: {}", err)));
                self.set_state(NavigationState::Error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Drains queued location samples and processes them, then advances
    /// timers. Returns the number of samples drained.
    pub fn pump(&mut self) -> usize {
        let samples: Vec<PositionSample> = self.feed_rx.try_iter().collect();
        let drained = samples.len();
        for sample in samples {
            if let Err(err) = self.update_position(sample) {
                warn!("Sample rejected: {}", err);
            }
        }
        let now = self.clock();
        self.tick(now);
        drained
    }

    /// Processes one position sample.
    ///
    /// Samples are ignored unless the session is active; during a reroute the
    /// newest one is held back and applied once the new plan is in place.
    /// Invalid or out-of-order samples are rejected with an error and leave
    /// the session unchanged.
    pub fn update_position(&mut self, sample: PositionSample) -> Result<()> {
        self.poll_reroute();

        match self.state {
            NavigationState::Active => self.process_sample(sample),
            NavigationState::Rerouting | NavigationState::Emergency { .. } if self.reroute.is_in_flight() => {
                if self
                    .pending_sample
                    .is_none_or(|pending| pending.timestamp <= sample.timestamp)
                {
                    self.pending_sample = Some(sample);
                }
                debug!("Sample held until the reroute completes");
                Ok(())
            }
            NavigationState::Arrived => {
                self.location.remember(sample);
                self.emit(NavigationEvent::PositionUpdated(sample.coordinate));
                self.tick(sample.timestamp);
                Ok(())
            }
            ref other => {
                debug!("Sample ignored while {}", other);
                Ok(())
            }
        }
    }

    /// Advances time-based behavior: collects a finished reroute and ends the
    /// arrival grace window.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.poll_reroute();

        if self.state == NavigationState::Arrived {
            if let Some(arrived_at) = self.arrived_at {
                if now - arrived_at >= self.config.arrival.grace() {
                    info!("Arrival grace elapsed, ending session");
                    self.stop_navigation();
                }
            }
        }
    }

    /// Blocks up to `limit` for an outstanding reroute and applies it.
    /// Returns true if a reroute finished.
    pub fn await_reroute(&mut self, limit: Duration) -> bool {
        match self.reroute.wait(limit) {
            Some(outcome) => {
                self.finish_reroute(outcome);
                true
            }
            None => false,
        }
    }

    /// Raises an emergency. Returns false if it was ignored because a
    /// higher-priority emergency is in progress.
    pub fn trigger_emergency(&mut self, kind: EmergencyKind, action: EmergencyAction) -> bool {
        if let NavigationState::Emergency { kind: current, .. } = self.state {
            if kind.priority() < current.priority() {
                info!("Emergency {:?} ignored while handling {:?}", kind, current);
                return false;
            }
        }

        warn!("Emergency {:?}: {:?}", kind, action);
        self.emit(NavigationEvent::EmergencyRaised { kind, action });

        let following = self.tracker.is_tracking()
            && !matches!(self.state, NavigationState::Idle | NavigationState::Arrived);

        match action {
            EmergencyAction::AlertUser | EmergencyAction::SlowDown => {}
            EmergencyAction::Stop => {
                self.set_state(NavigationState::Emergency { kind, action });
                self.stop_navigation();
            }
            EmergencyAction::Pause if following => {
                self.set_state(NavigationState::Emergency { kind, action });
                self.reroute.cancel();
                self.pending_sample = None;
                self.enter_paused();
            }
            EmergencyAction::Reroute | EmergencyAction::Detour if following => {
                self.emergency_reroute(kind, action);
            }
            EmergencyAction::Pause | EmergencyAction::Reroute | EmergencyAction::Detour => {
                debug!("No route is being followed; {:?} ends the session", action);
                self.stop_navigation();
            }
        }
        true
    }

    /// Adds a crossing to watch
    pub fn add_crossing(&mut self, candidate: ProximityCandidate) {
        self.crossings.add(candidate);
    }

    /// Adds a hazard to watch
    pub fn add_hazard(&mut self, candidate: ProximityCandidate) {
        self.hazards.add(candidate);
    }

    /// Removes a crossing or hazard by id
    pub fn remove_candidate(&mut self, kind: ProximityKind, id: &str) -> Option<ProximityCandidate> {
        self.engine_mut(kind)?.remove(id)
    }

    /// Loads candidates of `kind` within `radius_m` of `center` from a store.
    /// Returns how many were loaded.
    pub fn load_candidates(
        &mut self,
        kind: ProximityKind,
        store: &dyn CandidateStore,
        center: &Coordinate,
        radius_m: f64,
    ) -> usize {
        self.engine_mut(kind)
            .map_or(0, |engine| engine.load_from(store, center, radius_m))
    }

    fn engine_mut(&mut self, kind: ProximityKind) -> Option<&mut ProximityEngine> {
        match kind {
            ProximityKind::Crossing => Some(&mut self.crossings),
            ProximityKind::Hazard => Some(&mut self.hazards),
            ProximityKind::Turn => None,
        }
    }

    /// Stops navigation and closes the event stream
    pub fn dispose(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.events.is_closed() {
            return;
        }
        self.stop_navigation();
        self.events.close();
        info!("Navigation session disposed");
    }

    fn process_sample(&mut self, sample: PositionSample) -> Result<()> {
        let tracking = self.tracker.update_position(&sample)?;
        let now = sample.timestamp;
        let position = sample.coordinate;
        self.location.remember(sample);
        self.last_sample = Some((now, Instant::now()));

        self.emit(NavigationEvent::PositionUpdated(position));
        if self
            .last_reported_deviation
            .is_none_or(|previous| (previous - tracking.deviation_m).abs() >= DEVIATION_REPORT_STEP_M)
        {
            self.last_reported_deviation = Some(tracking.deviation_m);
            self.emit(NavigationEvent::DeviationChanged(tracking.deviation_m));
        }

        if let Some(destination) = self.tracker.route().map(|plan| plan.destination) {
            if geometry::distance(&position, &destination) <= self.config.arrival.threshold_m {
                self.enter_arrived(destination, now);
                return Ok(());
            }
        }

        self.turns.retire_passed(tracking.next_turn_index);
        for turn in self.turns.update_position(&position, now) {
            self.emit(NavigationEvent::UpcomingTurn {
                step_index: turn.step_index,
                step: turn.step,
                tier: turn.tier,
                distance_m: turn.distance_m,
            });
        }

        let mut nearby = self.crossings.update_position(&position, now);
        nearby.extend(self.hazards.update_position(&position, now));
        for event in nearby {
            self.emit(proximity_event(event));
        }

        if self
            .reroute
            .should_reroute(&tracking, self.config.tracker.deviation_threshold_m, now)
        {
            self.begin_reroute(position, Vec::new(), now, NavigationState::Rerouting);
        }
        Ok(())
    }

    fn enter_arrived(&mut self, destination: Coordinate, now: DateTime<Utc>) {
        self.tracker.mark_arrived();
        self.turns.stop_monitoring();
        self.crossings.stop_monitoring();
        self.hazards.stop_monitoring();
        self.reroute.cancel();
        self.arrived_at = Some(now);
        info!("Destination reached");
        self.set_state(NavigationState::Arrived);
        self.emit(NavigationEvent::DestinationReached(destination));
    }

    fn enter_paused(&mut self) {
        self.location.stop();
        self.drain_feed();
        self.set_state(NavigationState::Paused);
    }

    fn emergency_reroute(&mut self, kind: EmergencyKind, action: EmergencyAction) {
        let waiting = NavigationState::Emergency { kind, action };
        if action == EmergencyAction::Reroute && self.reroute.is_in_flight() {
            info!("Emergency reroute adopts the request already in flight");
            self.set_state(waiting);
            return;
        }

        let now = self.clock();
        let origin = match self.current_position(now) {
            Some(origin) => origin,
            None => {
                error!("Emergency reroute impossible: no position fix");
                self.emit(NavigationEvent::Error(
                    "Cannot reroute without a position fix".to_string(),
                ));
                self.set_state(NavigationState::Error("no position fix".to_string()));
                return;
            }
        };

        let avoid = match action {
            EmergencyAction::Detour => vec![AvoidArea {
                center: origin,
                radius_m: self.config.reroute.detour_avoid_radius_m,
            }],
            _ => Vec::new(),
        };
        // forced: cool-down does not apply. A running request knows nothing of
        // the detour area, so it is closed out before the new one starts.
        if self.reroute.is_in_flight() {
            self.reroute.cancel();
            self.emit(NavigationEvent::ReroutingFinished { success: false });
        }
        self.begin_reroute(origin, avoid, now, waiting);
    }

    fn current_position(&mut self, now: DateTime<Utc>) -> Option<Coordinate> {
        if let Some(position) = self.tracker.state().raw_position {
            return Some(position);
        }
        match self.location.acquire_fix(now) {
            Ok(sample) => Some(sample.coordinate),
            Err(err) => {
                warn!("No position fix: {}", err);
                None
            }
        }
    }

    fn begin_reroute(
        &mut self,
        origin: Coordinate,
        avoid_areas: Vec<AvoidArea>,
        now: DateTime<Utc>,
        waiting_state: NavigationState,
    ) {
        let Some(destination) = self.tracker.route().map(|plan| plan.destination) else {
            return;
        };
        self.reroute.begin(origin, destination, avoid_areas, now);
        self.set_state(waiting_state);
        self.emit(NavigationEvent::ReroutingStarted);
    }

    fn poll_reroute(&mut self) {
        if let Some(outcome) = self.reroute.poll() {
            self.finish_reroute(outcome);
        }
    }

    fn finish_reroute(&mut self, outcome: std::result::Result<RoutePlan, RoutingError>) {
        let success = match outcome {
            Ok(plan) => match self.tracker.replace_route(plan) {
                Ok(()) => {
                    if let Some(route) = self.tracker.route() {
                        self.turns.start_monitoring(route);
                    }
                    self.last_reported_deviation = None;
                    true
                }
                Err(err) => {
                    warn!("Routing provider returned an unusable plan: {}", err);
                    self.emit(NavigationEvent::Error(format!("Rerouting failed: {}", err)));
                    false
                }
            },
            Err(err) => {
                self.emit(NavigationEvent::Error(format!("Rerouting failed: {}", err)));
                false
            }
        };
        self.emit(NavigationEvent::ReroutingFinished { success });

        if !matches!(
            self.state,
            NavigationState::Rerouting | NavigationState::Emergency { .. }
        ) {
            return;
        }

        if let Err(err) = self.location.start(self.feed_tx.clone()) {
            error!("Location unavailable after reroute: {}", err);
            self.emit(NavigationEvent::Error(format!("Location unavailable: {}", err)));
            self.set_state(NavigationState::Error(err.to_string()));
            return;
        }
        self.set_state(NavigationState::Active);

        if let Some(sample) = self.pending_sample.take() {
            if let Err(err) = self.process_sample(sample) {
                debug!("Held sample rejected: {}", err);
            }
        }
    }

    fn drain_feed(&mut self) {
        let dropped = self.feed_rx.try_iter().count();
        if dropped > 0 {
            debug!("Discarded {} queued samples", dropped);
        }
    }

    // sample time advanced by wall time since that sample was accepted
    fn clock(&self) -> DateTime<Utc> {
        match self.last_sample {
            Some((at, received)) => {
                at + ChronoDuration::from_std(received.elapsed()).unwrap_or_else(|_| ChronoDuration::zero())
            }
            None => Utc::now(),
        }
    }

    fn set_state(&mut self, next: NavigationState) {
        if self.state == next {
            return;
        }
        info!("Navigation state: {} -> {}", self.state, next);
        self.state = next.clone();
        self.emit(NavigationEvent::StatusChanged(next));
    }

    fn emit(&mut self, event: NavigationEvent) {
        self.events.publish(event);
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn proximity_event(event: ProximityEvent) -> NavigationEvent {
    match event.signal {
        ProximitySignal::Warning(tier) => NavigationEvent::ProximityWarning {
            kind: event.kind,
            candidate_id: event.candidate_id,
            distance_m: event.distance_m,
            tier,
        },
        ProximitySignal::Cleared => NavigationEvent::ProximityCleared {
            kind: event.kind,
            candidate_id: event.candidate_id,
        },
    }
}
