// navigation/reroute.rs

//! Background route requests. At most one request is in flight; it runs on its
//! own thread and hands the result back over a channel that the session polls.
//! Cancelling drops the receiving end, so a late result is simply discarded.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RerouteSettings;
use crate::core::geometry::{self, Coordinate};
use crate::core::route::{AvoidArea, RoutePlan};
use crate::core::tracker::TrackingState;
use crate::error::RoutingError;
use crate::providers::RoutingProvider;

type RouteResult = Result<RoutePlan, RoutingError>;

struct InFlight {
    request: u64,
    started: Instant,
    rx: Receiver<RouteResult>,
}

/// Runs reroute requests against a routing provider
pub struct RerouteWorker {
    provider: Arc<dyn RoutingProvider>,
    settings: RerouteSettings,
    requests: u64,
    in_flight: Option<InFlight>,
    last_attempt: Option<DateTime<Utc>>,
}

impl RerouteWorker {
    /// Creates an idle worker
    pub fn new(provider: Arc<dyn RoutingProvider>, settings: RerouteSettings) -> Self {
        RerouteWorker {
            provider,
            settings,
            requests: 0,
            in_flight: None,
            last_attempt: None,
        }
    }

    /// Whether a request is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True once the cool-down since the last attempt has elapsed at `now`
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.last_attempt
            .is_none_or(|last| now - last >= self.settings.cooldown())
    }

    /// Automatic reroute rule: confirmed off-route, deviation beyond the
    /// multiplied threshold, nothing in flight and cool-down elapsed
    pub fn should_reroute(&self, tracking: &TrackingState, threshold_m: f64, now: DateTime<Utc>) -> bool {
        !tracking.is_on_route
            && tracking.deviation_m > self.settings.deviation_multiplier * threshold_m
            && !self.is_in_flight()
            && self.cooldown_elapsed(now)
    }

    /// Starts a request. Any request already in flight is abandoned.
    pub fn begin(
        &mut self,
        origin: Coordinate,
        destination: Coordinate,
        avoid_areas: Vec<AvoidArea>,
        now: DateTime<Utc>,
    ) {
        self.cancel();
        self.requests += 1;
        self.last_attempt = Some(now);

        let request = self.requests;
        info!(
            "Reroute request {} sent: {:.0} m to destination, {} avoid areas",
            request,
            geometry::distance(&origin, &destination),
            avoid_areas.len()
        );

        let provider = Arc::clone(&self.provider);
        let (tx, rx) = bounded(1);
        std::thread::spawn(move || {
            let result = provider.calculate_route(origin, destination, &avoid_areas);
            if tx.send(result).is_err() {
                debug!("Reroute request {} finished after being abandoned", request);
            }
        });

        self.in_flight = Some(InFlight {
            request,
            started: Instant::now(),
            rx,
        });
    }

    /// Non-blocking check for a finished request. Produces
    /// `RoutingError::Timeout` once the request outlives the configured
    /// timeout.
    pub fn poll(&mut self) -> Option<RouteResult> {
        let flight = self.in_flight.as_ref()?;
        let outcome = match flight.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) if flight.started.elapsed() >= self.settings.timeout() => {
                Err(RoutingError::Timeout)
            }
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(RoutingError::Unreachable("routing worker exited without a result".to_string()))
            }
        };
        self.finish(outcome)
    }

    /// Blocks up to `limit` for the outstanding request. Returns `None` when
    /// nothing is in flight or `limit` passed first.
    pub fn wait(&mut self, limit: Duration) -> Option<RouteResult> {
        let flight = self.in_flight.as_ref()?;
        let timeout_left = self.settings.timeout().saturating_sub(flight.started.elapsed());
        let budget = timeout_left.min(limit);

        let outcome = match flight.rx.recv_timeout(budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) if budget == timeout_left => Err(RoutingError::Timeout),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => {
                Err(RoutingError::Unreachable("routing worker exited without a result".to_string()))
            }
        };
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: RouteResult) -> Option<RouteResult> {
        let flight = self.in_flight.take()?;
        match &outcome {
            Ok(plan) => info!(
                "Reroute request {} succeeded after {:?}: {:.0} m",
                flight.request,
                flight.started.elapsed(),
                plan.total_distance_m
            ),
            Err(err) => warn!("Reroute request {} failed: {}", flight.request, err),
        }
        Some(outcome)
    }

    /// Abandons the outstanding request, if any
    pub fn cancel(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            info!("Reroute request {} cancelled", flight.request);
        }
    }

    /// Cancels and forgets the cool-down, for a fresh session
    pub fn reset(&mut self) {
        self.cancel();
        self.last_attempt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StraightLineRouter;
    use chrono::Duration as ChronoDuration;

    struct SlowRouter(Duration);

    impl RoutingProvider for SlowRouter {
        fn calculate_route(&self, origin: Coordinate, destination: Coordinate, _: &[AvoidArea]) -> RouteResult {
            std::thread::sleep(self.0);
            Ok(RoutePlan::straight_line(origin, destination, 1.4))
        }
    }

    fn off_route(deviation_m: f64) -> TrackingState {
        TrackingState {
            is_on_route: false,
            deviation_m,
            ..TrackingState::default()
        }
    }

    #[test]
    fn rule_needs_confirmed_large_deviation_and_cooldown() {
        let worker = RerouteWorker::new(Arc::new(StraightLineRouter::new(1.4)), RerouteSettings::default());
        let now = Utc::now();

        assert!(worker.should_reroute(&off_route(45.0), 20.0, now));
        assert!(!worker.should_reroute(&off_route(35.0), 20.0, now));

        let mut on_route = off_route(45.0);
        on_route.is_on_route = true;
        assert!(!worker.should_reroute(&on_route, 20.0, now));
    }

    #[test]
    fn cooldown_blocks_second_attempt() {
        let mut worker = RerouteWorker::new(Arc::new(StraightLineRouter::new(1.4)), RerouteSettings::default());
        let now = Utc::now();
        let origin = Coordinate::new(0.0, 0.0);
        worker.begin(origin, origin.offset_m(500.0, 0.0), Vec::new(), now);
        assert!(worker.wait(Duration::from_secs(5)).is_some_and(|r| r.is_ok()));

        assert!(!worker.should_reroute(&off_route(100.0), 20.0, now + ChronoDuration::seconds(10)));
        assert!(worker.should_reroute(&off_route(100.0), 20.0, now + ChronoDuration::seconds(30)));
    }

    #[test]
    fn slow_request_times_out() {
        let settings = RerouteSettings {
            timeout_secs: 0.05,
            ..RerouteSettings::default()
        };
        let mut worker = RerouteWorker::new(Arc::new(SlowRouter(Duration::from_millis(500))), settings);
        let origin = Coordinate::new(0.0, 0.0);
        worker.begin(origin, origin.offset_m(100.0, 0.0), Vec::new(), Utc::now());

        assert_eq!(worker.wait(Duration::from_secs(2)), Some(Err(RoutingError::Timeout)));
        assert!(!worker.is_in_flight());
    }

    #[test]
    fn cancelled_request_yields_nothing() {
        let mut worker = RerouteWorker::new(Arc::new(SlowRouter(Duration::from_millis(50))), RerouteSettings::default());
        let origin = Coordinate::new(0.0, 0.0);
        worker.begin(origin, origin.offset_m(100.0, 0.0), Vec::new(), Utc::now());
        worker.cancel();
        std::thread::sleep(Duration::from_millis(100));
        assert!(worker.poll().is_none());
    }
}
