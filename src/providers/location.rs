// providers/location.rs

//! Location input: the provider trait, the drop-oldest position feed it writes
//! into, and the service wrapper that adds fix timeouts, retries and a
//! last-known fallback.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{info, warn};

use super::retry::RetryPolicy;
use crate::config::LocationSettings;
use crate::core::route::PositionSample;
use crate::error::LocationError;

/// Platform location source
pub trait LocationProvider: Send {
    /// Begins delivering samples into `sink`
    fn start(&mut self, sink: PositionSender) -> Result<(), LocationError>;
    /// Stops delivering samples. Must be safe to call when not started.
    fn stop(&mut self);
    /// One-shot fix, waiting at most `timeout`
    fn current_fix(&mut self, timeout: std::time::Duration) -> Result<PositionSample, LocationError>;
}

/// Producer half of the inbound position queue.
///
/// When the queue is full the oldest sample is dropped; only the latest fix
/// matters.
#[derive(Debug, Clone)]
pub struct PositionSender {
    tx: Sender<PositionSample>,
    overflow: Receiver<PositionSample>,
}

impl PositionSender {
    /// Queues a sample, evicting the oldest one if needed
    pub fn offer(&self, sample: PositionSample) {
        let mut pending = sample;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    let _ = self.overflow.try_recv();
                    pending = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Creates a bounded position queue
pub fn position_feed(capacity: usize) -> (PositionSender, Receiver<PositionSample>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        PositionSender {
            tx,
            overflow: rx.clone(),
        },
        rx,
    )
}

/// Provider wrapper owned by the session
pub struct LocationService {
    provider: Box<dyn LocationProvider>,
    settings: LocationSettings,
    policy: RetryPolicy,
    last_known: Option<PositionSample>,
    subscribed: bool,
}

impl LocationService {
    /// Wraps a provider
    pub fn new(provider: Box<dyn LocationProvider>, settings: LocationSettings) -> Self {
        let policy = RetryPolicy::from(&settings.retry);
        LocationService {
            provider,
            settings,
            policy,
            last_known: None,
            subscribed: false,
        }
    }

    /// Subscribes the provider to `sink`, retrying transient failures per
    /// policy; no-op when already subscribed
    pub fn start(&mut self, sink: PositionSender) -> Result<(), LocationError> {
        if self.subscribed {
            return Ok(());
        }

        let mut last_error = LocationError::NoFix;
        for (attempt, delay) in self.policy.clone().delays().enumerate() {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match self.provider.start(sink.clone()) {
                Ok(()) => {
                    self.subscribed = true;
                    info!("Location subscription started");
                    return Ok(());
                }
                Err(err) => {
                    warn!("Location subscription attempt {} failed: {}", attempt + 1, err);
                    let retryable = err.is_retryable();
                    last_error = err;
                    if !retryable {
                        break;
                    }
                }
            }
        }
        Err(last_error)
    }

    /// Cancels the subscription; idempotent
    pub fn stop(&mut self) {
        if self.subscribed {
            self.provider.stop();
            self.subscribed = false;
            info!("Location subscription stopped");
        }
    }

    /// Records an accepted sample as the last known fix
    pub fn remember(&mut self, sample: PositionSample) {
        if self.last_known.is_none_or(|known| known.timestamp <= sample.timestamp) {
            self.last_known = Some(sample);
        }
    }

    /// Most recent fix seen
    pub fn last_known(&self) -> Option<PositionSample> {
        self.last_known
    }

    /// Obtains a fix, retrying per policy. Falls back to the last known fix
    /// when it is younger than the freshness window at `now`.
    pub fn acquire_fix(&mut self, now: DateTime<Utc>) -> Result<PositionSample, LocationError> {
        let timeout = self.settings.fix_timeout();
        let mut last_error = LocationError::NoFix;

        for (attempt, delay) in self.policy.clone().delays().enumerate() {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match self.provider.current_fix(timeout) {
                Ok(sample) => {
                    self.remember(sample);
                    return Ok(sample);
                }
                Err(err) => {
                    warn!("Position fix attempt {} failed: {}", attempt + 1, err);
                    let retryable = err.is_retryable();
                    last_error = err;
                    if !retryable {
                        break;
                    }
                }
            }
        }

        match self.last_known {
            Some(known) if now - known.timestamp <= self.settings.freshness() => {
                info!("Using last known fix from {}", known.timestamp);
                Ok(known)
            }
            _ => Err(last_error),
        }
    }
}

impl Drop for LocationService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrySettings;
    use crate::core::geometry::Coordinate;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(secs: i64) -> PositionSample {
        PositionSample::new(Coordinate::new(0.0, 0.0), at(secs))
    }

    // Replays scripted outcomes; once the script runs out starts succeed and
    // fixes are missing
    #[derive(Default)]
    struct ScriptedProvider {
        starts: VecDeque<LocationError>,
        start_calls: Arc<AtomicUsize>,
    }

    impl LocationProvider for ScriptedProvider {
        fn start(&mut self, _sink: PositionSender) -> Result<(), LocationError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            match self.starts.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn stop(&mut self) {}

        fn current_fix(&mut self, _timeout: std::time::Duration) -> Result<PositionSample, LocationError> {
            Err(LocationError::Timeout)
        }
    }

    fn quick_retries() -> LocationSettings {
        LocationSettings {
            retry: RetrySettings {
                max_attempts: 3,
                initial_delay_ms: 1,
                multiplier: 1.0,
                max_delay_ms: 1,
            },
            ..LocationSettings::default()
        }
    }

    #[test]
    fn transient_start_failure_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            starts: VecDeque::from([LocationError::Timeout]),
            start_calls: Arc::clone(&calls),
        };
        let mut service = LocationService::new(Box::new(provider), quick_retries());
        let (tx, _rx) = position_feed(2);

        assert!(service.start(tx.clone()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // already subscribed
        assert!(service.start(tx).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn permission_denied_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            starts: VecDeque::from([LocationError::PermissionDenied, LocationError::PermissionDenied]),
            start_calls: Arc::clone(&calls),
        };
        let mut service = LocationService::new(Box::new(provider), quick_retries());
        let (tx, _rx) = position_feed(2);

        assert_eq!(service.start(tx), Err(LocationError::PermissionDenied));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn acquire_fix_falls_back_to_fresh_last_known() {
        let mut service = LocationService::new(Box::new(ScriptedProvider::default()), quick_retries());
        assert_eq!(service.acquire_fix(at(0)), Err(LocationError::Timeout));

        service.remember(sample(0));
        assert_eq!(service.acquire_fix(at(100)), Ok(sample(0)));
        assert_eq!(service.acquire_fix(at(300)), Ok(sample(0)));
        assert_eq!(service.acquire_fix(at(301)), Err(LocationError::Timeout));
    }

    #[test]
    fn older_sample_does_not_replace_last_known() {
        let mut service = LocationService::new(Box::new(ScriptedProvider::default()), quick_retries());
        service.remember(sample(10));
        service.remember(sample(5));
        assert_eq!(service.last_known(), Some(sample(10)));
    }

    #[test]
    fn full_feed_drops_oldest() {
        let (tx, rx) = position_feed(2);
        tx.offer(sample(1));
        tx.offer(sample(2));
        tx.offer(sample(3));

        let queued: Vec<PositionSample> = rx.try_iter().collect();
        assert_eq!(queued, vec![sample(2), sample(3)]);
    }
}
