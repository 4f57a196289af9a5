// src/feedback.rs
//! Maps navigation events to abstract haptic/speech cues. Rendering the cue
//! (vibration motor, text-to-speech) happens behind `FeedbackSink`.

use crossbeam_channel::Receiver;
use log::{debug, info};
use serde::Serialize;

use crate::config::NavigationProfile;
use crate::navigation::{NavigationEvent, NavigationState};
use crate::proximity::{ProximityKind, ProximityTier};

/// Named vibration pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticPattern {
    /// One short pulse
    SinglePulse,
    /// Two short pulses
    DoublePulse,
    /// Three short pulses
    TriplePulse,
    /// One long vibration
    LongBuzz,
    /// Slow repeating double beat
    Heartbeat,
    /// Three short, three long, three short
    Sos,
}

/// What the user should feel and hear for one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackCue {
    /// Vibration pattern
    pub pattern: HapticPattern,
    /// Strength in [0, 1]
    pub intensity: f64,
    /// Text to speak, if any
    pub speech: Option<String>,
}

/// Event to cue table
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPolicy {
    speak: bool,
    intensity_scale: f64,
}

impl FeedbackPolicy {
    /// Policy tuned for a navigation profile. Sighted walkers get haptics
    /// only and softer pulses.
    pub fn for_profile(profile: NavigationProfile) -> Self {
        match profile {
            NavigationProfile::Sighted => FeedbackPolicy { speak: false, intensity_scale: 0.6 },
            NavigationProfile::LowVision => FeedbackPolicy { speak: true, intensity_scale: 0.8 },
            NavigationProfile::Blind => FeedbackPolicy { speak: true, intensity_scale: 1.0 },
        }
    }

    /// Cue for `event`, or `None` for events that stay silent
    pub fn cue_for(&self, event: &NavigationEvent) -> Option<FeedbackCue> {
        use HapticPattern::*;

        let (pattern, base, speech) = match event {
            NavigationEvent::UpcomingTurn { step, tier, distance_m, .. } => {
                let phrase = step.maneuver.phrase();
                match tier {
                    ProximityTier::Distant => (SinglePulse, 0.4, format!("In {:.0} meters, {}", distance_m, phrase)),
                    ProximityTier::Approaching => (DoublePulse, 0.7, format!("{} in {:.0} meters", capitalised(phrase), distance_m)),
                    ProximityTier::Immediate => (TriplePulse, 1.0, format!("{} now", capitalised(phrase))),
                }
            }
            NavigationEvent::ProximityWarning { kind: ProximityKind::Hazard, tier, distance_m, .. } => match tier {
                ProximityTier::Distant => (DoublePulse, 0.4, format!("Hazard in {:.0} meters", distance_m)),
                ProximityTier::Approaching => (LongBuzz, 0.7, format!("Hazard ahead, {:.0} meters", distance_m)),
                ProximityTier::Immediate => (LongBuzz, 1.0, "Hazard directly ahead".to_string()),
            },
            NavigationEvent::ProximityWarning { tier, distance_m, .. } => match tier {
                ProximityTier::Distant => (SinglePulse, 0.3, format!("Crossing in {:.0} meters", distance_m)),
                ProximityTier::Approaching => (DoublePulse, 0.6, "Crossing ahead".to_string()),
                ProximityTier::Immediate => (LongBuzz, 0.9, "At the crossing, stop and check traffic".to_string()),
            },
            NavigationEvent::DestinationReached(_) => (Heartbeat, 0.8, "You have arrived".to_string()),
            NavigationEvent::ReroutingStarted => (DoublePulse, 0.5, "Recalculating route".to_string()),
            NavigationEvent::ReroutingFinished { success: true } => (SinglePulse, 0.5, "New route ready".to_string()),
            NavigationEvent::ReroutingFinished { success: false } => {
                (LongBuzz, 0.6, "Could not find a new route".to_string())
            }
            NavigationEvent::EmergencyRaised { kind, .. } => {
                // never scaled down, always spoken
                return Some(FeedbackCue {
                    pattern: Sos,
                    intensity: 1.0,
                    speech: Some(format!("Emergency: {:?}", kind)),
                });
            }
            NavigationEvent::StatusChanged(NavigationState::Paused) => {
                (SinglePulse, 0.3, "Navigation paused".to_string())
            }
            NavigationEvent::Error(message) => (LongBuzz, 0.6, message.clone()),
            NavigationEvent::StatusChanged(_)
            | NavigationEvent::PositionUpdated(_)
            | NavigationEvent::DeviationChanged(_)
            | NavigationEvent::ProximityCleared { .. } => return None,
        };

        Some(FeedbackCue {
            pattern,
            intensity: (base * self.intensity_scale).clamp(0.0, 1.0),
            speech: self.speak.then_some(speech),
        })
    }
}

impl Default for FeedbackPolicy {
    fn default() -> Self {
        FeedbackPolicy::for_profile(NavigationProfile::default())
    }
}

fn capitalised(phrase: &str) -> String {
    let mut chars = phrase.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders cues on the device
pub trait FeedbackSink {
    /// Plays one cue
    fn render(&mut self, cue: &FeedbackCue);
}

/// Sink that only logs cues
#[derive(Debug, Default)]
pub struct LogFeedbackSink;

impl FeedbackSink for LogFeedbackSink {
    fn render(&mut self, cue: &FeedbackCue) {
        match &cue.speech {
            Some(text) => info!("[{:?} @ {:.2}] {}", cue.pattern, cue.intensity, text),
            None => info!("[{:?} @ {:.2}]", cue.pattern, cue.intensity),
        }
    }
}

/// Drains a session's event receiver into a sink
pub struct FeedbackDispatcher<S: FeedbackSink> {
    policy: FeedbackPolicy,
    sink: S,
    events: Receiver<NavigationEvent>,
}

impl<S: FeedbackSink> FeedbackDispatcher<S> {
    /// Dispatcher reading from `events`
    pub fn new(policy: FeedbackPolicy, sink: S, events: Receiver<NavigationEvent>) -> Self {
        FeedbackDispatcher { policy, sink, events }
    }

    /// Renders cues for every queued event. Returns the number of cues.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut rendered = 0;
        while let Ok(event) = self.events.try_recv() {
            rendered += self.dispatch(&event);
        }
        rendered
    }

    /// Blocks until the event stream closes, rendering as events arrive
    pub fn run(mut self) -> S {
        while let Ok(event) = self.events.recv() {
            self.dispatch(&event);
        }
        debug!("Event stream closed, feedback dispatcher exiting");
        self.sink
    }

    /// Sink in use
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn dispatch(&mut self, event: &NavigationEvent) -> usize {
        match self.policy.cue_for(event) {
            Some(cue) => {
                self.sink.render(&cue);
                1
            }
            None => 0,
        }
    }
}
