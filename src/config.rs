// src/config.rs
//! Runtime configuration for a navigation session, loadable from YAML.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use std::time::Duration;

/// Who the session is guiding. Selects default thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationProfile {
    /// Sighted walker: loose deviation threshold, short turn lead
    Sighted,
    /// Low-vision walker
    #[default]
    LowVision,
    /// Blind walker: tight deviation threshold, early turn warnings
    Blind,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Profile the defaults were derived from
    pub profile: NavigationProfile,
    /// Route progress tracking
    pub tracker: TrackerSettings,
    /// Turn announcements
    pub turns: TurnSettings,
    /// Street-crossing proximity
    pub crossings: ProximitySettings,
    /// Hazard proximity
    pub hazards: ProximitySettings,
    /// Rerouting policy
    pub reroute: RerouteSettings,
    /// Arrival detection
    pub arrival: ArrivalSettings,
    /// Location acquisition
    pub location: LocationSettings,
}

/// Route progress tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Deviation above which a sample counts as off-route, meters
    pub deviation_threshold_m: f64,
    /// Samples averaged for the smoothed position (1..=5)
    pub smoothing_window: usize,
    /// Consecutive in-tolerance samples needed to flip back on-route
    pub on_route_confirmations: u32,
    /// Consecutive out-of-tolerance samples needed to flip off-route
    pub off_route_confirmations: u32,
    /// Speeds at or below this are ignored for ETA, m/s
    pub min_informative_speed_mps: f64,
}

/// Turn notification distances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnSettings {
    /// First warning distance; also the turn influence radius, meters
    pub early_warning_m: f64,
    /// "Approaching" tier distance, meters
    pub approaching_m: f64,
    /// "At turn" tier distance, meters
    pub at_turn_m: f64,
    /// Minimum interval between repeats of the same turn, seconds
    pub throttle_secs: f64,
}

/// Crossing/hazard engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    /// Influence radius for candidates added without one, meters
    pub default_radius_m: f64,
    /// Distance at or below which the tier is "approaching", meters
    pub approaching_m: f64,
    /// Distance at or below which the tier is "immediate", meters
    pub immediate_m: f64,
    /// Minimum interval between repeats for one candidate, seconds
    pub throttle_secs: f64,
}

/// Rerouting policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerouteSettings {
    /// Reroute once deviation exceeds this multiple of the tracker threshold
    pub deviation_multiplier: f64,
    /// Minimum time between reroute attempts, seconds
    pub cooldown_secs: f64,
    /// Routing request timeout, seconds
    pub timeout_secs: f64,
    /// Radius of the avoid area placed around the user on a detour, meters
    pub detour_avoid_radius_m: f64,
}

/// Arrival detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrivalSettings {
    /// Distance to destination that counts as arrived, meters
    pub threshold_m: f64,
    /// Time positions keep flowing after arrival before going idle, seconds
    pub grace_secs: f64,
}

/// Location acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    /// Timeout for a single fix, seconds
    pub fix_timeout_secs: f64,
    /// Maximum age of a last-known fix used as fallback, seconds
    pub freshness_secs: f64,
    /// Retry schedule for fix acquisition
    pub retry: RetrySettings,
    /// Capacity of the inbound position queue
    pub feed_capacity: usize,
}

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, milliseconds
    pub initial_delay_ms: u64,
    /// Growth factor between delays
    pub multiplier: f64,
    /// Upper bound for a single delay, milliseconds
    pub max_delay_ms: u64,
}

impl NavigatorConfig {
    /// Defaults tuned for a profile
    pub fn for_profile(profile: NavigationProfile) -> Self {
        let (deviation, turns) = match profile {
            NavigationProfile::Sighted => (25.0, (60.0, 30.0, 10.0)),
            NavigationProfile::LowVision => (20.0, (100.0, 50.0, 15.0)),
            NavigationProfile::Blind => (10.0, (100.0, 50.0, 15.0)),
        };

        NavigatorConfig {
            profile,
            tracker: TrackerSettings {
                deviation_threshold_m: deviation,
                ..TrackerSettings::default()
            },
            turns: TurnSettings {
                early_warning_m: turns.0,
                approaching_m: turns.1,
                at_turn_m: turns.2,
                ..TurnSettings::default()
            },
            crossings: ProximitySettings::crossings(),
            hazards: ProximitySettings::hazards(),
            reroute: RerouteSettings::default(),
            arrival: ArrivalSettings::default(),
            location: LocationSettings::default(),
        }
    }

    /// Reads and validates a YAML config file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_file = std::fs::File::open(path)?;
        let overrides: Value = serde_yaml::from_reader(config_file)?;
        NavigatorConfig::from_yaml_value(overrides)
    }

    /// Parses and validates YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_yaml::from_str(yaml)?;
        NavigatorConfig::from_yaml_value(overrides)
    }

    // Keys missing from the document take the selected profile's defaults
    fn from_yaml_value(overrides: Value) -> Result<Self, ConfigError> {
        let profile: NavigationProfile = match overrides.get("profile") {
            Some(profile) => serde_yaml::from_value(profile.clone())?,
            None => NavigationProfile::default(),
        };

        let mut merged = serde_yaml::to_value(NavigatorConfig::for_profile(profile))?;
        merge_yaml(&mut merged, overrides);
        let config: NavigatorConfig = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges and ordering of every threshold
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tracker;
        positive("tracker.deviation_threshold_m", t.deviation_threshold_m)?;
        if !(1..=5).contains(&t.smoothing_window) {
            return Err(ConfigError::Invalid(format!(
                "tracker.smoothing_window must be within 1..=5, got {}",
                t.smoothing_window
            )));
        }
        if t.on_route_confirmations == 0 || t.off_route_confirmations == 0 {
            return Err(ConfigError::Invalid(
                "tracker confirmations must be at least 1".to_string(),
            ));
        }

        let turns = &self.turns;
        positive("turns.at_turn_m", turns.at_turn_m)?;
        ordered("turns", turns.at_turn_m, turns.approaching_m, turns.early_warning_m)?;
        non_negative("turns.throttle_secs", turns.throttle_secs)?;

        for (name, p) in [("crossings", &self.crossings), ("hazards", &self.hazards)] {
            positive(name, p.immediate_m)?;
            ordered(name, p.immediate_m, p.approaching_m, p.default_radius_m)?;
            non_negative(name, p.throttle_secs)?;
        }

        if !(self.reroute.deviation_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(
                "reroute.deviation_multiplier must be at least 1".to_string(),
            ));
        }
        non_negative("reroute.cooldown_secs", self.reroute.cooldown_secs)?;
        positive("reroute.timeout_secs", self.reroute.timeout_secs)?;
        positive("arrival.threshold_m", self.arrival.threshold_m)?;
        non_negative("arrival.grace_secs", self.arrival.grace_secs)?;
        positive("location.fix_timeout_secs", self.location.fix_timeout_secs)?;
        non_negative("location.freshness_secs", self.location.freshness_secs)?;
        if self.location.feed_capacity == 0 {
            return Err(ConfigError::Invalid(
                "location.feed_capacity must be at least 1".to_string(),
            ));
        }
        if self.location.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "location.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        NavigatorConfig::for_profile(NavigationProfile::default())
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            deviation_threshold_m: 20.0,
            smoothing_window: 5,
            on_route_confirmations: 2,
            off_route_confirmations: 3,
            min_informative_speed_mps: 0.1,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        TurnSettings {
            early_warning_m: 100.0,
            approaching_m: 50.0,
            at_turn_m: 15.0,
            throttle_secs: 10.0,
        }
    }
}

impl ProximitySettings {
    /// Street-crossing defaults
    pub fn crossings() -> Self {
        ProximitySettings {
            default_radius_m: 30.0,
            approaching_m: 15.0,
            immediate_m: 5.0,
            throttle_secs: 30.0,
        }
    }

    /// Hazard defaults
    pub fn hazards() -> Self {
        ProximitySettings {
            default_radius_m: 50.0,
            approaching_m: 25.0,
            immediate_m: 10.0,
            throttle_secs: 60.0,
        }
    }

    /// Throttle interval as a chrono duration
    pub fn throttle(&self) -> chrono::Duration {
        secs_to_chrono(self.throttle_secs)
    }
}

impl Default for ProximitySettings {
    fn default() -> Self {
        ProximitySettings::crossings()
    }
}

impl TurnSettings {
    /// Throttle interval as a chrono duration
    pub fn throttle(&self) -> chrono::Duration {
        secs_to_chrono(self.throttle_secs)
    }
}

impl Default for RerouteSettings {
    fn default() -> Self {
        RerouteSettings {
            deviation_multiplier: 2.0,
            cooldown_secs: 30.0,
            timeout_secs: 15.0,
            detour_avoid_radius_m: 50.0,
        }
    }
}

impl RerouteSettings {
    /// Cool-down as a chrono duration (compared against sample time)
    pub fn cooldown(&self) -> chrono::Duration {
        secs_to_chrono(self.cooldown_secs)
    }

    /// Request timeout as a wall-clock duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for ArrivalSettings {
    fn default() -> Self {
        ArrivalSettings {
            threshold_m: 15.0,
            grace_secs: 5.0,
        }
    }
}

impl ArrivalSettings {
    /// Grace window as a chrono duration
    pub fn grace(&self) -> chrono::Duration {
        secs_to_chrono(self.grace_secs)
    }
}

impl Default for LocationSettings {
    fn default() -> Self {
        LocationSettings {
            fix_timeout_secs: 10.0,
            freshness_secs: 300.0,
            retry: RetrySettings::default(),
            feed_capacity: 4,
        }
    }
}

impl LocationSettings {
    /// Single-fix timeout
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fix_timeout_secs)
    }

    /// Maximum age of a fallback fix
    pub fn freshness(&self) -> chrono::Duration {
        secs_to_chrono(self.freshness_secs)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 5_000,
        }
    }
}

fn merge_yaml(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Mapping(base), Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        // empty document or empty section
        (_, Value::Null) => {}
        (base, value) => *base = value,
    }
}

fn secs_to_chrono(secs: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must not be negative, got {}", name, value)))
    }
}

fn ordered(name: &str, near: f64, mid: f64, far: f64) -> Result<(), ConfigError> {
    if near < mid && mid <= far {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} thresholds must increase outwards ({} < {} <= {})",
            name, near, mid, far
        )))
    }
}
