//! Error types for PathSense
//!
//! Invariant violations (bad plans, bad configuration) are rejected with these
//! errors at the API boundary. Provider failures are recoverable: the session
//! logs them and surfaces them as `NavigationEvent::Error`.

use thiserror::Error;

/// Top-level error for tracker and session operations
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Route plan is empty or malformed
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Position sample carries an invalid coordinate
    #[error("Invalid position sample: {0}")]
    InvalidSample(String),

    /// Position sample is older than the last accepted one
    #[error("Out-of-order sample: {received} is older than {last_accepted}")]
    OutOfOrderSample {
        /// Timestamp of the rejected sample
        received: chrono::DateTime<chrono::Utc>,
        /// Timestamp of the last accepted sample
        last_accepted: chrono::DateTime<chrono::Utc>,
    },

    /// Tracker has no route
    #[error("Route tracking is not active")]
    NotTracking,

    /// Operation not allowed in the current state
    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        /// State name at the time of the call
        from: String,
        /// Rejected operation
        action: &'static str,
    },

    /// Location provider failure
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    /// Routing provider failure
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Configuration failure
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Location provider errors; all of them are recoverable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// User denied location permission
    #[error("Location permission denied")]
    PermissionDenied,

    /// Location services are switched off
    #[error("Location service disabled")]
    ServiceDisabled,

    /// No fix within the allowed time
    #[error("Timed out waiting for a position fix")]
    Timeout,

    /// Provider has no fix to report
    #[error("No position fix available")]
    NoFix,

    /// Any other provider-specific failure
    #[error("Location provider failure: {0}")]
    Provider(String),
}

impl LocationError {
    /// Whether retrying can help. Permission and service errors need the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocationError::Timeout | LocationError::NoFix | LocationError::Provider(_)
        )
    }
}

/// Routing provider errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// Provider could not be reached
    #[error("Routing provider unreachable: {0}")]
    Unreachable(String),

    /// Provider answered without a route
    #[error("No route between origin and destination")]
    NoRoute,

    /// Request exceeded the reroute timeout
    #[error("Routing request timed out")]
    Timeout,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML for `NavigatorConfig`
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values are out of range or inconsistent
    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, NavigationError>;
