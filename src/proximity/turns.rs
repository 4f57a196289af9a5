// proximity/turns.rs

//! Turn announcements. Wraps a proximity engine whose candidates are the turn
//! steps of the active plan; passed steps are retired so a turn behind the
//! walker is never announced again.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;

use super::{ProximityCandidate, ProximityEngine, ProximityKind, ProximitySignal, ProximityTier, Severity, TierThresholds};
use crate::config::TurnSettings;
use crate::core::geometry::Coordinate;
use crate::core::route::{ManeuverKind, RoutePlan, RouteStep};

/// A turn warning mapped back to its route step
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEvent {
    /// Index into `RoutePlan::steps`
    pub step_index: usize,
    /// The step itself
    pub step: RouteStep,
    /// Early warning / approaching / at turn
    pub tier: ProximityTier,
    /// Straight-line distance to the step start, meters
    pub distance_m: f64,
}

/// Turn-notification engine for one plan
pub struct TurnMonitor {
    engine: ProximityEngine,
    early_warning_m: f64,
    steps: HashMap<String, (usize, RouteStep)>,
}

impl TurnMonitor {
    /// Creates an idle monitor
    pub fn new(settings: &TurnSettings) -> Self {
        TurnMonitor {
            engine: ProximityEngine::with_thresholds(
                ProximityKind::Turn,
                TierThresholds {
                    approaching_m: settings.approaching_m,
                    immediate_m: settings.at_turn_m,
                },
                settings.early_warning_m,
                settings.throttle(),
            ),
            early_warning_m: settings.early_warning_m,
            steps: HashMap::new(),
        }
    }

    /// Loads the turn steps of `plan` and starts monitoring
    pub fn start_monitoring(&mut self, plan: &RoutePlan) {
        self.steps.clear();
        let candidates = plan
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.maneuver.is_turn())
            .map(|(index, step)| {
                let id = format!("turn-{}", index);
                self.steps.insert(id.clone(), (index, step.clone()));
                ProximityCandidate::new(id, step.start, self.early_warning_m)
                    .with_severity(turn_severity(step.maneuver))
                    .with_category(step.maneuver.phrase())
            })
            .collect();
        self.engine.start_monitoring(Some(candidates));
    }

    /// Stops monitoring and forgets the plan
    pub fn stop_monitoring(&mut self) {
        self.engine.stop_monitoring();
        self.steps.clear();
    }

    /// Whether the monitor is running
    pub fn is_monitoring(&self) -> bool {
        self.engine.is_monitoring()
    }

    /// Retires every turn step before `next_turn_index`; `None` means no turn
    /// is left ahead and retires all of them.
    pub fn retire_passed(&mut self, next_turn_index: Option<usize>) {
        let passed: Vec<String> = self
            .steps
            .iter()
            .filter(|(_, (index, _))| next_turn_index.is_none_or(|next| *index < next))
            .map(|(id, _)| id.clone())
            .collect();
        for id in passed {
            debug!("Turn {} passed", id);
            self.engine.retire(&id);
            self.steps.remove(&id);
        }
    }

    /// Processes a position; returns turn warnings only
    pub fn update_position(&mut self, point: &Coordinate, now: DateTime<Utc>) -> Vec<TurnEvent> {
        self.engine
            .update_position(point, now)
            .into_iter()
            .filter_map(|event| match event.signal {
                ProximitySignal::Warning(tier) => {
                    self.steps.get(&event.candidate_id).map(|(index, step)| TurnEvent {
                        step_index: *index,
                        step: step.clone(),
                        tier,
                        distance_m: event.distance_m,
                    })
                }
                ProximitySignal::Cleared => None,
            })
            .collect()
    }
}

fn turn_severity(maneuver: ManeuverKind) -> Severity {
    match maneuver {
        ManeuverKind::UTurn => Severity::High,
        _ => Severity::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn plan_with_turns() -> RoutePlan {
        let start = Coordinate::new(0.0, 0.0);
        let first = start.offset_m(150.0, 0.0);
        let second = first.offset_m(0.0, -150.0);
        let end = second.offset_m(150.0, 0.0);
        let step = |maneuver, from: Coordinate, to: Coordinate| RouteStep {
            instruction: maneuver_text(maneuver),
            maneuver,
            start: from,
            end: to,
            distance_m: 150.0,
            duration_s: 110.0,
        };
        RoutePlan {
            polyline: vec![start, first, second, end],
            steps: vec![
                step(ManeuverKind::Straight, start, first),
                step(ManeuverKind::Left, first, second),
                step(ManeuverKind::Right, second, end),
            ],
            total_distance_m: 450.0,
            total_duration_s: 330.0,
            origin: start,
            destination: end,
        }
    }

    fn maneuver_text(maneuver: ManeuverKind) -> String {
        maneuver.phrase().to_string()
    }

    #[test]
    fn only_turn_steps_are_monitored() {
        let mut monitor = TurnMonitor::new(&TurnSettings::default());
        monitor.start_monitoring(&plan_with_turns());
        assert_eq!(monitor.steps.len(), 2);
    }

    #[test]
    fn retired_turn_is_silent() {
        let plan = plan_with_turns();
        let mut monitor = TurnMonitor::new(&TurnSettings::default());
        monitor.start_monitoring(&plan);
        monitor.retire_passed(Some(2));

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let events = monitor.update_position(&plan.steps[1].start, now);
        assert!(events.is_empty());

        let events = monitor.update_position(&plan.steps[2].start, now + Duration::seconds(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step_index, 2);
        assert_eq!(events[0].tier, ProximityTier::Immediate);
    }

    #[test]
    fn u_turn_is_announced_one_tier_earlier() {
        let start = Coordinate::new(0.0, 0.0);
        let turn_at = start.offset_m(80.0, 0.0);
        let mut plan = RoutePlan::straight_line(start, turn_at, 1.4);
        plan.steps.push(RouteStep {
            instruction: "Make a U-turn".into(),
            maneuver: ManeuverKind::UTurn,
            start: turn_at,
            end: start,
            distance_m: 80.0,
            duration_s: 60.0,
        });
        let mut monitor = TurnMonitor::new(&TurnSettings::default());
        monitor.start_monitoring(&plan);

        let events = monitor.update_position(&start, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(events[0].tier, ProximityTier::Approaching);
    }
}
