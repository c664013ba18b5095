//! Threshold-crossing detection.
//!
//! Stateful filter between the evaluator and the dispatcher. Tracks, per
//! cycle, whether the previous evaluation was above the alert threshold,
//! and turns raw evaluations into qualifying events according to the
//! configured policy. The two policies are alternatives: a deployment
//! picks one, they never run simultaneously for the same cycle.

use serde::Deserialize;
use std::collections::HashMap;

use crate::types::CycleEvaluation;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How above-threshold evaluations become events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// Only the below→above transition is an event. Staying above produces
    /// nothing until the edge falls back to or below the threshold and
    /// re-arms the cycle.
    EdgeTriggered,
    /// Every above-threshold evaluation is a candidate event; the
    /// dispatcher's cooldown decides which ones reach the notifier.
    LevelTriggered,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Per-cycle crossing state machine. Owned exclusively by the evaluation
/// activity; needs no synchronization.
pub struct CrossingDetector {
    threshold: f64,
    policy: AlertPolicy,
    /// Initial state for every cycle is "below".
    was_above: HashMap<String, bool>,
}

impl CrossingDetector {
    pub fn new(threshold: f64, policy: AlertPolicy) -> Self {
        Self {
            threshold,
            policy,
            was_above: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one tick's evaluations through the state machine and return
    /// the qualifying events, preserving catalog order.
    pub fn observe(&mut self, evaluations: &[CycleEvaluation]) -> Vec<CycleEvaluation> {
        let mut events = Vec::new();

        for eval in evaluations {
            let above = eval.net_edge > self.threshold;
            let was = self
                .was_above
                .insert(eval.cycle_id.clone(), above)
                .unwrap_or(false);

            let fire = match self.policy {
                AlertPolicy::EdgeTriggered => above && !was,
                AlertPolicy::LevelTriggered => above,
            };
            if fire {
                events.push(eval.clone());
            }
        }

        events
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
