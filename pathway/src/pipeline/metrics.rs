use crate::value::Value;

/// How one healing attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    /// Evaluation succeeded; the caller's validator said no.
    Rejected,
    /// Evaluation raised the "validation failed" condition.
    ValidationFailed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AttemptMetrics {
    pub window: usize,
    pub outcome: AttemptOutcome,
    pub duration_ms: u128,
}

/// Result of a successful [`get_with_healing_report`] call.
///
/// [`get_with_healing_report`]: crate::Pathway::get_with_healing_report
#[derive(Debug, Clone)]
pub struct HealingReport {
    pub value: Value,
    /// Distrust window of the accepted attempt.
    pub window: usize,
    pub total_duration_ms: u128,
    pub attempts: Vec<AttemptMetrics>,
}

impl HealingReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Whether any cache had to be distrusted to get an accepted value.
    pub fn healed(&self) -> bool {
        self.window > 0
    }

    pub fn attempt_duration_ms(&self, window: usize) -> Option<u128> {
        self.attempts
            .iter()
            .find(|attempt| attempt.window == window)
            .map(|attempt| attempt.duration_ms)
    }
}
