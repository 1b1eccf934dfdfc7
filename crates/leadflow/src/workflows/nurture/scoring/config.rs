use serde::{Deserialize, Serialize};

/// Dials for qualification promotion. The warm and high-priority cutoffs are
/// intentionally distinct bands over the same score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Total score at or above which a warm lead is promoted.
    pub warm_threshold: u8,
    /// Total score at or above which the promotion call task is high priority.
    pub high_priority_threshold: u8,
    /// Hours between promotion and the scheduled call task.
    pub promotion_call_delay_hours: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            warm_threshold: 75,
            high_priority_threshold: 85,
            promotion_call_delay_hours: 4,
        }
    }
}
