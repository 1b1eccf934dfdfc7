use chrono::Duration;

use crate::workflows::nurture::domain::SequenceKind;

/// Fallback spacing when a step has no entry in the delay table.
const DEFAULT_STEP_DELAY_HOURS: i64 = 72;

/// Fixed step counts and inter-step delays per sequence flavor.
#[derive(Debug, Clone, Copy)]
pub struct SequenceBlueprint {
    pub kind: SequenceKind,
    pub total_steps: u32,
    delays: &'static [(u32, i64)],
}

impl SequenceBlueprint {
    pub const fn for_kind(kind: SequenceKind) -> Self {
        match kind {
            SequenceKind::BasicNurture => Self {
                kind,
                total_steps: 3,
                delays: &[(2, 72), (3, 120)],
            },
            SequenceKind::AdvancedNurture => Self {
                kind,
                total_steps: 5,
                delays: &[(2, 48), (3, 96), (4, 168), (5, 240)],
            },
            SequenceKind::PremiumNurture => Self {
                kind,
                total_steps: 7,
                delays: &[(2, 24), (3, 48), (4, 96), (5, 168), (6, 240), (7, 336)],
            },
            SequenceKind::CustomNurture => Self {
                kind,
                total_steps: 10,
                delays: &[
                    (2, 24),
                    (3, 48),
                    (4, 72),
                    (5, 120),
                    (6, 168),
                    (7, 240),
                    (8, 336),
                    (9, 504),
                    (10, 672),
                ],
            },
        }
    }

    /// Delay between completing step `step - 1` and sending `step`.
    pub fn delay_before_step(&self, step: u32) -> Duration {
        let hours = self
            .delays
            .iter()
            .find(|(entry_step, _)| *entry_step == step)
            .map(|(_, hours)| *hours)
            .unwrap_or(DEFAULT_STEP_DELAY_HOURS);
        Duration::hours(hours)
    }
}
