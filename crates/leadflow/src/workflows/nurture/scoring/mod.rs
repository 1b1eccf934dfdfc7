mod config;
mod events;
mod rules;

pub use config::ScoringConfig;
pub use events::engagement_delta;

pub(crate) use events::delta_reasoning;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    EngagementEvent, LandingPageActivity, Lead, QualificationLevel, Sequence,
};

/// Everything the scoring engine needs to evaluate one lead. Assembled from
/// the record store by the service layer; evaluation itself is pure and
/// deterministic given identical inputs.
#[derive(Debug, Clone)]
pub struct LeadContext {
    pub lead: Lead,
    pub engagement: Vec<EngagementEvent>,
    pub landing_page: Option<LandingPageActivity>,
    pub sequence: Option<Sequence>,
}

/// Stateless evaluator applying the weighted rubric to a lead context.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn evaluate(&self, ctx: &LeadContext, now: DateTime<Utc>) -> ScoreReport {
        let breakdown = ScoreBreakdown {
            profile_quality: rules::profile_quality(&ctx.lead),
            engagement_score: rules::engagement_score(ctx),
            behavioral_signals: rules::behavioral_signals(ctx, now),
            company_fit: rules::company_fit(&ctx.lead),
            timing_indicators: rules::timing_indicators(ctx, now),
        };

        let total_score = breakdown.total();
        let level = QualificationLevel::from_score(total_score);

        ScoreReport {
            lead_id: ctx.lead.id.clone(),
            total_score,
            level,
            breakdown,
            assessment: assessment_for(total_score).to_string(),
        }
    }

    /// Whether this report promotes the lead to warm status.
    pub fn promotes(&self, report: &ScoreReport) -> bool {
        report.total_score >= self.config.warm_threshold
            && report.level == QualificationLevel::Warm
    }

    /// Priority of the promotion call task for this score.
    pub fn call_priority_is_high(&self, total_score: u8) -> bool {
        total_score >= self.config.high_priority_threshold
    }
}

/// Per-factor contributions, each clamped to its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub profile_quality: u8,
    pub engagement_score: u8,
    pub behavioral_signals: u8,
    pub company_fit: u8,
    pub timing_indicators: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.profile_quality as u32
            + self.engagement_score as u32
            + self.behavioral_signals as u32
            + self.company_fit as u32
            + self.timing_indicators as u32;
        sum.min(100) as u8
    }
}

/// Evaluation output persisted to the lead and surfaced to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub lead_id: super::domain::LeadId,
    pub total_score: u8,
    pub level: QualificationLevel,
    pub breakdown: ScoreBreakdown,
    pub assessment: String,
}

const fn assessment_for(total_score: u8) -> &'static str {
    if total_score >= 75 {
        "High-quality lead ready for direct sales contact"
    } else if total_score >= 50 {
        "Promising lead requiring additional nurturing"
    } else if total_score >= 25 {
        "Early-stage lead with potential for development"
    } else {
        "Low-quality lead requiring qualification review"
    }
}
