use chrono::{DateTime, Utc};

use super::LeadContext;
use crate::workflows::nurture::domain::{CompanySize, EngagementKind, Lead, SequenceStatus};

const PERSONAL_EMAIL_DOMAINS: [&str; 3] = ["gmail.com", "yahoo.com", "hotmail.com"];
const HIGH_VALUE_INDUSTRIES: [&str; 4] = ["technology", "finance", "healthcare", "manufacturing"];
const DECISION_MAKER_TITLES: [&str; 6] = ["ceo", "cto", "vp", "director", "head", "manager"];

pub(crate) const PROFILE_QUALITY_MAX: u8 = 25;
pub(crate) const ENGAGEMENT_SCORE_MAX: u8 = 30;
pub(crate) const BEHAVIORAL_SIGNALS_MAX: u8 = 25;
pub(crate) const COMPANY_FIT_MAX: u8 = 15;
pub(crate) const TIMING_INDICATORS_MAX: u8 = 5;

fn has_business_email(lead: &Lead) -> Option<bool> {
    let email = lead.email.as_deref()?;
    let domain = email.rsplit('@').next()?.to_ascii_lowercase();
    Some(!PERSONAL_EMAIL_DOMAINS.contains(&domain.as_str()))
}

/// Profile completeness and contactability, 0-25.
pub(crate) fn profile_quality(lead: &Lead) -> u8 {
    let mut score: u32 = 0;

    match has_business_email(lead) {
        Some(true) => score += 8,
        Some(false) => score += 3,
        None => {}
    }

    if lead.first_name.is_some() {
        score += 2;
    }
    if lead.last_name.is_some() {
        score += 2;
    }
    if lead.company.is_some() {
        score += 3;
    }
    if lead.title.is_some() {
        score += 2;
    }
    if lead.linkedin_url.is_some() {
        score += 1;
    }
    if lead.phone.is_some() {
        score += 3;
    }

    if let Some(industry) = lead.industry.as_deref() {
        if HIGH_VALUE_INDUSTRIES.contains(&industry.to_ascii_lowercase().as_str()) {
            score += 4;
        } else {
            score += 2;
        }
    }

    score.min(PROFILE_QUALITY_MAX as u32) as u8
}

/// Email, landing-page, and sequence engagement, 0-30.
pub(crate) fn engagement_score(ctx: &LeadContext) -> u8 {
    let mut score: f32 = 0.0;

    let count = |kind: EngagementKind| -> u32 {
        ctx.engagement.iter().filter(|e| e.kind == kind).count() as u32
    };

    score += (count(EngagementKind::Opened) * 2).min(8) as f32;
    score += (count(EngagementKind::Clicked) * 4).min(12) as f32;
    score += (count(EngagementKind::Replied) * 10).min(10) as f32;

    if let Some(page) = &ctx.landing_page {
        if page.views > 0 {
            score += 3.0;
        }
        if page.views > 2 {
            score += 2.0;
        }
        if page.conversions > 0 {
            score += 3.0;
        }
    }

    if let Some(sequence) = &ctx.sequence {
        if sequence.total_steps > 0 {
            score += (sequence.current_step as f32 / sequence.total_steps as f32) * 5.0;
        }
    }

    (score.round() as u32).min(ENGAGEMENT_SCORE_MAX as u32) as u8
}

/// Responsiveness and sharing behavior, 0-25. Prompt responses are
/// engagements inside the trailing week.
pub(crate) fn behavioral_signals(ctx: &LeadContext, now: DateTime<Utc>) -> u8 {
    let mut score: u32 = 0;

    let prompt_responses = ctx
        .engagement
        .iter()
        .filter(|event| (now - event.occurred_at).num_hours() <= 168)
        .count() as u32;
    score += (prompt_responses * 2).min(8);

    if ctx.engagement.len() >= 3 {
        score += 4;
    }
    if ctx.engagement.len() >= 5 {
        score += 3;
    }

    let forwards = ctx
        .engagement
        .iter()
        .filter(|e| e.kind == EngagementKind::Forwarded)
        .count() as u32;
    score += (forwards * 5).min(5);

    if ctx.landing_page.is_some() {
        score += 3;
    }

    score.min(BEHAVIORAL_SIGNALS_MAX as u32) as u8
}

/// Firmographic alignment, 0-15.
pub(crate) fn company_fit(lead: &Lead) -> u8 {
    let mut score: u32 = 0;

    if let Some(size) = lead.company_size {
        score += match size {
            CompanySize::Enterprise => 6,
            CompanySize::Medium => 4,
            CompanySize::Small => 3,
            CompanySize::Micro => 1,
        };
    }

    if let Some(title) = lead.title.as_deref() {
        let title = title.to_ascii_lowercase();
        if DECISION_MAKER_TITLES.iter().any(|t| title.contains(t)) {
            score += 6;
        } else {
            score += 2;
        }
    }

    if lead.industry.is_some() {
        score += 3;
    }

    score.min(COMPANY_FIT_MAX as u32) as u8
}

/// Recency of contact and active nurture, 0-5.
pub(crate) fn timing_indicators(ctx: &LeadContext, now: DateTime<Utc>) -> u8 {
    let mut score: u32 = 0;

    if let Some(last) = ctx.lead.last_engagement_at.or_else(|| {
        ctx.engagement
            .iter()
            .map(|event| event.occurred_at)
            .max()
    }) {
        let hours_since = (now - last).num_hours();
        if hours_since < 24 {
            score += 3;
        } else if hours_since < 72 {
            score += 2;
        } else if hours_since < 168 {
            score += 1;
        }
    }

    if ctx
        .sequence
        .as_ref()
        .is_some_and(|sequence| sequence.status == SequenceStatus::Active)
    {
        score += 2;
    }

    score.min(TIMING_INDICATORS_MAX as u32) as u8
}
