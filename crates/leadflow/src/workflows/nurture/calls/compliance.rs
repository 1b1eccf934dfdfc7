use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::nurture::domain::{
    EngagementEvent, EngagementKind, LandingPageActivity, Lead,
};

/// Earliest and latest permitted local calling hours, inclusive.
pub const CALL_WINDOW_START_HOUR: u32 = 8;
pub const CALL_WINDOW_END_HOUR: u32 = 21;

/// Result of the pre-call compliance check. Every requirement is evaluated
/// and reported; a single failure never hides the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub reason: String,
    pub requirements_met: Vec<String>,
    pub requirements_failed: Vec<String>,
}

/// Evaluate the legal contact preconditions for phoning a lead. Pure in the
/// lead, its engagement history, landing-page activity, and the clock.
pub fn check(
    lead: &Lead,
    engagement: &[EngagementEvent],
    landing_page: Option<&LandingPageActivity>,
    now: DateTime<Utc>,
) -> ComplianceReport {
    let mut met = Vec::new();
    let mut failed = Vec::new();

    // 1. Opt-in signal: landing-page interaction or qualifying email engagement.
    let page_interaction = landing_page
        .map(|page| page.views > 0 || page.conversions > 0 || page.last_viewed_at.is_some())
        .unwrap_or(false);
    let email_engagement = engagement
        .iter()
        .any(|event| matches!(event.kind, EngagementKind::Clicked | EngagementKind::Replied));

    if page_interaction || email_engagement {
        met.push("Opt-in signal verified (landing page or email engagement)".to_string());
    } else {
        failed.push("No qualifying opt-in signal found".to_string());
    }

    // 2. No explicit opt-out.
    let unsubscribed = engagement
        .iter()
        .any(|event| event.kind == EngagementKind::Unsubscribed);
    if unsubscribed {
        failed.push("Lead has unsubscribed".to_string());
    } else {
        met.push("No opt-out recorded".to_string());
    }

    // 3. Phone number on file.
    if lead.phone.is_some() {
        met.push("Phone number available".to_string());
    } else {
        failed.push("No phone number on file".to_string());
    }

    // 4. Local time inside the permitted calling window.
    let local_hour = now
        .with_timezone(&lead.contact_timezone().fixed_offset())
        .hour();
    if (CALL_WINDOW_START_HOUR..=CALL_WINDOW_END_HOUR).contains(&local_hour) {
        met.push("Call time within permitted hours".to_string());
    } else {
        failed.push(format!(
            "Call time violation: current time {local_hour}:00 is outside permitted calling hours (8 AM - 9 PM)"
        ));
    }

    let compliant = failed.is_empty();
    let reason = if compliant {
        "All compliance requirements satisfied".to_string()
    } else {
        failed.join("; ")
    };

    ComplianceReport {
        compliant,
        reason,
        requirements_met: met,
        requirements_failed: failed,
    }
}
