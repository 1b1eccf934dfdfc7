use chrono::{DateTime, Utc};

use crate::workflows::nurture::domain::EngagementKind;

/// Base score delta per engagement kind, before the recency multiplier.
pub(crate) const fn base_delta(kind: EngagementKind) -> i32 {
    match kind {
        EngagementKind::Opened => 2,
        EngagementKind::Clicked => 8,
        EngagementKind::Replied => 15,
        EngagementKind::PageView => 5,
        EngagementKind::FormSubmit => 20,
        EngagementKind::Download => 12,
        EngagementKind::VideoWatch => 10,
        EngagementKind::Unsubscribed => -25,
        EngagementKind::Forwarded => 0,
    }
}

pub(crate) const fn delta_reasoning(kind: EngagementKind) -> &'static str {
    match kind {
        EngagementKind::Opened => "Email opened - showing initial interest",
        EngagementKind::Clicked => "Clicked link - active engagement with content",
        EngagementKind::Replied => "Replied to email - direct communication initiated",
        EngagementKind::PageView => "Visited landing page - researching solution",
        EngagementKind::FormSubmit => "Submitted form - strong buying signal",
        EngagementKind::Download => "Downloaded resource - information gathering phase",
        EngagementKind::VideoWatch => "Watched video - engaged with detailed content",
        EngagementKind::Unsubscribed => "Unsubscribed - no longer interested",
        EngagementKind::Forwarded => "Forwarded email - sharing with others",
    }
}

/// Incremental score change for a single event: base delta scaled by a
/// recency multiplier (x1.5 under an hour old, x0.5 past a week), rounded.
pub fn engagement_delta(
    kind: EngagementKind,
    occurred_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i32 {
    let mut delta = base_delta(kind) as f32;

    let minutes_ago = (now - occurred_at).num_minutes();
    if minutes_ago < 60 {
        delta *= 1.5;
    } else if minutes_ago > 168 * 60 {
        delta *= 0.5;
    }

    delta.round() as i32
}
