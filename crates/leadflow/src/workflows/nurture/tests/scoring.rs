use super::common::*;
use crate::workflows::nurture::domain::{
    EngagementKind, LeadStatus, QualificationLevel, SubscriptionTier,
};
use crate::workflows::nurture::queue::{TaskAction, TaskPriority, TaskStatus};
use crate::workflows::nurture::repository::RecordStore;
use crate::workflows::nurture::scoring::{engagement_delta, LeadContext, ScoreBreakdown, ScoringEngine};
use chrono::Duration;

#[test]
fn breakdown_total_sums_components() {
    let breakdown = ScoreBreakdown {
        profile_quality: 20,
        engagement_score: 28,
        behavioral_signals: 20,
        company_fit: 10,
        timing_indicators: 3,
    };
    assert_eq!(breakdown.total(), 81);
    assert_eq!(QualificationLevel::from_score(81), QualificationLevel::Warm);
}

#[test]
fn total_is_clamped_to_one_hundred() {
    let breakdown = ScoreBreakdown {
        profile_quality: 25,
        engagement_score: 30,
        behavioral_signals: 25,
        company_fit: 15,
        timing_indicators: 5,
    };
    assert_eq!(breakdown.total(), 100);
}

#[test]
fn qualification_levels_follow_fixed_thresholds() {
    let expectations = [
        (0, QualificationLevel::Cold),
        (24, QualificationLevel::Cold),
        (25, QualificationLevel::Cool),
        (49, QualificationLevel::Cool),
        (50, QualificationLevel::Lukewarm),
        (74, QualificationLevel::Lukewarm),
        (75, QualificationLevel::Warm),
        (100, QualificationLevel::Warm),
    ];
    for (score, expected) in expectations {
        assert_eq!(QualificationLevel::from_score(score), expected, "score {score}");
    }

    // Monotonic: the level never decreases as the score rises.
    let mut previous = QualificationLevel::Cold;
    for score in 0..=100u8 {
        let level = QualificationLevel::from_score(score);
        assert!(level >= previous, "level regressed at score {score}");
        previous = level;
    }
}

#[test]
fn components_never_exceed_their_maxima() {
    let now = fixed_now();
    let lead = rich_lead("lead-max", SubscriptionTier::Enterprise, now);

    let mut events = Vec::new();
    for minutes in 0..200 {
        let kind = match minutes % 4 {
            0 => EngagementKind::Opened,
            1 => EngagementKind::Clicked,
            2 => EngagementKind::Replied,
            _ => EngagementKind::Forwarded,
        };
        events.push(engagement(&lead, kind, now - Duration::minutes(minutes)));
    }

    let ctx = LeadContext {
        landing_page: Some(landing_page(&lead, 50, 10)),
        sequence: None,
        engagement: events,
        lead,
    };

    let report = ScoringEngine::default().evaluate(&ctx, now);
    assert!(report.breakdown.profile_quality <= 25);
    assert!(report.breakdown.engagement_score <= 30);
    assert!(report.breakdown.behavioral_signals <= 25);
    assert!(report.breakdown.company_fit <= 15);
    assert!(report.breakdown.timing_indicators <= 5);
    assert!(report.total_score <= 100);
    assert_eq!(report.level, QualificationLevel::Warm);
}

#[test]
fn recent_click_applies_recency_multiplier() {
    let now = fixed_now();
    let half_hour_ago = now - Duration::minutes(30);
    assert_eq!(
        engagement_delta(EngagementKind::Clicked, half_hour_ago, now),
        12
    );
}

#[test]
fn stale_events_are_discounted() {
    let now = fixed_now();
    let last_month = now - Duration::days(30);
    assert_eq!(engagement_delta(EngagementKind::Opened, last_month, now), 1);
    assert_eq!(
        engagement_delta(EngagementKind::Clicked, now - Duration::hours(2), now),
        8
    );
}

#[test]
fn promotion_marks_lead_warm_and_schedules_call() {
    let harness = harness();
    let now = fixed_now();
    let lead_id = seed_promotable_lead(&harness, "lead-promote", now);

    let report = harness
        .service
        .score_lead(&lead_id, now)
        .expect("lead scores");

    assert!(report.total_score >= 75 && report.total_score < 85);
    assert_eq!(report.level, QualificationLevel::Warm);

    let lead = harness
        .store
        .lead(&lead_id)
        .expect("lead fetches")
        .expect("lead present");
    assert_eq!(lead.status, LeadStatus::Warm);
    assert!(lead.ready_for_call);
    assert_eq!(lead.score, report.total_score);

    let call_task = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .find(|task| matches!(task.action, TaskAction::ScheduleCall { .. }))
        .expect("schedule_call task enqueued");
    assert_eq!(call_task.priority, TaskPriority::Medium);
    assert_eq!(call_task.status, TaskStatus::Pending);
    assert_eq!(call_task.scheduled_at, now + Duration::hours(4));
}

#[test]
fn high_scores_promote_with_high_priority() {
    let harness = harness();
    let now = fixed_now();
    let lead_id = seed_promotable_lead(&harness, "lead-hot", now);

    // A reply pushes the total past the high-priority cutoff.
    let lead = harness
        .store
        .lead(&lead_id)
        .expect("lead fetches")
        .expect("lead present");
    harness
        .store
        .record_engagement(engagement(
            &lead,
            crate::workflows::nurture::domain::EngagementKind::Replied,
            now - Duration::hours(1),
        ))
        .expect("engagement records");

    let report = harness
        .service
        .score_lead(&lead_id, now)
        .expect("lead scores");
    assert!(report.total_score >= 85);

    let call_task = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .find(|task| matches!(task.action, TaskAction::ScheduleCall { .. }))
        .expect("schedule_call task enqueued");
    assert_eq!(call_task.priority, TaskPriority::High);
}

#[test]
fn repeated_scoring_does_not_duplicate_promotion_tasks() {
    let harness = harness();
    let now = fixed_now();
    let lead_id = seed_promotable_lead(&harness, "lead-idem", now);

    harness
        .service
        .score_lead(&lead_id, now)
        .expect("first score");
    harness
        .service
        .score_lead(&lead_id, now + Duration::minutes(5))
        .expect("second score");

    let call_tasks = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .filter(|task| matches!(task.action, TaskAction::ScheduleCall { .. }))
        .count();
    assert_eq!(call_tasks, 1, "retried promotion must not duplicate the call task");
}

#[test]
fn engagement_delta_floors_score_at_zero() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-floor", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");

    let update = harness
        .service
        .record_engagement(
            &lead_id,
            EngagementKind::Unsubscribed,
            now - Duration::hours(2),
            now,
        )
        .expect("engagement recorded");

    assert_eq!(update.score_change, -25);
    assert_eq!(update.new_score, 0);
    assert!(update.report.is_none(), "unsubscribe does not trigger a rescore");
}

#[test]
fn clicked_event_triggers_full_rescore() {
    let harness = harness();
    let now = fixed_now();
    let lead_id = seed_promotable_lead(&harness, "lead-click", now);

    let update = harness
        .service
        .record_engagement(&lead_id, EngagementKind::Clicked, now - Duration::minutes(30), now)
        .expect("engagement recorded");

    assert_eq!(update.score_change, 12);
    let report = update.report.expect("clicked triggers rescore");
    assert_eq!(report.level, QualificationLevel::Warm);

    let lead = harness
        .store
        .lead(&lead_id)
        .expect("lead fetches")
        .expect("lead present");
    assert_eq!(lead.status, LeadStatus::Warm);
    assert_eq!(lead.score, report.total_score);
}
