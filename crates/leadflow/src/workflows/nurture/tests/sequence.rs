use super::common::*;
use crate::workflows::nurture::domain::{SequenceKind, SequenceStatus, SubscriptionTier};
use crate::workflows::nurture::queue::{TaskAction, TaskStatus};
use crate::workflows::nurture::repository::RecordStore;
use crate::workflows::nurture::sequence::{SequenceBlueprint, StepOutcome};
use crate::workflows::nurture::service::AutomationError;
use chrono::Duration;

#[test]
fn tiers_map_to_sequence_depth() {
    let expectations = [
        (SubscriptionTier::Starter, SequenceKind::BasicNurture, 3),
        (SubscriptionTier::Growth, SequenceKind::AdvancedNurture, 5),
        (SubscriptionTier::Scale, SequenceKind::PremiumNurture, 7),
        (SubscriptionTier::Enterprise, SequenceKind::CustomNurture, 10),
    ];
    for (tier, kind, steps) in expectations {
        assert_eq!(SequenceKind::for_tier(tier), kind);
        assert_eq!(SequenceBlueprint::for_kind(kind).total_steps, steps);
    }
}

#[test]
fn step_delays_follow_the_fixed_tables() {
    let basic = SequenceBlueprint::for_kind(SequenceKind::BasicNurture);
    assert_eq!(basic.delay_before_step(2), Duration::hours(72));
    assert_eq!(basic.delay_before_step(3), Duration::hours(120));
    assert_eq!(
        basic.delay_before_step(99),
        Duration::hours(72),
        "unknown steps fall back to three days"
    );

    let custom = SequenceBlueprint::for_kind(SequenceKind::CustomNurture);
    assert_eq!(custom.delay_before_step(2), Duration::hours(24));
    assert_eq!(custom.delay_before_step(10), Duration::hours(672));
}

#[test]
fn starting_a_sequence_schedules_the_first_step_immediately() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-start", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");

    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");
    assert_eq!(sequence.kind, SequenceKind::BasicNurture);
    assert_eq!(sequence.current_step, 0);
    assert_eq!(sequence.total_steps, 3);
    assert_eq!(sequence.status, SequenceStatus::Active);

    let first_step = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .find(|task| matches!(task.action, TaskAction::SendEmail { step_number: 1, .. }))
        .expect("step-1 task enqueued");
    assert_eq!(first_step.scheduled_at, now);
    assert_eq!(first_step.status, TaskStatus::Pending);
}

#[test]
fn starting_twice_reuses_the_active_sequence() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-dup", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");

    let first = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");
    let second = harness
        .service
        .start_sequence(&lead_id, now + Duration::hours(1))
        .expect("second start is a no-op");
    assert_eq!(first.id, second.id);

    let step_tasks = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .filter(|task| matches!(task.action, TaskAction::SendEmail { .. }))
        .count();
    assert_eq!(step_tasks, 1);
}

#[test]
fn sending_a_step_schedules_the_next_with_the_table_delay() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-step", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");

    let outcome = harness
        .service
        .send_sequence_step(&sequence.id, 1, now)
        .expect("step sends");
    assert_eq!(
        outcome,
        StepOutcome::Sent {
            step: 1,
            next_step: Some(2),
            sequence_completed: false,
        }
    );

    let sent = harness.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].step_number, 1);
    assert_eq!(sent[0].to, "someone@gmail.com");

    let next_task = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .find(|task| matches!(task.action, TaskAction::SendEmail { step_number: 2, .. }))
        .expect("step-2 task enqueued");
    assert_eq!(next_task.scheduled_at, now + Duration::hours(72));

    let stored = harness
        .store
        .sequence(&sequence.id)
        .expect("sequence loads")
        .expect("present");
    assert_eq!(stored.current_step, 1);
    assert_eq!(stored.last_email_sent_at, Some(now));
}

#[test]
fn resending_a_delivered_step_is_a_no_op() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-resend", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");

    harness
        .service
        .send_sequence_step(&sequence.id, 1, now)
        .expect("step sends");
    let outcome = harness
        .service
        .send_sequence_step(&sequence.id, 1, now + Duration::minutes(5))
        .expect("resend is idempotent");
    assert_eq!(outcome, StepOutcome::AlreadySent { step: 1 });
    assert_eq!(harness.channel.sent().len(), 1, "no duplicate delivery");
}

#[test]
fn skipping_ahead_is_rejected() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-skip", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");

    match harness.service.send_sequence_step(&sequence.id, 3, now) {
        Err(AutomationError::StepOutOfOrder {
            expected,
            requested,
            ..
        }) => {
            assert_eq!(expected, 1);
            assert_eq!(requested, 3);
        }
        other => panic!("expected out-of-order rejection, got {other:?}"),
    }
}

#[test]
fn final_step_completes_the_sequence_exactly_once() {
    let harness = harness();
    let now = fixed_now();
    let lead = sparse_lead("lead-finish", now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");

    let mut at = now;
    for step in 1..=2 {
        let outcome = harness
            .service
            .send_sequence_step(&sequence.id, step, at)
            .expect("step sends");
        assert!(matches!(outcome, StepOutcome::Sent { .. }));
        at += Duration::hours(100);
    }

    let outcome = harness
        .service
        .send_sequence_step(&sequence.id, 3, at)
        .expect("final step sends");
    assert_eq!(
        outcome,
        StepOutcome::Sent {
            step: 3,
            next_step: None,
            sequence_completed: true,
        }
    );

    let stored = harness
        .store
        .sequence(&sequence.id)
        .expect("sequence loads")
        .expect("present");
    assert_eq!(stored.status, SequenceStatus::Completed);
    assert_eq!(stored.current_step, stored.total_steps);
    assert_eq!(stored.completed_at, Some(at));

    // No step-4 task for a 3-step flavor.
    let step_four = harness
        .store
        .tasks_created_since(now - Duration::hours(1))
        .expect("tasks list")
        .into_iter()
        .any(|task| matches!(task.action, TaskAction::SendEmail { step_number: 4, .. }));
    assert!(!step_four);

    // Completion is recorded exactly once.
    assert!(!harness
        .service
        .complete_sequence(&sequence.id, at + Duration::hours(1))
        .expect("repeat completion is a no-op"));
    let unchanged = harness
        .store
        .sequence(&sequence.id)
        .expect("sequence loads")
        .expect("present");
    assert_eq!(unchanged.completed_at, Some(at));
}

#[test]
fn leads_without_email_cannot_receive_steps() {
    let harness = harness();
    let now = fixed_now();
    let mut lead = sparse_lead("lead-noemail", now);
    lead.email = None;
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead).expect("lead inserts");
    let sequence = harness
        .service
        .start_sequence(&lead_id, now)
        .expect("sequence starts");

    let result = harness.service.send_sequence_step(&sequence.id, 1, now);
    assert!(matches!(result, Err(AutomationError::LeadEmailMissing(_))));
}
