use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::EngineConfig;
use crate::workflows::nurture::domain::{
    CompanySize, ContactTimezone, EngagementEvent, EngagementKind, LandingPageActivity,
    LandingPageId, Lead, LeadId, LeadStatus, OwnerId, QualificationLevel, SubscriptionTier,
};
use crate::workflows::nurture::queue::TaskQueueProcessor;
use crate::workflows::nurture::repository::{
    ContactChannel, ContactError, DispatchReceipt, EmailDispatch, Notification, NotificationSink,
    NotifyError, RecordStore,
};
use crate::workflows::nurture::scoring::ScoringEngine;
use crate::workflows::nurture::service::LeadAutomationService;
use crate::workflows::nurture::store::MemoryRecordStore;

/// Tuesday 2025-06-10 15:00 UTC, 10:00 local for the default Eastern offset.
pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0)
        .single()
        .expect("valid fixture instant")
}

pub(super) fn owner() -> OwnerId {
    OwnerId("user-1".to_string())
}

pub(super) fn eastern() -> ContactTimezone {
    ContactTimezone::new("America/New_York", -300)
}

/// Fully populated, warm-able lead: business email, complete profile,
/// decision-maker title, high-value industry.
pub(super) fn rich_lead(id: &str, tier: SubscriptionTier, now: DateTime<Utc>) -> Lead {
    Lead {
        id: LeadId(id.to_string()),
        owner: owner(),
        tier,
        first_name: Some("Dana".to_string()),
        last_name: Some("Whitfield".to_string()),
        email: Some("dana.whitfield@acmeco.com".to_string()),
        phone: Some("+1-555-0140".to_string()),
        company: Some("AcmeCo".to_string()),
        title: Some("VP of Operations".to_string()),
        industry: Some("Technology".to_string()),
        company_size: Some(CompanySize::Enterprise),
        linkedin_url: Some("https://linkedin.com/in/dwhitfield".to_string()),
        location: Some("New York, NY".to_string()),
        timezone: Some(eastern()),
        status: LeadStatus::Cold,
        score: 0,
        qualification_level: QualificationLevel::Cold,
        ready_for_call: false,
        last_engagement_at: None,
        last_scored_at: None,
        engagement_summary: None,
        created_at: now - Duration::days(14),
    }
}

/// Minimal lead: personal email, no phone, nothing else filled in.
pub(super) fn sparse_lead(id: &str, now: DateTime<Utc>) -> Lead {
    Lead {
        id: LeadId(id.to_string()),
        owner: owner(),
        tier: SubscriptionTier::Starter,
        first_name: None,
        last_name: None,
        email: Some("someone@gmail.com".to_string()),
        phone: None,
        company: None,
        title: None,
        industry: None,
        company_size: None,
        linkedin_url: None,
        location: None,
        timezone: None,
        status: LeadStatus::Cold,
        score: 0,
        qualification_level: QualificationLevel::Cold,
        ready_for_call: false,
        last_engagement_at: None,
        last_scored_at: None,
        engagement_summary: None,
        created_at: now - Duration::days(3),
    }
}

pub(super) fn engagement(lead: &Lead, kind: EngagementKind, at: DateTime<Utc>) -> EngagementEvent {
    EngagementEvent {
        lead_id: lead.id.clone(),
        kind,
        occurred_at: at,
    }
}

pub(super) fn landing_page(lead: &Lead, views: u32, conversions: u32) -> LandingPageActivity {
    LandingPageActivity {
        id: LandingPageId(format!("page-{}", lead.id)),
        lead_id: lead.id.clone(),
        views,
        conversions,
        last_viewed_at: if views > 0 {
            Some(lead.created_at + Duration::days(1))
        } else {
            None
        },
        metrics: None,
    }
}

/// Contact channel that records dispatches and can be primed to fail
/// transiently for retry tests.
#[derive(Default)]
pub(super) struct RecordingContactChannel {
    sent: Mutex<Vec<EmailDispatch>>,
    failures_remaining: Mutex<u32>,
}

impl RecordingContactChannel {
    pub(super) fn with_failures(failures: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_remaining: Mutex::new(failures),
        }
    }

    pub(super) fn sent(&self) -> Vec<EmailDispatch> {
        self.sent.lock().expect("channel mutex poisoned").clone()
    }
}

impl ContactChannel for RecordingContactChannel {
    fn send_email(&self, dispatch: EmailDispatch) -> Result<DispatchReceipt, ContactError> {
        {
            let mut failures = self
                .failures_remaining
                .lock()
                .expect("channel mutex poisoned");
            if *failures > 0 {
                *failures -= 1;
                return Err(ContactError::Transport("smtp relay offline".to_string()));
            }
        }

        let mut sent = self.sent.lock().expect("channel mutex poisoned");
        let receipt = DispatchReceipt {
            message_id: format!("msg-{}", sent.len() + 1),
        };
        sent.push(dispatch);
        Ok(receipt)
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifications {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) type TestService =
    LeadAutomationService<MemoryRecordStore, RecordingContactChannel, RecordingNotifications>;
pub(super) type TestProcessor =
    TaskQueueProcessor<MemoryRecordStore, RecordingContactChannel, RecordingNotifications>;

pub(super) struct Harness {
    pub(super) store: Arc<MemoryRecordStore>,
    pub(super) channel: Arc<RecordingContactChannel>,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) service: Arc<TestService>,
    pub(super) processor: TestProcessor,
}

pub(super) fn harness() -> Harness {
    harness_with_channel(RecordingContactChannel::default())
}

pub(super) fn harness_with_channel(channel: RecordingContactChannel) -> Harness {
    let store = Arc::new(MemoryRecordStore::default());
    let channel = Arc::new(channel);
    let notifications = Arc::new(RecordingNotifications::default());
    let service = Arc::new(LeadAutomationService::new(
        store.clone(),
        channel.clone(),
        notifications.clone(),
        ScoringEngine::default(),
    ));
    let processor = TaskQueueProcessor::new(store.clone(), service.clone(), EngineConfig::default());

    Harness {
        store,
        channel,
        notifications,
        service,
        processor,
    }
}

/// Seed a lead whose full rescore lands in the warm band below the
/// high-priority cutoff (engagement tuned for a total of 80).
pub(super) fn seed_promotable_lead(harness: &Harness, id: &str, now: DateTime<Utc>) -> LeadId {
    let lead = rich_lead(id, SubscriptionTier::Starter, now);
    let lead_id = lead.id.clone();
    harness.store.insert_lead(lead.clone()).expect("lead inserts");

    for hours_ago in 1..=4 {
        harness
            .store
            .record_engagement(engagement(
                &lead,
                EngagementKind::Opened,
                now - Duration::hours(hours_ago),
            ))
            .expect("engagement records");
    }
    harness
        .store
        .record_engagement(engagement(
            &lead,
            EngagementKind::Clicked,
            now - Duration::hours(2),
        ))
        .expect("engagement records");
    harness
        .store
        .upsert_landing_page(landing_page(&lead, 1, 0))
        .expect("landing page upserts");

    lead_id
}
