use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::domain::{
    Call, CallId, EngagementEvent, LandingPageActivity, LandingPageId, Lead, LeadId, OwnerId,
    Sequence, SequenceId, TaskId,
};
use super::queue::{Task, TaskStatus};

/// Persistent record store boundary. The engine treats this as the single
/// source of truth; every task transition is a read-modify-write against it.
///
/// Implementations must make `claim_task`, `cancel_task`, and
/// `reset_failed_task` conditional on the task's current status, and
/// `adjust_lead_score` an atomic clamped increment, so concurrent processor
/// invocations cannot double-dispatch or lose score updates.
pub trait RecordStore: Send + Sync {
    // Leads
    fn insert_lead(&self, lead: Lead) -> Result<(), StoreError>;
    fn lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;
    fn update_lead(&self, lead: Lead) -> Result<(), StoreError>;
    /// Atomically add `delta` to the lead's score, clamping to 0..=100.
    /// Returns the new score.
    fn adjust_lead_score(&self, id: &LeadId, delta: i32) -> Result<u8, StoreError>;

    // Engagement events (append-only)
    fn record_engagement(&self, event: EngagementEvent) -> Result<(), StoreError>;
    fn engagement_for(&self, lead_id: &LeadId) -> Result<Vec<EngagementEvent>, StoreError>;
    fn purge_engagement_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    // Landing pages
    fn landing_page(&self, id: &LandingPageId) -> Result<Option<LandingPageActivity>, StoreError>;
    fn landing_page_for(&self, lead_id: &LeadId)
        -> Result<Option<LandingPageActivity>, StoreError>;
    fn upsert_landing_page(&self, page: LandingPageActivity) -> Result<(), StoreError>;

    // Tasks
    fn enqueue_task(&self, task: Task) -> Result<(), StoreError>;
    fn task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;
    fn update_task(&self, task: Task) -> Result<(), StoreError>;
    /// Pending tasks due at `now`, ordered by priority descending then
    /// `scheduled_at` ascending, limited to `limit`.
    fn due_tasks(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Task>, StoreError>;
    /// Compare-and-set `pending -> in_progress`. Returns false when the task
    /// was not pending (already claimed, cancelled, or finished).
    fn claim_task(&self, id: &TaskId, started_at: DateTime<Utc>) -> Result<bool, StoreError>;
    /// Compare-and-set `pending -> cancelled`.
    fn cancel_task(&self, id: &TaskId) -> Result<bool, StoreError>;
    /// Compare-and-set `failed -> pending`, resetting the retry budget.
    fn reset_failed_task(&self, id: &TaskId, now: DateTime<Utc>) -> Result<bool, StoreError>;
    /// True when an unfinished (pending or in-progress) task of the given
    /// action label already references the lead.
    fn open_task_exists(&self, lead_id: &LeadId, action_label: &str) -> Result<bool, StoreError>;
    fn task_status_counts(&self) -> Result<BTreeMap<TaskStatus, usize>, StoreError>;
    fn overdue_task_count(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
    fn tasks_created_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>, StoreError>;
    fn purge_finished_tasks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    // Sequences
    fn insert_sequence(&self, sequence: Sequence) -> Result<(), StoreError>;
    fn sequence(&self, id: &SequenceId) -> Result<Option<Sequence>, StoreError>;
    fn update_sequence(&self, sequence: Sequence) -> Result<(), StoreError>;
    fn active_sequence_for(&self, lead_id: &LeadId) -> Result<Option<Sequence>, StoreError>;

    // Calls
    fn insert_call(&self, call: Call) -> Result<(), StoreError>;
    fn call(&self, id: &CallId) -> Result<Option<Call>, StoreError>;
    fn update_call(&self, call: Call) -> Result<(), StoreError>;
    /// Count of the owner's non-cancelled calls scheduled on or after
    /// `month_start`. Completed calls count toward the cap.
    fn monthly_call_count(
        &self,
        owner: &OwnerId,
        month_start: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound contact delivery capability (email today, voice later). Delivery
/// mechanics are the implementation's concern; the engine only hands over a
/// fully composed dispatch keyed by sequence id + step so retries stay
/// idempotent on the channel side.
pub trait ContactChannel: Send + Sync {
    fn send_email(&self, dispatch: EmailDispatch) -> Result<DispatchReceipt, ContactError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDispatch {
    pub sequence_id: SequenceId,
    pub step_number: u32,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("contact transport unavailable: {0}")]
    Transport(String),
}

/// User-facing alert hook (sales-team notifications, reminders, failure
/// escalations).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WarmLeadReady,
    CallReminder,
    TaskFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub owner: OwnerId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
