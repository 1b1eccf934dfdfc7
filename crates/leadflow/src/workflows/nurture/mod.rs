//! Lead nurture automation: scoring and qualification, tier-based email
//! sequences, compliance-gated call scheduling, and the scheduled-task
//! processor that drives all of it.
//!
//! The record store is the single source of truth; components hold no state
//! between processor invocations. Side-effecting handlers are idempotent on
//! stable keys so at-least-once dispatch is safe.

pub mod calls;
pub mod domain;
pub mod queue;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod sequence;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use calls::{compliance_check, optimal_call_time, ComplianceReport};
pub use domain::{
    Call, CallId, CallPreferences, CallPriority, CallStatus, CompanySize, ContactTimezone,
    EngagementEvent, EngagementKind, EngagementSummary, LandingPageActivity, LandingPageId, Lead,
    LeadId, LeadStatus, OwnerId, PageMetrics, QualificationLevel, QualificationSummary, Sequence,
    SequenceId, SequenceKind, SequenceStatus, SubscriptionTier, TaskId,
};
pub use queue::{
    BatchReport, CleanupKind, QueueStatus, ReminderKind, SequenceProgressionAction, StatusCounts,
    Task, TaskAction, TaskDisposition, TaskPriority, TaskQueueProcessor, TaskReport,
    TaskStatistics, TaskStatus,
};
pub use repository::{
    ContactChannel, ContactError, DispatchReceipt, EmailDispatch, Notification, NotificationKind,
    NotificationSink, NotifyError, RecordStore, StoreError,
};
pub use router::nurture_router;
pub use scoring::{
    engagement_delta, LeadContext, ScoreBreakdown, ScoreReport, ScoringConfig, ScoringEngine,
};
pub use sequence::{SequenceBlueprint, StepOutcome};
pub use service::{AutomationError, EngagementUpdate, LeadAutomationService, LeadInsights};
pub use store::MemoryRecordStore;
