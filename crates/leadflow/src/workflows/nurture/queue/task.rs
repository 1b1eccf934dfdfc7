use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::nurture::domain::{
    CallId, CallPreferences, LandingPageId, LeadId, QualificationSummary, SequenceId, TaskId,
};

/// Scheduling priority. Higher ranks dispatch first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and failed are resting states eligible for retention
    /// cleanup; failed is terminal for automatic dispatch.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Reminder offsets relative to a call's scheduled time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    TwoHour,
    FifteenMinute,
}

impl ReminderKind {
    pub const ALL: [Self; 3] = [Self::DayBefore, Self::TwoHour, Self::FifteenMinute];

    pub fn offset(self) -> Duration {
        match self {
            Self::DayBefore => Duration::hours(-24),
            Self::TwoHour => Duration::hours(-2),
            Self::FifteenMinute => Duration::minutes(-15),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DayBefore => "24_hour_reminder",
            Self::TwoHour => "2_hour_reminder",
            Self::FifteenMinute => "15_minute_reminder",
        }
    }

    pub const fn message_template(self) -> &'static str {
        match self {
            Self::DayBefore => "You have a call scheduled with {name} in 24 hours",
            Self::TwoHour => "Upcoming call with {name} in 2 hours - prepare your materials",
            Self::FifteenMinute => "Call with {name} starting in 15 minutes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceProgressionAction {
    Advance,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupKind {
    CompletedTasks,
    EngagementEvents,
}

/// Typed task payload. Adding or removing a task type is a compile-time
/// visible change; dispatch matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAction {
    SendEmail {
        sequence_id: SequenceId,
        step_number: u32,
    },
    ScheduleCall {
        lead_id: LeadId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_preferences: Option<CallPreferences>,
    },
    ScoreUpdate {
        lead_id: LeadId,
    },
    EngagementCheck {
        lead_id: LeadId,
    },
    QualificationReview {
        lead_id: LeadId,
    },
    CallReminder {
        call_id: CallId,
        reminder: ReminderKind,
    },
    WarmLeadNotification {
        lead_id: LeadId,
        qualification: QualificationSummary,
    },
    SequenceProgression {
        sequence_id: SequenceId,
        action: SequenceProgressionAction,
    },
    LandingPageAnalytics {
        landing_page_id: LandingPageId,
    },
    CleanupExpiredData {
        cleanup: CleanupKind,
        days_old: u32,
    },
}

impl TaskAction {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SendEmail { .. } => "send_email",
            Self::ScheduleCall { .. } => "schedule_call",
            Self::ScoreUpdate { .. } => "score_update",
            Self::EngagementCheck { .. } => "engagement_check",
            Self::QualificationReview { .. } => "qualification_review",
            Self::CallReminder { .. } => "call_reminder",
            Self::WarmLeadNotification { .. } => "warm_lead_notification",
            Self::SequenceProgression { .. } => "sequence_progression",
            Self::LandingPageAnalytics { .. } => "landing_page_analytics",
            Self::CleanupExpiredData { .. } => "cleanup_expired_data",
        }
    }

    /// Lead the payload references directly, when there is one.
    pub fn lead_id(&self) -> Option<&LeadId> {
        match self {
            Self::ScheduleCall { lead_id, .. }
            | Self::ScoreUpdate { lead_id }
            | Self::EngagementCheck { lead_id }
            | Self::QualificationReview { lead_id }
            | Self::WarmLeadNotification { lead_id, .. } => Some(lead_id),
            Self::SendEmail { .. }
            | Self::CallReminder { .. }
            | Self::SequenceProgression { .. }
            | Self::LandingPageAnalytics { .. }
            | Self::CleanupExpiredData { .. } => None,
        }
    }
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Generic unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub action: TaskAction,
    pub scheduled_at: DateTime<Utc>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        action: TaskAction,
        scheduled_at: DateTime<Utc>,
        priority: TaskPriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            action,
            scheduled_at,
            priority,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_error: None,
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Backoff before retry attempt `n` (0-indexed): 2^n minutes.
    pub fn backoff_delay(retry_count: u32) -> Duration {
        Duration::minutes(1i64 << retry_count.min(30))
    }
}
