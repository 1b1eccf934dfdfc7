use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(LeadId);
id_newtype!(OwnerId);
id_newtype!(TaskId);
id_newtype!(SequenceId);
id_newtype!(CallId);
id_newtype!(LandingPageId);

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Cold,
    Contacted,
    Qualified,
    Warm,
    Converted,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Warm => "warm",
            Self::Converted => "converted",
        }
    }
}

/// Discrete banding of a lead's score that drives nurture and promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationLevel {
    Cold,
    Cool,
    Lukewarm,
    Warm,
}

impl QualificationLevel {
    /// Fixed thresholds: <25 cold, 25-49 cool, 50-74 lukewarm, >=75 warm.
    pub const fn from_score(score: u8) -> Self {
        if score >= 75 {
            Self::Warm
        } else if score >= 50 {
            Self::Lukewarm
        } else if score >= 25 {
            Self::Cool
        } else {
            Self::Cold
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Cool => "cool",
            Self::Lukewarm => "lukewarm",
            Self::Warm => "warm",
        }
    }
}

/// Subscription tier of the lead's owning account. Drives sequence depth and
/// monthly call allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Starter,
    Growth,
    Scale,
    Enterprise,
}

impl SubscriptionTier {
    pub const fn monthly_call_limit(self) -> u32 {
        match self {
            Self::Starter => 10,
            Self::Growth => 75,
            Self::Scale => 175,
            Self::Enterprise => 1000,
        }
    }

    pub const fn max_call_attempts(self) -> u32 {
        match self {
            Self::Starter => 2,
            Self::Growth | Self::Scale => 3,
            Self::Enterprise => 5,
        }
    }

    pub const fn call_duration_minutes(self) -> u32 {
        match self {
            Self::Starter => 15,
            Self::Growth => 30,
            Self::Scale => 45,
            Self::Enterprise => 60,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Scale => "scale",
            Self::Enterprise => "enterprise",
        }
    }
}

/// Company headcount banding reported by the sourcing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Micro,
    Small,
    Medium,
    Enterprise,
}

/// Pre-resolved contact timezone. Resolution from free-text locations is an
/// upstream collaborator's responsibility; the engine only consumes the
/// resolved offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactTimezone {
    pub label: String,
    pub utc_offset_minutes: i32,
}

impl ContactTimezone {
    pub fn new(label: impl Into<String>, utc_offset_minutes: i32) -> Self {
        Self {
            label: label.into(),
            utc_offset_minutes,
        }
    }

    pub fn fixed_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

impl Default for ContactTimezone {
    fn default() -> Self {
        Self::new("America/New_York", -300)
    }
}

/// Prospective-customer record owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub owner: OwnerId,
    pub tier: SubscriptionTier,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<CompanySize>,
    pub linkedin_url: Option<String>,
    pub location: Option<String>,
    pub timezone: Option<ContactTimezone>,
    pub status: LeadStatus,
    pub score: u8,
    pub qualification_level: QualificationLevel,
    pub ready_for_call: bool,
    pub last_engagement_at: Option<DateTime<Utc>>,
    pub last_scored_at: Option<DateTime<Utc>>,
    pub engagement_summary: Option<EngagementSummary>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => "Unknown contact".to_string(),
        }
    }

    pub fn contact_timezone(&self) -> ContactTimezone {
        self.timezone.clone().unwrap_or_default()
    }
}

/// Kind of recorded engagement. Append-only history; never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Opened,
    Clicked,
    Replied,
    PageView,
    FormSubmit,
    Download,
    VideoWatch,
    Unsubscribed,
    Forwarded,
}

impl EngagementKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Clicked => "clicked",
            Self::Replied => "replied",
            Self::PageView => "page_view",
            Self::FormSubmit => "form_submit",
            Self::Download => "download",
            Self::VideoWatch => "video_watch",
            Self::Unsubscribed => "unsubscribed",
            Self::Forwarded => "forwarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub lead_id: LeadId,
    pub kind: EngagementKind,
    pub occurred_at: DateTime<Utc>,
}

/// Cached rollup of a lead's engagement history, refreshed by the
/// engagement-check task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub total_engagements: u32,
    pub by_kind: BTreeMap<String, u32>,
    pub last_engagement_at: Option<DateTime<Utc>>,
    /// Engagements per day over the trailing week.
    pub weekly_velocity: f32,
}

/// Landing-page activity attributed to a lead; input to scoring and the
/// compliance opt-in signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingPageActivity {
    pub id: LandingPageId,
    pub lead_id: LeadId,
    pub views: u32,
    pub conversions: u32,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub metrics: Option<PageMetrics>,
}

/// Refreshed performance snapshot produced by the analytics task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub views: u32,
    pub conversions: u32,
    pub conversion_rate: f32,
    pub refreshed_at: DateTime<Utc>,
}

/// Tier-derived nurture sequence flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    BasicNurture,
    AdvancedNurture,
    PremiumNurture,
    CustomNurture,
}

impl SequenceKind {
    pub const fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Starter => Self::BasicNurture,
            SubscriptionTier::Growth => Self::AdvancedNurture,
            SubscriptionTier::Scale => Self::PremiumNurture,
            SubscriptionTier::Enterprise => Self::CustomNurture,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::BasicNurture => "basic_nurture",
            Self::AdvancedNurture => "advanced_nurture",
            Self::PremiumNurture => "premium_nurture",
            Self::CustomNurture => "custom_nurture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    Active,
    Completed,
}

/// Per-lead nurture sequence progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub lead_id: LeadId,
    pub kind: SequenceKind,
    pub current_step: u32,
    pub total_steps: u32,
    pub status: SequenceStatus,
    pub started_at: DateTime<Utc>,
    pub last_email_sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl CallStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPriority {
    High,
    Medium,
}

/// Scheduled outbound call, created only behind a passing compliance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub lead_id: LeadId,
    pub owner: OwnerId,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub priority: CallPriority,
    pub status: CallStatus,
    pub compliance: crate::workflows::nurture::calls::ComplianceReport,
    pub attempts: u32,
    pub max_attempts: u32,
    pub estimated_duration_minutes: u32,
    pub outcome: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Caller-supplied scheduling preferences for a warm call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallPreferences {
    pub preferred_time: Option<DateTime<Utc>>,
}

/// Snapshot passed along with warm-lead notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationSummary {
    pub score: u8,
    pub level: QualificationLevel,
    pub assessment: String,
}
