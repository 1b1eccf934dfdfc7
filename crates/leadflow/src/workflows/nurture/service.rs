use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::calls::{self, ComplianceReport};
use super::domain::{
    Call, CallId, CallPreferences, CallPriority, CallStatus, EngagementEvent, EngagementKind,
    EngagementSummary, LandingPageId, Lead, LeadId, LeadStatus, PageMetrics, QualificationSummary,
    Sequence, SequenceId, SequenceKind, SequenceStatus, TaskId,
};
use super::queue::{CleanupKind, ReminderKind, Task, TaskAction, TaskPriority};
use super::repository::{
    ContactChannel, ContactError, EmailDispatch, Notification, NotificationKind, NotificationSink,
    NotifyError, RecordStore, StoreError,
};
use super::scoring::{
    delta_reasoning, engagement_delta, LeadContext, ScoreReport, ScoringEngine,
};
use super::sequence::{compose_step_email, SequenceBlueprint, StepOutcome};

static TASK_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SEQUENCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static CALL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(format!(
        "task-{:06}",
        TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}

fn next_sequence_id() -> SequenceId {
    SequenceId(format!(
        "seq-{:06}",
        SEQUENCE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}

fn next_call_id() -> CallId {
    CallId(format!(
        "call-{:06}",
        CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Service composing the record store, scoring engine, contact channel, and
/// notification sink. All promotion and orchestration side effects run
/// through here; the queue processor delegates its typed handlers to these
/// methods.
pub struct LeadAutomationService<S, C, N> {
    store: Arc<S>,
    contact: Arc<C>,
    notifications: Arc<N>,
    engine: ScoringEngine,
}

impl<S, C, N> LeadAutomationService<S, C, N>
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, contact: Arc<C>, notifications: Arc<N>, engine: ScoringEngine) -> Self {
        Self {
            store,
            contact,
            notifications,
            engine,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn load_lead(&self, lead_id: &LeadId) -> Result<Lead, AutomationError> {
        self.store
            .lead(lead_id)?
            .ok_or_else(|| AutomationError::LeadNotFound(lead_id.clone()))
    }

    fn lead_context(&self, lead_id: &LeadId) -> Result<LeadContext, AutomationError> {
        let lead = self.load_lead(lead_id)?;
        let engagement = self.store.engagement_for(lead_id)?;
        let landing_page = self.store.landing_page_for(lead_id)?;
        let sequence = self.store.active_sequence_for(lead_id)?;
        Ok(LeadContext {
            lead,
            engagement,
            landing_page,
            sequence,
        })
    }

    /// Full weighted rescore. Persists the score and qualification level and
    /// applies the warm-promotion side effects when the threshold is crossed.
    pub fn score_lead(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<ScoreReport, AutomationError> {
        let ctx = self.lead_context(lead_id)?;
        let report = self.engine.evaluate(&ctx, now);

        let mut lead = ctx.lead;
        lead.score = report.total_score;
        lead.qualification_level = report.level;
        lead.last_scored_at = Some(now);

        let promoting = self.engine.promotes(&report) && lead.status != LeadStatus::Converted;
        if promoting {
            lead.status = LeadStatus::Warm;
            lead.ready_for_call = true;
        }
        self.store.update_lead(lead)?;

        if promoting {
            self.enqueue_promotion_tasks(lead_id, &report, now)?;
        }

        Ok(report)
    }

    /// Promotion task creation is idempotent per lead: a retried score update
    /// must not produce a duplicate call task.
    fn enqueue_promotion_tasks(
        &self,
        lead_id: &LeadId,
        report: &ScoreReport,
        now: DateTime<Utc>,
    ) -> Result<(), AutomationError> {
        if self.store.open_task_exists(lead_id, "schedule_call")? {
            return Ok(());
        }

        let priority = if self.engine.call_priority_is_high(report.total_score) {
            TaskPriority::High
        } else {
            TaskPriority::Medium
        };
        let call_at = now + Duration::hours(self.engine.config().promotion_call_delay_hours);

        self.store.enqueue_task(Task::new(
            next_task_id(),
            TaskAction::ScheduleCall {
                lead_id: lead_id.clone(),
                call_preferences: None,
            },
            call_at,
            priority,
            now,
        ))?;

        self.store.enqueue_task(Task::new(
            next_task_id(),
            TaskAction::WarmLeadNotification {
                lead_id: lead_id.clone(),
                qualification: QualificationSummary {
                    score: report.total_score,
                    level: report.level,
                    assessment: report.assessment.clone(),
                },
            },
            now,
            priority,
            now,
        ))?;

        info!(lead = %lead_id, score = report.total_score, "lead promoted to warm status");
        Ok(())
    }

    /// Record one engagement event and apply its incremental score delta.
    /// Clicked and replied events additionally trigger a full rescore, which
    /// may promote the lead.
    pub fn record_engagement(
        &self,
        lead_id: &LeadId,
        kind: EngagementKind,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<EngagementUpdate, AutomationError> {
        let mut lead = self.load_lead(lead_id)?;

        self.store.record_engagement(EngagementEvent {
            lead_id: lead_id.clone(),
            kind,
            occurred_at,
        })?;

        let score_change = engagement_delta(kind, occurred_at, now);
        let new_score = if score_change != 0 {
            self.store.adjust_lead_score(lead_id, score_change)?
        } else {
            lead.score
        };

        lead.score = new_score;
        lead.last_engagement_at = Some(occurred_at);
        self.store.update_lead(lead)?;

        let report = match kind {
            EngagementKind::Clicked | EngagementKind::Replied => {
                Some(self.score_lead(lead_id, now)?)
            }
            _ => None,
        };

        Ok(EngagementUpdate {
            lead_id: lead_id.clone(),
            kind,
            score_change,
            new_score,
            reasoning: delta_reasoning(kind).to_string(),
            report,
        })
    }

    /// Rebuild and cache the lead's engagement rollup.
    pub fn refresh_engagement_summary(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<EngagementSummary, AutomationError> {
        let mut lead = self.load_lead(lead_id)?;
        let events = self.store.engagement_for(lead_id)?;

        let mut by_kind: BTreeMap<String, u32> = BTreeMap::new();
        for event in &events {
            *by_kind.entry(event.kind.label().to_string()).or_default() += 1;
        }
        let recent = events
            .iter()
            .filter(|event| (now - event.occurred_at).num_hours() <= 168)
            .count();

        let summary = EngagementSummary {
            total_engagements: events.len() as u32,
            by_kind,
            last_engagement_at: events.iter().map(|event| event.occurred_at).max(),
            weekly_velocity: recent as f32 / 7.0,
        };

        lead.engagement_summary = Some(summary.clone());
        self.store.update_lead(lead)?;
        Ok(summary)
    }

    /// Comprehensive review: rescore, refresh the rollup, and attach an
    /// actionable recommendation.
    pub fn qualification_review(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<LeadInsights, AutomationError> {
        let score = self.score_lead(lead_id, now)?;
        let engagement = self.refresh_engagement_summary(lead_id, now)?;
        let recommendation = recommendation_for(score.total_score).to_string();
        Ok(LeadInsights {
            score,
            engagement,
            recommendation,
        })
    }

    /// Start the tier-appropriate nurture sequence. Returns the already
    /// active sequence when one exists instead of creating a duplicate.
    pub fn start_sequence(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Sequence, AutomationError> {
        if let Some(existing) = self.store.active_sequence_for(lead_id)? {
            return Ok(existing);
        }

        let lead = self.load_lead(lead_id)?;
        let kind = SequenceKind::for_tier(lead.tier);
        let blueprint = SequenceBlueprint::for_kind(kind);

        let sequence = Sequence {
            id: next_sequence_id(),
            lead_id: lead_id.clone(),
            kind,
            current_step: 0,
            total_steps: blueprint.total_steps,
            status: SequenceStatus::Active,
            started_at: now,
            last_email_sent_at: None,
            completed_at: None,
        };
        self.store.insert_sequence(sequence.clone())?;

        // Step 1 goes out immediately.
        self.store.enqueue_task(Task::new(
            next_task_id(),
            TaskAction::SendEmail {
                sequence_id: sequence.id.clone(),
                step_number: 1,
            },
            now,
            TaskPriority::Medium,
            now,
        ))?;

        info!(lead = %lead_id, sequence = %sequence.id, kind = kind.label(), "nurture sequence started");
        Ok(sequence)
    }

    /// Send one sequence step. Idempotent on sequence id + step number: a
    /// step at or below `current_step` is reported as already sent so task
    /// retries cannot double-deliver.
    pub fn send_sequence_step(
        &self,
        sequence_id: &SequenceId,
        step: u32,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, AutomationError> {
        let mut sequence = self
            .store
            .sequence(sequence_id)?
            .ok_or_else(|| AutomationError::SequenceNotFound(sequence_id.clone()))?;

        if sequence.status == SequenceStatus::Completed || step <= sequence.current_step {
            return Ok(StepOutcome::AlreadySent { step });
        }
        if step != sequence.current_step + 1 {
            return Err(AutomationError::StepOutOfOrder {
                sequence: sequence_id.clone(),
                expected: sequence.current_step + 1,
                requested: step,
            });
        }

        let lead = self.load_lead(&sequence.lead_id)?;
        let to = lead
            .email
            .clone()
            .ok_or_else(|| AutomationError::LeadEmailMissing(lead.id.clone()))?;

        let (subject, body) = compose_step_email(sequence.kind, step, &lead);
        self.contact.send_email(EmailDispatch {
            sequence_id: sequence_id.clone(),
            step_number: step,
            to,
            subject,
            body,
        })?;

        sequence.current_step = step;
        sequence.last_email_sent_at = Some(now);

        let blueprint = SequenceBlueprint::for_kind(sequence.kind);
        let next_step = if step < sequence.total_steps {
            let next = step + 1;
            self.store.enqueue_task(Task::new(
                next_task_id(),
                TaskAction::SendEmail {
                    sequence_id: sequence_id.clone(),
                    step_number: next,
                },
                now + blueprint.delay_before_step(next),
                TaskPriority::Medium,
                now,
            ))?;
            Some(next)
        } else {
            sequence.status = SequenceStatus::Completed;
            sequence.completed_at = Some(now);
            None
        };

        let sequence_completed = sequence.status == SequenceStatus::Completed;
        self.store.update_sequence(sequence)?;

        Ok(StepOutcome::Sent {
            step,
            next_step,
            sequence_completed,
        })
    }

    /// Close out a sequence early (e.g. the lead converted). Returns false
    /// when the sequence had already completed.
    pub fn complete_sequence(
        &self,
        sequence_id: &SequenceId,
        now: DateTime<Utc>,
    ) -> Result<bool, AutomationError> {
        let mut sequence = self
            .store
            .sequence(sequence_id)?
            .ok_or_else(|| AutomationError::SequenceNotFound(sequence_id.clone()))?;

        if sequence.status == SequenceStatus::Completed {
            return Ok(false);
        }

        sequence.status = SequenceStatus::Completed;
        sequence.completed_at = Some(now);
        self.store.update_sequence(sequence)?;
        Ok(true)
    }

    /// Pure compliance evaluation for API callers and the scheduler.
    pub fn compliance_check(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<ComplianceReport, AutomationError> {
        let ctx = self.lead_context(lead_id)?;
        Ok(calls::compliance::check(
            &ctx.lead,
            &ctx.engagement,
            ctx.landing_page.as_ref(),
            now,
        ))
    }

    pub fn optimal_call_time(
        &self,
        lead_id: &LeadId,
        preferred: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, AutomationError> {
        let lead = self.load_lead(lead_id)?;
        let engagement = self.store.engagement_for(lead_id)?;
        Ok(calls::timing::optimal_call_time(
            &lead.contact_timezone(),
            &engagement,
            preferred,
            now,
        ))
    }

    /// Schedule a compliant warm call. The gate runs in order: qualification
    /// state, compliance check, monthly volume cap; each failure is
    /// non-retryable. Reminder tasks are created for every offset still in
    /// the future.
    pub fn schedule_warm_call(
        &self,
        lead_id: &LeadId,
        preferences: Option<CallPreferences>,
        now: DateTime<Utc>,
    ) -> Result<Call, AutomationError> {
        let ctx = self.lead_context(lead_id)?;
        let lead = &ctx.lead;

        if lead.status != LeadStatus::Warm || !lead.ready_for_call {
            return Err(AutomationError::NotCleared(lead_id.clone()));
        }

        let compliance = calls::compliance::check(
            lead,
            &ctx.engagement,
            ctx.landing_page.as_ref(),
            now,
        );
        if !compliance.compliant {
            return Err(AutomationError::Compliance {
                failed: compliance.requirements_failed,
            });
        }

        let limit = lead.tier.monthly_call_limit();
        let scheduled_this_month = self
            .store
            .monthly_call_count(&lead.owner, month_start(now))?;
        if scheduled_this_month as u32 >= limit {
            return Err(AutomationError::CallLimitReached { limit });
        }

        let preferred = preferences.and_then(|prefs| prefs.preferred_time);
        let timezone = lead.contact_timezone();
        let scheduled_at =
            calls::timing::optimal_call_time(&timezone, &ctx.engagement, preferred, now);

        let call = Call {
            id: next_call_id(),
            lead_id: lead_id.clone(),
            owner: lead.owner.clone(),
            scheduled_at,
            timezone: timezone.label,
            priority: if self.engine.call_priority_is_high(lead.score) {
                CallPriority::High
            } else {
                CallPriority::Medium
            },
            status: CallStatus::Scheduled,
            compliance,
            attempts: 0,
            max_attempts: lead.tier.max_call_attempts(),
            estimated_duration_minutes: lead.tier.call_duration_minutes(),
            outcome: None,
            cancellation_reason: None,
            created_at: now,
            completed_at: None,
        };
        self.store.insert_call(call.clone())?;

        for reminder in ReminderKind::ALL {
            let reminder_at = scheduled_at + reminder.offset();
            if reminder_at > now {
                self.store.enqueue_task(Task::new(
                    next_task_id(),
                    TaskAction::CallReminder {
                        call_id: call.id.clone(),
                        reminder,
                    },
                    reminder_at,
                    TaskPriority::Medium,
                    now,
                ))?;
            }
        }

        info!(lead = %lead_id, call = %call.id, %scheduled_at, "warm call scheduled");
        Ok(call)
    }

    pub fn start_call(&self, call_id: &CallId) -> Result<Call, AutomationError> {
        let mut call = self.load_call(call_id)?;
        match call.status {
            CallStatus::Scheduled => {
                call.status = CallStatus::InProgress;
                call.attempts += 1;
                self.store.update_call(call.clone())?;
                Ok(call)
            }
            from => Err(AutomationError::InvalidCallTransition {
                call: call_id.clone(),
                from,
            }),
        }
    }

    pub fn complete_call(
        &self,
        call_id: &CallId,
        outcome: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Call, AutomationError> {
        let mut call = self.load_call(call_id)?;
        match call.status {
            CallStatus::Scheduled | CallStatus::InProgress => {
                call.status = CallStatus::Completed;
                call.outcome = outcome;
                call.completed_at = Some(now);
                self.store.update_call(call.clone())?;
                Ok(call)
            }
            from => Err(AutomationError::InvalidCallTransition {
                call: call_id.clone(),
                from,
            }),
        }
    }

    pub fn cancel_call(
        &self,
        call_id: &CallId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Call, AutomationError> {
        let mut call = self.load_call(call_id)?;
        match call.status {
            CallStatus::Cancelled => Ok(call),
            CallStatus::Scheduled | CallStatus::InProgress => {
                call.status = CallStatus::Cancelled;
                call.cancellation_reason = reason;
                call.completed_at = Some(now);
                self.store.update_call(call.clone())?;
                Ok(call)
            }
            from => Err(AutomationError::InvalidCallTransition {
                call: call_id.clone(),
                from,
            }),
        }
    }

    fn load_call(&self, call_id: &CallId) -> Result<Call, AutomationError> {
        self.store
            .call(call_id)?
            .ok_or_else(|| AutomationError::CallNotFound(call_id.clone()))
    }

    /// Push an upcoming-call reminder to the owner.
    pub fn send_call_reminder(
        &self,
        call_id: &CallId,
        reminder: ReminderKind,
        _now: DateTime<Utc>,
    ) -> Result<(), AutomationError> {
        let call = self.load_call(call_id)?;
        let lead = self.load_lead(&call.lead_id)?;

        let display = match lead.company.as_deref() {
            Some(company) => format!("{} from {company}", lead.full_name()),
            None => lead.full_name(),
        };
        let message = reminder
            .message_template()
            .replace("{name}", &display);

        self.notifications.notify(Notification {
            owner: call.owner.clone(),
            kind: NotificationKind::CallReminder,
            title: format!("Call Reminder - {}", reminder.label()),
            message,
        })?;
        Ok(())
    }

    /// Urgent alert that a lead is qualified and ready for contact.
    pub fn notify_warm_lead(
        &self,
        lead_id: &LeadId,
        qualification: &QualificationSummary,
    ) -> Result<(), AutomationError> {
        let lead = self.load_lead(lead_id)?;
        let company = lead.company.as_deref().unwrap_or("an unknown company");

        self.notifications.notify(Notification {
            owner: lead.owner.clone(),
            kind: NotificationKind::WarmLeadReady,
            title: "New Warm Lead Ready for Contact".to_string(),
            message: format!(
                "{} from {company} is qualified and ready for immediate contact. Score: {}/100",
                lead.full_name(),
                qualification.score
            ),
        })?;
        Ok(())
    }

    /// Escalate a permanently failed task for manual follow-up.
    pub fn notify_task_failure(&self, task: &Task, error: &str) -> Result<(), AutomationError> {
        let owner = task
            .action
            .lead_id()
            .map(|lead_id| self.load_lead(lead_id))
            .transpose()?
            .map(|lead| lead.owner);

        if let Some(owner) = owner {
            self.notifications.notify(Notification {
                owner,
                kind: NotificationKind::TaskFailed,
                title: format!("Automation task failed - {}", task.action.label()),
                message: format!(
                    "Task {} exhausted its retry budget: {error}",
                    task.id
                ),
            })?;
        }
        Ok(())
    }

    /// Refresh a landing page's performance snapshot.
    pub fn refresh_landing_page_metrics(
        &self,
        page_id: &LandingPageId,
        now: DateTime<Utc>,
    ) -> Result<PageMetrics, AutomationError> {
        let mut page = self
            .store
            .landing_page(page_id)?
            .ok_or_else(|| AutomationError::LandingPageNotFound(page_id.clone()))?;

        let metrics = PageMetrics {
            views: page.views,
            conversions: page.conversions,
            conversion_rate: if page.views > 0 {
                page.conversions as f32 / page.views as f32
            } else {
                0.0
            },
            refreshed_at: now,
        };
        page.metrics = Some(metrics.clone());
        self.store.upsert_landing_page(page)?;
        Ok(metrics)
    }

    /// Retention purge. Returns the number of records removed.
    pub fn cleanup_expired_data(
        &self,
        cleanup: CleanupKind,
        days_old: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, AutomationError> {
        let cutoff = now - Duration::days(days_old as i64);
        let removed = match cleanup {
            CleanupKind::CompletedTasks => self.store.purge_finished_tasks_before(cutoff)?,
            CleanupKind::EngagementEvents => self.store.purge_engagement_before(cutoff)?,
        };
        Ok(removed)
    }
}

/// First instant of the calendar month containing `now`.
pub(crate) fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month is a valid instant")
}

const fn recommendation_for(score: u8) -> &'static str {
    if score >= 80 {
        "Schedule call within 4 hours - lead is hot and ready to convert"
    } else if score >= 60 {
        "Increase email frequency and provide more targeted content"
    } else if score >= 40 {
        "Place in long-term nurture sequence, re-evaluate in 30 days"
    } else {
        "Consider removing from active sequences or updating qualification criteria"
    }
}

/// Result of recording a single engagement event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementUpdate {
    pub lead_id: LeadId,
    pub kind: EngagementKind,
    pub score_change: i32,
    pub new_score: u8,
    pub reasoning: String,
    /// Present when the event triggered a full rescore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ScoreReport>,
}

/// Qualification-review output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadInsights {
    pub score: ScoreReport,
    pub engagement: EngagementSummary,
    pub recommendation: String,
}

/// Error raised by the automation service. `is_retryable` separates
/// transient downstream failures from requests that can never succeed, so
/// the queue processor does not burn retry budget on the latter.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("sequence {0} not found")]
    SequenceNotFound(SequenceId),
    #[error("call {0} not found")]
    CallNotFound(CallId),
    #[error("landing page {0} not found")]
    LandingPageNotFound(LandingPageId),
    #[error("lead {0} has no email address on file")]
    LeadEmailMissing(LeadId),
    #[error("lead {0} is not cleared for calling - must be warm and ready")]
    NotCleared(LeadId),
    #[error("sequence {sequence} expected step {expected}, got {requested}")]
    StepOutOfOrder {
        sequence: SequenceId,
        expected: u32,
        requested: u32,
    },
    #[error("call {call} cannot transition from {}", from.label())]
    InvalidCallTransition { call: CallId, from: CallStatus },
    #[error("compliance check failed: {}", failed.join("; "))]
    Compliance { failed: Vec<String> },
    #[error("monthly call limit reached ({limit})")]
    CallLimitReached { limit: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl AutomationError {
    /// Only downstream transport failures are worth retrying; everything
    /// else is a terminal answer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutomationError::Store(StoreError::Unavailable(_))
                | AutomationError::Contact(_)
                | AutomationError::Notify(_)
        )
    }
}
