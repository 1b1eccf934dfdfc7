mod task;

pub use task::{
    CleanupKind, ReminderKind, SequenceProgressionAction, Task, TaskAction, TaskPriority,
    TaskStatus, DEFAULT_MAX_RETRIES,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::domain::TaskId;
use super::repository::{ContactChannel, NotificationSink, RecordStore, StoreError};
use super::sequence::StepOutcome;
use super::service::{AutomationError, LeadAutomationService};
use crate::config::EngineConfig;

/// Poll-style batch executor over the scheduled-task table. Holds no state
/// between invocations; the record store is the single source of truth.
pub struct TaskQueueProcessor<S, C, N> {
    store: Arc<S>,
    service: Arc<LeadAutomationService<S, C, N>>,
    config: EngineConfig,
}

impl<S, C, N> Clone for TaskQueueProcessor<S, C, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            service: self.service.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, C, N> TaskQueueProcessor<S, C, N>
where
    S: RecordStore + 'static,
    C: ContactChannel + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        service: Arc<LeadAutomationService<S, C, N>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            service,
            config,
        }
    }

    pub fn service(&self) -> &Arc<LeadAutomationService<S, C, N>> {
        &self.service
    }

    /// Dispatch one batch of due tasks with bounded fan-out. Every task's
    /// outcome is captured independently; one failure never aborts siblings.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<BatchReport, StoreError> {
        let due = self.store.due_tasks(now, self.config.queue_batch_size)?;
        if due.is_empty() {
            return Ok(BatchReport::default());
        }

        info!(count = due.len(), "processing due tasks");

        let semaphore = Arc::new(Semaphore::new(self.config.dispatch_width));
        let mut join_set: JoinSet<TaskReport> = JoinSet::new();

        for task in due {
            let semaphore = semaphore.clone();
            let processor = self.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                processor.run_claimed(task, now)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => report.push(outcome),
                Err(err) => {
                    error!(%err, "task dispatch panicked");
                    report.panicked += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            retried = report.retried,
            "task batch finished"
        );
        Ok(report)
    }

    /// Process one task by id, on demand.
    pub async fn process_task(
        &self,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskReport, AutomationError> {
        let task = self
            .store
            .task(task_id)?
            .ok_or_else(|| AutomationError::TaskNotFound(task_id.clone()))?;
        Ok(self.run_claimed(task, now))
    }

    /// Claim and execute. A lost claim means another invocation owns the
    /// task; that is a skip, not an error.
    fn run_claimed(&self, task: Task, now: DateTime<Utc>) -> TaskReport {
        match self.store.claim_task(&task.id, now) {
            Ok(true) => {}
            Ok(false) => {
                return TaskReport {
                    task_id: task.id,
                    action: task.action.label(),
                    disposition: TaskDisposition::Skipped,
                    detail: Some("task was not pending at claim time".to_string()),
                };
            }
            Err(err) => {
                return TaskReport {
                    task_id: task.id,
                    action: task.action.label(),
                    disposition: TaskDisposition::Failed,
                    detail: Some(format!("claim failed: {err}")),
                };
            }
        }

        let mut claimed = task;
        claimed.status = TaskStatus::InProgress;
        claimed.started_at = Some(now);

        match self.dispatch(&claimed, now) {
            Ok(result) => self.finish_completed(claimed, result, now),
            Err(err) => self.finish_failed(claimed, err, now),
        }
    }

    /// Exhaustive typed dispatch. Adding a task type without a handler is a
    /// compile error.
    fn dispatch(&self, task: &Task, now: DateTime<Utc>) -> Result<Value, AutomationError> {
        match &task.action {
            TaskAction::SendEmail {
                sequence_id,
                step_number,
            } => {
                let outcome = self
                    .service
                    .send_sequence_step(sequence_id, *step_number, now)?;
                let already_sent = matches!(outcome, StepOutcome::AlreadySent { .. });
                Ok(json!({
                    "email_sent": !already_sent,
                    "step": step_number,
                    "outcome": outcome,
                }))
            }
            TaskAction::ScheduleCall {
                lead_id,
                call_preferences,
            } => {
                let call = self
                    .service
                    .schedule_warm_call(lead_id, call_preferences.clone(), now)?;
                Ok(json!({
                    "call_scheduled": true,
                    "call_id": call.id,
                    "scheduled_at": call.scheduled_at,
                }))
            }
            TaskAction::ScoreUpdate { lead_id } => {
                let report = self.service.score_lead(lead_id, now)?;
                Ok(json!({ "score_updated": true, "report": report }))
            }
            TaskAction::EngagementCheck { lead_id } => {
                let summary = self.service.refresh_engagement_summary(lead_id, now)?;
                Ok(json!({ "engagement_checked": true, "summary": summary }))
            }
            TaskAction::QualificationReview { lead_id } => {
                let insights = self.service.qualification_review(lead_id, now)?;
                Ok(json!({ "qualification_reviewed": true, "insights": insights }))
            }
            TaskAction::CallReminder { call_id, reminder } => {
                self.service.send_call_reminder(call_id, *reminder, now)?;
                Ok(json!({ "reminder_sent": true, "type": reminder.label() }))
            }
            TaskAction::WarmLeadNotification {
                lead_id,
                qualification,
            } => {
                self.service.notify_warm_lead(lead_id, qualification)?;
                Ok(json!({ "notification_sent": true }))
            }
            TaskAction::SequenceProgression {
                sequence_id,
                action,
            } => match action {
                SequenceProgressionAction::Advance => {
                    let sequence = self
                        .store
                        .sequence(sequence_id)?
                        .ok_or_else(|| AutomationError::SequenceNotFound(sequence_id.clone()))?;
                    let outcome = self.service.send_sequence_step(
                        sequence_id,
                        sequence.current_step + 1,
                        now,
                    )?;
                    Ok(json!({ "sequence_progressed": true, "outcome": outcome }))
                }
                SequenceProgressionAction::Complete => {
                    let transitioned = self.service.complete_sequence(sequence_id, now)?;
                    Ok(json!({ "sequence_completed": transitioned }))
                }
            },
            TaskAction::LandingPageAnalytics { landing_page_id } => {
                let metrics = self
                    .service
                    .refresh_landing_page_metrics(landing_page_id, now)?;
                Ok(json!({ "analytics_updated": true, "metrics": metrics }))
            }
            TaskAction::CleanupExpiredData { cleanup, days_old } => {
                let removed = self
                    .service
                    .cleanup_expired_data(*cleanup, *days_old, now)?;
                Ok(json!({ "cleanup_completed": true, "records_removed": removed }))
            }
        }
    }

    fn finish_completed(&self, mut task: Task, result: Value, now: DateTime<Utc>) -> TaskReport {
        task.status = TaskStatus::Completed;
        task.finished_at = Some(now);
        task.last_error = None;

        let detail = result.to_string();
        if let Err(err) = self.store.update_task(task.clone()) {
            error!(task = %task.id, %err, "failed to persist completed task");
        }

        TaskReport {
            task_id: task.id,
            action: task.action.label(),
            disposition: TaskDisposition::Completed,
            detail: Some(detail),
        }
    }

    /// Retry policy: transient errors back off exponentially until the
    /// budget runs out; non-retryable errors fail terminally on the spot.
    fn finish_failed(&self, mut task: Task, err: AutomationError, now: DateTime<Utc>) -> TaskReport {
        let message = err.to_string();

        if err.is_retryable() && task.retry_count < task.max_retries {
            let delay = Task::backoff_delay(task.retry_count);
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.scheduled_at = now + delay;
            task.started_at = None;
            task.last_error = Some(message.clone());

            warn!(
                task = %task.id,
                retry = task.retry_count,
                max = task.max_retries,
                delay_minutes = delay.num_minutes(),
                "task failed, scheduling retry"
            );
            if let Err(store_err) = self.store.update_task(task.clone()) {
                error!(task = %task.id, %store_err, "failed to persist retry");
            }

            return TaskReport {
                task_id: task.id,
                action: task.action.label(),
                disposition: TaskDisposition::Retrying,
                detail: Some(message),
            };
        }

        task.status = TaskStatus::Failed;
        task.finished_at = Some(now);
        task.last_error = Some(message.clone());

        error!(task = %task.id, %message, "task permanently failed");
        if let Err(store_err) = self.store.update_task(task.clone()) {
            error!(task = %task.id, %store_err, "failed to persist terminal failure");
        }
        if let Err(notify_err) = self.service.notify_task_failure(&task, &message) {
            warn!(task = %task.id, %notify_err, "failure escalation could not be delivered");
        }

        TaskReport {
            task_id: task.id,
            action: task.action.label(),
            disposition: TaskDisposition::Failed,
            detail: Some(message),
        }
    }

    /// Aggregate queue health: counts by status plus overdue pending tasks.
    pub fn queue_status(&self, now: DateTime<Utc>) -> Result<QueueStatus, StoreError> {
        let counts = self.store.task_status_counts()?;
        let by_status = StatusCounts {
            pending: *counts.get(&TaskStatus::Pending).unwrap_or(&0),
            in_progress: *counts.get(&TaskStatus::InProgress).unwrap_or(&0),
            completed: *counts.get(&TaskStatus::Completed).unwrap_or(&0),
            failed: *counts.get(&TaskStatus::Failed).unwrap_or(&0),
            cancelled: *counts.get(&TaskStatus::Cancelled).unwrap_or(&0),
        };

        Ok(QueueStatus {
            total_tasks: counts.values().sum(),
            by_status,
            overdue_tasks: self.store.overdue_task_count(now)?,
        })
    }

    /// Manual operator retry of a terminally failed task. Resets the retry
    /// budget and returns the task to the pending pool.
    pub fn retry_failed(&self, task_id: &TaskId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.store.reset_failed_task(task_id, now)
    }

    /// Cancel a task that has not been claimed yet.
    pub fn cancel(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        self.store.cancel_task(task_id)
    }

    /// Drop completed/failed tasks older than the retention window.
    pub fn cleanup_finished(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = now - Duration::days(self.config.task_retention_days);
        self.store.purge_finished_tasks_before(cutoff)
    }

    /// Seven-day activity summary for operational dashboards.
    pub fn statistics(&self, now: DateTime<Utc>) -> Result<TaskStatistics, StoreError> {
        let recent = self.store.tasks_created_since(now - Duration::days(7))?;

        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for task in &recent {
            *by_type.entry(task.action.label().to_string()).or_default() += 1;
            *by_status
                .entry(task.status.label().to_string())
                .or_default() += 1;
        }

        let completed = *by_status.get("completed").unwrap_or(&0);
        let failed = *by_status.get("failed").unwrap_or(&0);
        let finished = completed + failed;
        let success_rate = if finished > 0 {
            ((completed as f64 / finished as f64) * 100.0).round() as u8
        } else {
            100
        };

        Ok(TaskStatistics {
            total_week: recent.len(),
            by_type,
            by_status,
            success_rate,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDisposition {
    Completed,
    Failed,
    Retrying,
    Skipped,
}

/// Per-task outcome captured during a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub action: &'static str,
    pub disposition: TaskDisposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Batch rollup returned from one processor invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retried: usize,
    pub skipped: usize,
    pub panicked: usize,
    pub outcomes: Vec<TaskReport>,
}

impl BatchReport {
    fn push(&mut self, outcome: TaskReport) {
        self.processed += 1;
        match outcome.disposition {
            TaskDisposition::Completed => self.succeeded += 1,
            TaskDisposition::Failed => self.failed += 1,
            TaskDisposition::Retrying => self.retried += 1,
            TaskDisposition::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Queue-depth summary shape consumed by operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total_tasks: usize,
    pub by_status: StatusCounts,
    pub overdue_tasks: usize,
}

/// Rolling seven-day throughput statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total_week: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub success_rate: u8,
}
