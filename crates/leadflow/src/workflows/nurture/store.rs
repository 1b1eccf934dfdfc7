use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    Call, CallId, CallStatus, EngagementEvent, LandingPageActivity, LandingPageId, Lead, LeadId,
    OwnerId, Sequence, SequenceId, SequenceStatus, TaskId,
};
use super::queue::{Task, TaskStatus};
use super::repository::{RecordStore, StoreError};

#[derive(Default)]
struct Records {
    leads: HashMap<LeadId, Lead>,
    engagement: Vec<EngagementEvent>,
    landing_pages: HashMap<LandingPageId, LandingPageActivity>,
    tasks: HashMap<TaskId, Task>,
    sequences: HashMap<SequenceId, Sequence>,
    calls: HashMap<CallId, Call>,
}

/// In-process reference implementation of `RecordStore`. Conditional
/// transitions and the score increment run under a single mutex, which is
/// what makes them atomic with respect to concurrent processor invocations.
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryRecordStore {
    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().expect("record store mutex poisoned")
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert_lead(&self, lead: Lead) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict);
        }
        guard.leads.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.lock().leads.get(id).cloned())
    }

    fn update_lead(&self, lead: Lead) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.leads.contains_key(&lead.id) {
            return Err(StoreError::NotFound);
        }
        guard.leads.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn adjust_lead_score(&self, id: &LeadId, delta: i32) -> Result<u8, StoreError> {
        let mut guard = self.lock();
        let lead = guard.leads.get_mut(id).ok_or(StoreError::NotFound)?;
        let adjusted = (lead.score as i32 + delta).clamp(0, 100) as u8;
        lead.score = adjusted;
        Ok(adjusted)
    }

    fn record_engagement(&self, event: EngagementEvent) -> Result<(), StoreError> {
        self.lock().engagement.push(event);
        Ok(())
    }

    fn engagement_for(&self, lead_id: &LeadId) -> Result<Vec<EngagementEvent>, StoreError> {
        Ok(self
            .lock()
            .engagement
            .iter()
            .filter(|event| &event.lead_id == lead_id)
            .cloned()
            .collect())
    }

    fn purge_engagement_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        let before = guard.engagement.len();
        guard.engagement.retain(|event| event.occurred_at >= cutoff);
        Ok(before - guard.engagement.len())
    }

    fn landing_page(&self, id: &LandingPageId) -> Result<Option<LandingPageActivity>, StoreError> {
        Ok(self.lock().landing_pages.get(id).cloned())
    }

    fn landing_page_for(
        &self,
        lead_id: &LeadId,
    ) -> Result<Option<LandingPageActivity>, StoreError> {
        Ok(self
            .lock()
            .landing_pages
            .values()
            .find(|page| &page.lead_id == lead_id)
            .cloned())
    }

    fn upsert_landing_page(&self, page: LandingPageActivity) -> Result<(), StoreError> {
        self.lock().landing_pages.insert(page.id.clone(), page);
        Ok(())
    }

    fn enqueue_task(&self, task: Task) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.tasks.contains_key(&task.id) {
            return Err(StoreError::Conflict);
        }
        guard.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.get(id).cloned())
    }

    fn update_task(&self, task: Task) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.tasks.contains_key(&task.id) {
            return Err(StoreError::NotFound);
        }
        guard.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn due_tasks(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Task>, StoreError> {
        let guard = self.lock();
        let mut due: Vec<Task> = guard
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Pending && task.scheduled_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then(a.scheduled_at.cmp(&b.scheduled_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    fn claim_task(&self, id: &TaskId, started_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let task = guard.tasks.get_mut(id).ok_or(StoreError::NotFound)?;
        if task.status != TaskStatus::Pending {
            return Ok(false);
        }
        task.status = TaskStatus::InProgress;
        task.started_at = Some(started_at);
        Ok(true)
    }

    fn cancel_task(&self, id: &TaskId) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let task = guard.tasks.get_mut(id).ok_or(StoreError::NotFound)?;
        if task.status != TaskStatus::Pending {
            return Ok(false);
        }
        task.status = TaskStatus::Cancelled;
        Ok(true)
    }

    fn reset_failed_task(&self, id: &TaskId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let task = guard.tasks.get_mut(id).ok_or(StoreError::NotFound)?;
        if task.status != TaskStatus::Failed {
            return Ok(false);
        }
        task.status = TaskStatus::Pending;
        task.scheduled_at = now;
        task.retry_count = 0;
        task.last_error = None;
        task.started_at = None;
        task.finished_at = None;
        Ok(true)
    }

    fn open_task_exists(&self, lead_id: &LeadId, action_label: &str) -> Result<bool, StoreError> {
        Ok(self.lock().tasks.values().any(|task| {
            task.action.label() == action_label
                && task.action.lead_id() == Some(lead_id)
                && matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
        }))
    }

    fn task_status_counts(&self) -> Result<BTreeMap<TaskStatus, usize>, StoreError> {
        let mut counts = BTreeMap::new();
        for task in self.lock().tasks.values() {
            *counts.entry(task.status).or_default() += 1;
        }
        Ok(counts)
    }

    fn overdue_task_count(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self
            .lock()
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Pending && task.scheduled_at < now)
            .count())
    }

    fn tasks_created_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()
            .tasks
            .values()
            .filter(|task| task.created_at >= cutoff)
            .cloned()
            .collect())
    }

    fn purge_finished_tasks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut guard = self.lock();
        let before = guard.tasks.len();
        guard.tasks.retain(|_, task| {
            !(task.status.is_finished()
                && task.finished_at.map(|at| at < cutoff).unwrap_or(false))
        });
        Ok(before - guard.tasks.len())
    }

    fn insert_sequence(&self, sequence: Sequence) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.sequences.contains_key(&sequence.id) {
            return Err(StoreError::Conflict);
        }
        guard.sequences.insert(sequence.id.clone(), sequence);
        Ok(())
    }

    fn sequence(&self, id: &SequenceId) -> Result<Option<Sequence>, StoreError> {
        Ok(self.lock().sequences.get(id).cloned())
    }

    fn update_sequence(&self, sequence: Sequence) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.sequences.contains_key(&sequence.id) {
            return Err(StoreError::NotFound);
        }
        guard.sequences.insert(sequence.id.clone(), sequence);
        Ok(())
    }

    fn active_sequence_for(&self, lead_id: &LeadId) -> Result<Option<Sequence>, StoreError> {
        Ok(self
            .lock()
            .sequences
            .values()
            .find(|sequence| {
                &sequence.lead_id == lead_id && sequence.status == SequenceStatus::Active
            })
            .cloned())
    }

    fn insert_call(&self, call: Call) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.calls.contains_key(&call.id) {
            return Err(StoreError::Conflict);
        }
        guard.calls.insert(call.id.clone(), call);
        Ok(())
    }

    fn call(&self, id: &CallId) -> Result<Option<Call>, StoreError> {
        Ok(self.lock().calls.get(id).cloned())
    }

    fn update_call(&self, call: Call) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.calls.contains_key(&call.id) {
            return Err(StoreError::NotFound);
        }
        guard.calls.insert(call.id.clone(), call);
        Ok(())
    }

    fn monthly_call_count(
        &self,
        owner: &OwnerId,
        month_start: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self
            .lock()
            .calls
            .values()
            .filter(|call| {
                &call.owner == owner
                    && call.status != CallStatus::Cancelled
                    && call.scheduled_at >= month_start
            })
            .count())
    }
}
