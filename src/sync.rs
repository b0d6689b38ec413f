//! Task Sync Coordinator
//!
//! Keeps the task store within one round trip of the backend. Mutations
//! that need server confirmation always finish with
//! [`TaskSync::refresh_tasks`]; mutation responses never patch the store
//! directly.
//!
//! Failure policy per intent:
//! - assign: optimistic insert, retracted if the server rejects it
//! - unassign: optimistic removal everywhere, full re-fetch on failure
//! - update: no optimistic edit, re-fetch either way

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::lock::Mutex as AsyncMutex;
use serde_json::Value;

use crate::backend::{AssignWeekly, TaskBackend, UpdateWeekly, WeeklyScope};
use crate::error::{Error, Result};
use crate::grid::{self, Grid};
use crate::models::{Role, ScheduledTask, Task, TaskDraft, TaskId, TimeSlot, Weekday};
use crate::store::{
    dispatch, new_task_store, store_grid, store_snapshot, store_template_of, TaskAction, TaskState, TaskStore,
};

/// How a mutation intent settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Applied locally only; nothing was sent
    LocalOnly,
    /// Server accepted; store refreshed from the server
    Confirmed,
    /// Server rejected; optimistic entries removed
    Retracted,
    /// Server rejected; store re-fetched from the server
    Resynced,
    /// Server rejected; current data kept, error flagged
    Rejected,
    /// Owning view is gone; result not applied
    Detached,
}

/// Independent parts of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    FamilyTasks,
    AssignedTasks,
    WeeklySchedule,
}

impl Slice {
    pub fn label(self) -> &'static str {
        match self {
            Slice::FamilyTasks => "family tasks",
            Slice::AssignedTasks => "assigned tasks",
            Slice::WeeklySchedule => "weekly schedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Applied; these slices failed and were treated as empty
    Partial(Vec<Slice>),
    /// Every slice failed; previous data kept
    Failed,
    /// A newer refresh started before this one finished
    Superseded,
    Detached,
}

/// Cancellation token shared with the view owning the store
#[derive(Clone, Debug, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop applying responses; in-flight requests still complete
    pub fn detach(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }
}

/// One async gate per task id so round trips for the same task run in order
#[derive(Clone, Default)]
struct PendingOps {
    gates: Arc<Mutex<HashMap<TaskId, Arc<AsyncMutex<()>>>>>,
}

impl PendingOps {
    fn gate(&self, task_id: &TaskId) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        Arc::clone(
            gates
                .entry(task_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

fn non_empty(child_id: Option<&str>) -> Option<&str> {
    child_id.map(str::trim).filter(|id| !id.is_empty())
}

fn unique_days(days: &[Weekday]) -> Vec<Weekday> {
    let mut unique = Vec::with_capacity(days.len());
    for day in days {
        if !unique.contains(day) {
            unique.push(*day);
        }
    }
    unique
}

fn take_slice<T>(result: Result<T>, slice: Slice, failed: &mut Vec<Slice>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(slice = slice.label(), error = %err, "refresh slice failed; treating as empty");
            failed.push(slice);
            None
        }
    }
}

/// Coordinates the task store with the backend
pub struct TaskSync<B> {
    backend: Arc<B>,
    store: TaskStore,
    role: Role,
    liveness: Liveness,
    generation: Arc<AtomicU64>,
    pending: PendingOps,
}

impl<B> Clone for TaskSync<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: self.store,
            role: self.role,
            liveness: self.liveness.clone(),
            generation: Arc::clone(&self.generation),
            pending: self.pending.clone(),
        }
    }
}

impl<B: TaskBackend> TaskSync<B> {
    pub fn new(backend: Arc<B>, role: Role) -> Self {
        Self::with_store(backend, role, new_task_store())
    }

    pub fn with_store(backend: Arc<B>, role: Role, store: TaskStore) -> Self {
        Self {
            backend,
            store,
            role,
            liveness: Liveness::new(),
            generation: Arc::new(AtomicU64::new(0)),
            pending: PendingOps::default(),
        }
    }

    pub fn store(&self) -> TaskStore {
        self.store
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn detach(&self) {
        self.liveness.detach();
    }

    /// Drop all task data, e.g. after sign-out
    pub fn reset(&self) {
        self.apply(TaskAction::Reset);
    }

    pub fn snapshot(&self) -> TaskState {
        store_snapshot(&self.store)
    }

    pub fn grid(&self) -> Grid {
        store_grid(&self.store)
    }

    fn apply(&self, action: TaskAction) -> bool {
        self.liveness.is_alive() && dispatch(&self.store, action)
    }

    async fn confirm(&self, child_id: Option<&str>) -> Outcome {
        match self.refresh_tasks(child_id).await {
            RefreshOutcome::Detached => Outcome::Detached,
            _ => Outcome::Confirmed,
        }
    }

    async fn resync(&self, child_id: Option<&str>) -> Outcome {
        match self.refresh_tasks(child_id).await {
            RefreshOutcome::Detached => Outcome::Detached,
            _ => Outcome::Resynced,
        }
    }

    /// Gates are keyed by template id; schedule entries resolve through the grid
    fn gate_key(&self, weekly_id: &TaskId) -> TaskId {
        store_template_of(&self.store, weekly_id).unwrap_or_else(|| weekly_id.clone())
    }

    fn reject(&self, message: &str) -> Outcome {
        if self.apply(TaskAction::Failed(message.to_string())) {
            Outcome::Rejected
        } else {
            Outcome::Detached
        }
    }

    // ========================
    // Refresh
    // ========================

    /// Re-fetch family tasks, assigned tasks and the weekly schedule
    /// concurrently and replace the store contents.
    pub async fn refresh_tasks(&self, child_id: Option<&str>) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.apply(TaskAction::Loading) {
            return RefreshOutcome::Detached;
        }

        let scope = match self.role {
            Role::Child => WeeklyScope::Child,
            Role::Parent => WeeklyScope::Family {
                child_id: non_empty(child_id).map(str::to_owned),
            },
        };
        let (family, assigned, weekly) = futures::join!(
            self.backend.family_tasks(),
            self.backend.child_tasks(),
            self.backend.weekly_schedule(scope),
        );

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "refresh superseded by a newer one");
            return RefreshOutcome::Superseded;
        }

        let mut failed = Vec::new();
        let family_tasks = take_slice(family, Slice::FamilyTasks, &mut failed).unwrap_or_default();
        let assigned_tasks = take_slice(assigned, Slice::AssignedTasks, &mut failed).unwrap_or_default();
        let grid = take_slice(weekly, Slice::WeeklySchedule, &mut failed)
            .map(grid::normalize)
            .unwrap_or_default();

        if failed.len() == 3 {
            tracing::error!("failed to load tasks; keeping previous data");
            return if self.apply(TaskAction::Failed("Failed to load tasks".into())) {
                RefreshOutcome::Failed
            } else {
                RefreshOutcome::Detached
            };
        }

        let warning = (!failed.is_empty()).then(|| {
            let names: Vec<&str> = failed.iter().map(|slice| slice.label()).collect();
            format!("Could not load {}", names.join(", "))
        });
        tracing::debug!(
            family = family_tasks.len(),
            assigned = assigned_tasks.len(),
            scheduled = grid.len(),
            "tasks refreshed"
        );
        let applied = self.apply(TaskAction::SetTasks {
            assigned_tasks,
            family_tasks,
            grid,
            warning,
        });
        match (applied, failed.is_empty()) {
            (false, _) => RefreshOutcome::Detached,
            (true, true) => RefreshOutcome::Applied,
            (true, false) => RefreshOutcome::Partial(failed),
        }
    }

    // ========================
    // Weekly Intents
    // ========================

    /// Schedule `task` on `days` at `slot`.
    ///
    /// Shows up in the grid immediately. Without a child id nothing is sent
    /// (preview). If the server rejects it, all entries of the task are
    /// removed from the grid.
    pub async fn assign_weekly(
        &self,
        task: &Task,
        days: &[Weekday],
        slot: TimeSlot,
        child_id: Option<&str>,
    ) -> Result<Outcome> {
        let days = unique_days(days);
        if days.is_empty() {
            return Err(Error::Validation("select at least one day".into()));
        }

        let mut entry = ScheduledTask::from_task(task);
        entry.set(
            "days",
            Value::from(days.iter().map(|day| day.name()).collect::<Vec<_>>()),
        );
        entry.set("localTime", Value::from(slot.as_str()));
        let inserted = self.apply(TaskAction::AssignWeekly {
            task: Arc::new(entry),
            days: days.clone(),
            slot: slot.clone(),
        });
        if !inserted {
            return Ok(Outcome::Detached);
        }

        let Some(child_id) = non_empty(child_id) else {
            tracing::debug!(task_id = %task.id, "weekly assignment kept local, no child selected");
            return Ok(Outcome::LocalOnly);
        };

        let gate = self.pending.gate(&task.id);
        let _turn = gate.lock().await;

        let request = AssignWeekly {
            task_id: task.id.clone(),
            child_id: child_id.to_string(),
            days,
            local_time: slot,
        };
        match self.backend.assign_weekly(&request).await {
            Ok(_) => Ok(self.confirm(Some(child_id)).await),
            Err(err) => {
                tracing::warn!(task_id = %task.id, error = %err, "failed to persist weekly assignment; retracting");
                let retracted = self.apply(TaskAction::ClearWeeklyForTask {
                    task_id: task.id.clone(),
                });
                Ok(if retracted { Outcome::Retracted } else { Outcome::Detached })
            }
        }
    }

    /// Remove a task from the weekly plan.
    ///
    /// Clears the task from every cell, not only `(day, slot)`.
    pub async fn unassign_weekly(
        &self,
        entry: &ScheduledTask,
        day: Weekday,
        slot: &TimeSlot,
        child_id: Option<&str>,
    ) -> Outcome {
        let task_id = entry.template_id();
        tracing::debug!(task_id = %task_id, %day, %slot, "clearing weekly assignments");
        if !self.apply(TaskAction::ClearWeeklyForTask {
            task_id: task_id.clone(),
        }) {
            return Outcome::Detached;
        }

        let Some(child_id) = non_empty(child_id) else {
            return Outcome::LocalOnly;
        };

        let gate = self.pending.gate(&task_id);
        let _turn = gate.lock().await;

        match self.backend.clear_weekly(&task_id, Some(child_id)).await {
            Ok(()) => self.confirm(Some(child_id)).await,
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "failed to persist weekly unassign; re-fetching");
                self.resync(Some(child_id)).await
            }
        }
    }

    /// Replace days and time of a schedule entry.
    ///
    /// The grid only changes once the server has answered.
    pub async fn update_weekly(
        &self,
        weekly_id: &TaskId,
        days: &[Weekday],
        slot: TimeSlot,
        child_id: Option<&str>,
    ) -> Result<Outcome> {
        let days = unique_days(days);
        if days.is_empty() {
            return Err(Error::Validation("select at least one day".into()));
        }
        let child_id = non_empty(child_id);

        let gate = self.pending.gate(&self.gate_key(weekly_id));
        let _turn = gate.lock().await;

        let request = UpdateWeekly {
            id: weekly_id.clone(),
            days,
            to_do_at: slot,
        };
        match self.backend.update_weekly(&request, child_id).await {
            Ok(_) => Ok(self.confirm(child_id).await),
            Err(err) => {
                tracing::warn!(weekly_id = %weekly_id, error = %err, "failed to update weekly schedule");
                Ok(self.resync(child_id).await)
            }
        }
    }

    /// Mark a schedule entry done for today
    pub async fn complete_weekly(
        &self,
        weekly_id: &TaskId,
        child_id: Option<&str>,
        comment: Option<&str>,
    ) -> Outcome {
        let child_id = non_empty(child_id);
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());

        let gate = self.pending.gate(&self.gate_key(weekly_id));
        let _turn = gate.lock().await;

        match self.backend.complete_weekly(weekly_id, child_id, comment).await {
            Ok(_) => self.confirm(child_id).await,
            Err(err) => {
                tracing::warn!(weekly_id = %weekly_id, error = %err, "failed to complete weekly task");
                self.reject("Failed to complete task")
            }
        }
    }

    // ========================
    // Task Intents
    // ========================

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Outcome> {
        draft.validate()?;
        match self.backend.create_task(draft).await {
            Ok(()) => Ok(self.confirm(None).await),
            Err(err) => {
                tracing::warn!(error = %err, "failed to add new task");
                Ok(self.reject("Failed to add task"))
            }
        }
    }

    pub async fn update_task(&self, task_id: &TaskId, draft: &TaskDraft) -> Result<Outcome> {
        draft.validate()?;
        let gate = self.pending.gate(task_id);
        let _turn = gate.lock().await;

        if !self.apply(TaskAction::Loading) {
            return Ok(Outcome::Detached);
        }
        match self.backend.update_task(task_id, draft).await {
            Ok(_) => Ok(self.confirm(None).await),
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "task update failed");
                Ok(self.reject("Failed to update task"))
            }
        }
    }

    /// Delete a task and everything scheduled from it.
    ///
    /// Weekly entries are cleared locally as soon as the delete succeeds;
    /// the server-side clear is best effort.
    pub async fn delete_task(&self, task_id: &TaskId, child_id: Option<&str>) -> Outcome {
        let child_id = non_empty(child_id);
        let gate = self.pending.gate(task_id);
        let _turn = gate.lock().await;

        if let Err(err) = self.backend.delete_task(task_id).await {
            tracing::warn!(task_id = %task_id, error = %err, "failed to delete task");
            return self.reject("Failed to delete task");
        }
        if !self.apply(TaskAction::ClearWeeklyForTask {
            task_id: task_id.clone(),
        }) {
            return Outcome::Detached;
        }
        if let Err(err) = self.backend.clear_weekly(task_id, child_id).await {
            tracing::debug!(task_id = %task_id, error = %err, "weekly clear after delete failed; ignoring");
        }
        self.confirm(child_id).await
    }

    pub async fn reassign_task(&self, task_id: &TaskId, assigned_to: &str) -> Outcome {
        let gate = self.pending.gate(task_id);
        let _turn = gate.lock().await;

        match self.backend.reassign_task(task_id, assigned_to).await {
            Ok(_) => self.confirm(None).await,
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "failed to update assignment");
                self.resync(None).await
            }
        }
    }
}
