//! Backend Traits
//!
//! The async seam between the sync coordinators and the REST backend.
//! [`crate::commands::ApiClient`] implements these over HTTP; tests plug in
//! in-memory doubles.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Task, TaskDraft, TaskId, TimeSlot, UserProfile, Weekday};

/// Which weekly schedule to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeeklyScope {
    /// Parent view; optionally narrowed to one child
    Family { child_id: Option<String> },
    /// The signed-in child's own schedule
    Child,
}

/// Body of `weekly/assign_weekly`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignWeekly {
    pub task_id: TaskId,
    pub child_id: String,
    pub days: Vec<Weekday>,
    pub local_time: TimeSlot,
}

/// Body of `weekly/update` (full replace of days and time)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWeekly {
    pub id: TaskId,
    pub days: Vec<Weekday>,
    pub to_do_at: TimeSlot,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait TaskBackend: Send + Sync {
    async fn family_tasks(&self) -> Result<Vec<Task>>;

    async fn child_tasks(&self) -> Result<Vec<Task>>;

    /// Raw weekly response; shape is resolved by [`crate::grid::normalize`]
    async fn weekly_schedule(&self, scope: WeeklyScope) -> Result<Value>;

    async fn assign_weekly(&self, request: &AssignWeekly) -> Result<Value>;

    async fn update_weekly(&self, request: &UpdateWeekly, child_id: Option<&str>) -> Result<Value>;

    /// Drop every weekly assignment of a task (optionally for one child)
    async fn clear_weekly(&self, task_id: &TaskId, child_id: Option<&str>) -> Result<()>;

    async fn complete_weekly(
        &self,
        weekly_id: &TaskId,
        child_id: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Value>;

    async fn create_task(&self, draft: &TaskDraft) -> Result<()>;

    async fn update_task(&self, task_id: &TaskId, draft: &TaskDraft) -> Result<Value>;

    async fn delete_task(&self, task_id: &TaskId) -> Result<()>;

    async fn reassign_task(&self, task_id: &TaskId, assigned_to: &str) -> Result<Value>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait ScreenTimeBackend: Send + Sync {
    async fn profile(&self) -> Result<UserProfile>;

    async fn withdraw_time(&self, child_id: &str, minutes: u32) -> Result<Value>;

    async fn withdraw_time_stop(&self) -> Result<()>;
}
