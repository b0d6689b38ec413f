//! Application Context
//!
//! Sync coordinators shared via Leptos Context API. The owner that provides
//! a coordinator also detaches it on cleanup, so responses that arrive after
//! the view is gone are dropped.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::backend::{ScreenTimeBackend, TaskBackend};
use crate::screen_time::ScreenTimeSync;
use crate::sync::TaskSync;

pub fn provide_task_sync<B: TaskBackend + 'static>(sync: TaskSync<B>) {
    let liveness = sync.liveness().clone();
    on_cleanup(move || {
        tracing::debug!("task view disposed; detaching sync");
        liveness.detach();
    });
    provide_context(sync);
}

pub fn use_task_sync<B: TaskBackend + 'static>() -> TaskSync<B> {
    expect_context::<TaskSync<B>>()
}

pub fn provide_screen_time_sync<B: ScreenTimeBackend + 'static>(sync: ScreenTimeSync<B>) {
    let liveness = sync.liveness().clone();
    on_cleanup(move || liveness.detach());
    provide_context(sync);
}

pub fn use_screen_time_sync<B: ScreenTimeBackend + 'static>() -> ScreenTimeSync<B> {
    expect_context::<ScreenTimeSync<B>>()
}

/// Fire-and-forget refresh for event handlers
pub fn refresh_in_background<B: TaskBackend + 'static>(sync: &TaskSync<B>, child_id: Option<String>) {
    let sync = sync.clone();
    spawn_local(async move {
        let outcome = sync.refresh_tasks(child_id.as_deref()).await;
        tracing::trace!(?outcome, "background refresh settled");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::backend::{AssignWeekly, UpdateWeekly, WeeklyScope};
    use crate::error::{Error, Result};
    use crate::models::{Role, Task, TaskDraft, TaskId, UserProfile};

    /// Backend that is never reached in these tests
    struct Offline;

    #[async_trait]
    impl TaskBackend for Offline {
        async fn family_tasks(&self) -> Result<Vec<Task>> {
            Err(Error::NotSignedIn)
        }
        async fn child_tasks(&self) -> Result<Vec<Task>> {
            Err(Error::NotSignedIn)
        }
        async fn weekly_schedule(&self, _scope: WeeklyScope) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn assign_weekly(&self, _request: &AssignWeekly) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn update_weekly(&self, _request: &UpdateWeekly, _child_id: Option<&str>) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn clear_weekly(&self, _task_id: &TaskId, _child_id: Option<&str>) -> Result<()> {
            Err(Error::NotSignedIn)
        }
        async fn complete_weekly(
            &self,
            _weekly_id: &TaskId,
            _child_id: Option<&str>,
            _comment: Option<&str>,
        ) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn create_task(&self, _draft: &TaskDraft) -> Result<()> {
            Err(Error::NotSignedIn)
        }
        async fn update_task(&self, _task_id: &TaskId, _draft: &TaskDraft) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn delete_task(&self, _task_id: &TaskId) -> Result<()> {
            Err(Error::NotSignedIn)
        }
        async fn reassign_task(&self, _task_id: &TaskId, _assigned_to: &str) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
    }

    #[async_trait]
    impl ScreenTimeBackend for Offline {
        async fn profile(&self) -> Result<UserProfile> {
            Err(Error::NotSignedIn)
        }
        async fn withdraw_time(&self, _child_id: &str, _minutes: u32) -> Result<Value> {
            Err(Error::NotSignedIn)
        }
        async fn withdraw_time_stop(&self) -> Result<()> {
            Err(Error::NotSignedIn)
        }
    }

    #[test]
    fn test_context_lookup_shares_coordinator() {
        let owner = Owner::new();
        owner.with(|| {
            let sync = TaskSync::new(Arc::new(Offline), Role::Child);
            provide_task_sync(sync.clone());

            let found = use_task_sync::<Offline>();
            assert_eq!(found.role(), Role::Child);
            found.detach();
            assert!(!sync.liveness().is_alive());
        });
    }

    #[test]
    fn test_owner_cleanup_detaches_coordinators() {
        let owner = Owner::new();
        let (tasks, balance) = owner.with(|| {
            let tasks = TaskSync::new(Arc::new(Offline), Role::Parent);
            let balance = ScreenTimeSync::new(Arc::new(Offline));
            provide_task_sync(tasks.clone());
            provide_screen_time_sync(balance.clone());
            (tasks, balance)
        });
        assert!(tasks.liveness().is_alive());
        assert!(balance.liveness().is_alive());

        owner.cleanup();

        assert!(!tasks.liveness().is_alive());
        assert!(!balance.liveness().is_alive());
    }
}
