//! Task State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity. All changes go
//! through [`TaskState::reduce`], a pure `(state, action) -> state` step.

use std::sync::Arc;

use leptos::prelude::*;
use reactive_stores::Store;

use crate::grid::Grid;
use crate::models::{ScheduledTask, Task, TaskId, TimeSlot, Weekday};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Tasks and weekly plan as last seen from the backend, plus local edits
#[derive(Clone, Debug, Default, Store)]
pub struct TaskState {
    /// Tasks assigned to the signed-in user
    pub assigned_tasks: Vec<Task>,
    /// All family task templates
    pub family_tasks: Vec<Task>,
    /// Weekly plan (derived; rebuilt on every refresh)
    pub grid: Grid,
    pub status: LoadStatus,
    /// Last non-fatal error shown to the user
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub enum TaskAction {
    Loading,
    /// Replace everything with a confirmed server snapshot
    SetTasks {
        assigned_tasks: Vec<Task>,
        family_tasks: Vec<Task>,
        grid: Grid,
        warning: Option<String>,
    },
    /// Optimistically place a task in every `(day, slot)` cell
    AssignWeekly {
        task: Arc<ScheduledTask>,
        days: Vec<Weekday>,
        slot: TimeSlot,
    },
    /// Remove a task from all cells
    ClearWeeklyForTask { task_id: TaskId },
    /// Keep current data, flag the error
    Failed(String),
    /// Drop everything (sign-out)
    Reset,
}

impl TaskState {
    pub fn reduce(self, action: TaskAction) -> Self {
        match action {
            TaskAction::Loading => Self {
                status: LoadStatus::Loading,
                ..self
            },
            TaskAction::SetTasks {
                assigned_tasks,
                family_tasks,
                grid,
                warning,
            } => Self {
                assigned_tasks,
                family_tasks,
                grid,
                status: LoadStatus::Idle,
                error: warning,
            },
            TaskAction::AssignWeekly { task, days, slot } => {
                let mut grid = self.grid;
                for day in days {
                    grid.insert(day, slot.clone(), Arc::clone(&task));
                }
                Self { grid, ..self }
            }
            TaskAction::ClearWeeklyForTask { task_id } => {
                let mut grid = self.grid;
                grid.remove_task(&task_id);
                Self { grid, ..self }
            }
            TaskAction::Failed(message) => Self {
                status: LoadStatus::Error,
                error: Some(message),
                ..self
            },
            TaskAction::Reset => Self::default(),
        }
    }
}

/// Type alias for the store
pub type TaskStore = Store<TaskState>;

pub fn new_task_store() -> TaskStore {
    Store::new(TaskState::default())
}

// ========================
// Store Helper Functions
// ========================

/// Apply an action. Returns `false` if the store has been disposed.
pub fn dispatch(store: &TaskStore, action: TaskAction) -> bool {
    store
        .try_update(|state| {
            let current = std::mem::take(state);
            *state = current.reduce(action);
        })
        .is_some()
}

/// Current grid without subscribing
pub fn store_grid(store: &TaskStore) -> Grid {
    store.grid().get_untracked()
}

/// Template of the schedule entry `weekly_id`, if it is on the grid
pub fn store_template_of(store: &TaskStore, weekly_id: &TaskId) -> Option<TaskId> {
    store
        .grid()
        .try_with_untracked(|grid| grid.template_of(weekly_id))
        .flatten()
}

pub fn store_status(store: &TaskStore) -> LoadStatus {
    store.status().get_untracked()
}

pub fn store_snapshot(store: &TaskStore) -> TaskState {
    store.get_untracked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(raw: &str) -> TimeSlot {
        TimeSlot::parse(raw).unwrap()
    }

    fn dishes() -> Arc<ScheduledTask> {
        Arc::new(ScheduledTask::from_task(&Task::new(1, "Dishes", 10)))
    }

    #[test]
    fn test_assign_places_task_in_each_day() {
        let state = TaskState::default().reduce(TaskAction::AssignWeekly {
            task: dishes(),
            days: vec![Weekday::Monday, Weekday::Wednesday],
            slot: slot("18:00"),
        });

        assert_eq!(state.grid.cell(Weekday::Monday, &slot("18:00")).len(), 1);
        assert_eq!(state.grid.cell(Weekday::Wednesday, &slot("18:00")).len(), 1);
        assert!(state.grid.cell(Weekday::Tuesday, &slot("18:00")).is_empty());
    }

    #[test]
    fn test_assign_appends_to_shared_slot() {
        let read = Arc::new(ScheduledTask::from_task(&Task::new(2, "Read", 5)));
        let state = TaskState::default()
            .reduce(TaskAction::AssignWeekly {
                task: dishes(),
                days: vec![Weekday::Monday],
                slot: slot("18:00"),
            })
            .reduce(TaskAction::AssignWeekly {
                task: read,
                days: vec![Weekday::Monday],
                slot: slot("18:00"),
            });

        assert_eq!(state.grid.cell(Weekday::Monday, &slot("18:00")).len(), 2);
    }

    #[test]
    fn test_clear_removes_all_cells() {
        let state = TaskState::default()
            .reduce(TaskAction::AssignWeekly {
                task: dishes(),
                days: vec![Weekday::Monday, Weekday::Friday],
                slot: slot("18:00"),
            })
            .reduce(TaskAction::ClearWeeklyForTask {
                task_id: TaskId::from(1),
            });

        assert!(state.grid.is_empty());
    }

    #[test]
    fn test_failed_keeps_displayed_data() {
        let grid = crate::grid::normalize(json!([
            {"id": 1, "days": ["MONDAY"], "localTime": "18:00"}
        ]));
        let state = TaskState::default()
            .reduce(TaskAction::SetTasks {
                assigned_tasks: vec![Task::new(1, "Dishes", 10)],
                family_tasks: vec![Task::new(1, "Dishes", 10)],
                grid: grid.clone(),
                warning: None,
            })
            .reduce(TaskAction::Loading)
            .reduce(TaskAction::Failed("Failed to load tasks".into()));

        assert_eq!(state.status, LoadStatus::Error);
        assert_eq!(state.error.as_deref(), Some("Failed to load tasks"));
        assert_eq!(state.grid, grid);
        assert_eq!(state.family_tasks.len(), 1);
    }

    #[test]
    fn test_set_tasks_clears_error() {
        let state = TaskState::default()
            .reduce(TaskAction::Failed("boom".into()))
            .reduce(TaskAction::SetTasks {
                assigned_tasks: vec![],
                family_tasks: vec![],
                grid: Grid::new(),
                warning: None,
            });

        assert_eq!(state.status, LoadStatus::Idle);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_dispatch_through_store() {
        let store = new_task_store();
        assert!(dispatch(
            &store,
            TaskAction::AssignWeekly {
                task: dishes(),
                days: vec![Weekday::Sunday],
                slot: slot("09:00"),
            }
        ));

        assert_eq!(store_grid(&store).len(), 1);
        assert_eq!(store_status(&store), LoadStatus::Idle);

        store.dispose();
        assert!(!dispatch(&store, TaskAction::Loading));
    }
}
