//! Screen-Time Dashboard State Layer
//!
//! Client-side state for the family screen-time dashboard: task lists, the
//! weekly schedule grid, the screen-time balance and the signed-in session,
//! kept in step with the REST backend.

pub mod app;
pub mod backend;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod models;
pub mod screen_time;
pub mod session;
pub mod store;
pub mod sync;

pub use app::AppServices;
pub use commands::ApiClient;
pub use config::ApiConfig;
pub use error::{Error, Result};
pub use grid::{normalize, Grid};
pub use models::{Role, ScheduledTask, Task, TaskDraft, TaskId, TimeSlot, Weekday};
pub use store::{LoadStatus, TaskAction, TaskState, TaskStore};
pub use sync::{Liveness, Outcome, RefreshOutcome, Slice, TaskSync};
