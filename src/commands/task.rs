//! Task Commands
//!
//! Bindings for `/api/task`: task templates, completions and screen-time
//! withdrawal.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{parse_list, segment, ApiClient, Area};
use crate::error::Result;
use crate::models::{Task, TaskDraft, TaskId};

// ========================
// Argument Structs
// ========================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskArgs<'a> {
    id: &'a TaskId,
    title: &'a str,
    description: &'a str,
    screen_time: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReassignArgs<'a> {
    task_id: &'a TaskId,
    new_assigned_to: &'a str,
}

#[derive(Serialize)]
struct SubmitCompletionArgs<'a> {
    // Field name as the backend spells it
    #[serde(rename = "tastInstanceId")]
    task_instance_id: &'a TaskId,
    comment: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewCompletionArgs<'a> {
    completion_id: &'a TaskId,
    child_id: &'a str,
    time: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FamilyIdArgs<'a> {
    family_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawArgs<'a> {
    child_id: &'a str,
    minutes: u32,
}

const TASK_LIST_KEY: &str = "familyTasksList";

// ========================
// Commands
// ========================

impl ApiClient {
    pub async fn list_family_tasks(&self) -> Result<Vec<Task>> {
        let body = self.get(Area::Task, "family_tasks", &[]).await?;
        Ok(parse_list(body, TASK_LIST_KEY))
    }

    /// Tasks assigned to the signed-in user
    pub async fn list_child_tasks(&self) -> Result<Vec<Task>> {
        let body = self.get(Area::Task, "child_tasks", &[]).await?;
        Ok(parse_list(body, TASK_LIST_KEY))
    }

    pub async fn new_task(&self, draft: &TaskDraft) -> Result<()> {
        draft.validate()?;
        self.call(Method::POST, Area::Task, "new_task", &[], Some(draft))
            .await
            .map(|_| ())
    }

    pub async fn edit_task(&self, task_id: &TaskId, draft: &TaskDraft) -> Result<Value> {
        draft.validate()?;
        let args = UpdateTaskArgs {
            id: task_id,
            title: &draft.title,
            description: &draft.description,
            screen_time: draft.screen_time,
        };
        self.call(Method::PATCH, Area::Task, "update_task_tamplate", &[], Some(&args))
            .await
    }

    pub async fn remove_task(&self, task_id: &TaskId) -> Result<()> {
        let path = format!("delete_task/{}", segment(task_id.as_str()));
        self.call(Method::DELETE, Area::Task, &path, &[], None::<&()>)
            .await
            .map(|_| ())
    }

    pub async fn update_task_assignment(&self, task_id: &TaskId, assigned_to: &str) -> Result<Value> {
        let args = ReassignArgs {
            task_id,
            new_assigned_to: assigned_to,
        };
        self.call(Method::POST, Area::Task, "update_task_assignment", &[], Some(&args))
            .await
    }

    pub async fn submit_completion(&self, instance_id: &TaskId, comment: &str) -> Result<Value> {
        let args = SubmitCompletionArgs {
            task_instance_id: instance_id,
            comment: comment.trim(),
        };
        self.call(Method::POST, Area::Task, "submit_completion", &[], Some(&args))
            .await
    }

    pub async fn approve_completion(&self, completion_id: &TaskId, child_id: &str, minutes: u32) -> Result<Value> {
        let args = ReviewCompletionArgs {
            completion_id,
            child_id,
            time: minutes,
        };
        self.call(Method::POST, Area::Task, "approve_completion", &[], Some(&args))
            .await
    }

    pub async fn reject_completion(&self, completion_id: &TaskId, child_id: &str, minutes: u32) -> Result<Value> {
        let args = ReviewCompletionArgs {
            completion_id,
            child_id,
            time: minutes,
        };
        self.call(Method::POST, Area::Task, "reject_completion", &[], Some(&args))
            .await
    }

    pub async fn pending_completions(&self, family_id: &str) -> Result<Value> {
        let args = FamilyIdArgs { family_id };
        self.call(Method::POST, Area::Task, "family_pending_completions", &[], Some(&args))
            .await
    }

    pub async fn family_kids(&self, family_id: &str) -> Result<Value> {
        let args = FamilyIdArgs { family_id };
        self.call(Method::POST, Area::Task, "family_kids", &[], Some(&args))
            .await
    }

    pub async fn withdraw_screen_time(&self, child_id: &str, minutes: u32) -> Result<Value> {
        let args = WithdrawArgs { child_id, minutes };
        self.call(Method::POST, Area::Task, "withdraw_time", &[], Some(&args))
            .await
    }

    pub async fn stop_withdraw_screen_time(&self) -> Result<()> {
        let empty = serde_json::Map::new();
        self.call(Method::PATCH, Area::Task, "withdraw_time_stop", &[], Some(&empty))
            .await
            .map(|_| ())
    }
}
