//! Weekly Schedule Commands
//!
//! Bindings for `/api/weekly`. Days travel as backend day names
//! (`"MONDAY"`), times as `"HH:mm"`.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{child_query, segment, ApiClient, Area};
use crate::backend::{AssignWeekly, UpdateWeekly};
use crate::error::Result;
use crate::models::TaskId;

#[derive(Serialize)]
struct CompleteWeeklyArgs<'a> {
    id: &'a TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

/// Mutation responses wrap the updated record as `{ task: {...} }`
fn unwrap_task(body: Value) -> Value {
    match body {
        Value::Object(mut object) if object.get("task").is_some_and(|t| !t.is_null()) => {
            object.remove("task").unwrap_or(Value::Null)
        }
        other => other,
    }
}

impl ApiClient {
    /// Parent view; all children unless `child_id` narrows it
    pub async fn family_weekly_schedule(&self, child_id: Option<&str>) -> Result<Value> {
        let query = child_query(child_id);
        self.get(Area::Weekly, "family_weekly_schedule", &query).await
    }

    /// The signed-in child's schedule
    pub async fn child_weekly_schedule(&self) -> Result<Value> {
        self.get(Area::Weekly, "child_weekly_schedule", &[]).await
    }

    pub async fn assign_task_weekly(&self, request: &AssignWeekly) -> Result<Value> {
        self.call(Method::POST, Area::Weekly, "assign_weekly", &[], Some(request))
            .await
    }

    pub async fn update_weekly_task(&self, request: &UpdateWeekly, child_id: Option<&str>) -> Result<Value> {
        let query = child_query(child_id);
        self.call(Method::PUT, Area::Weekly, "update", &query, Some(request))
            .await
            .map(unwrap_task)
    }

    /// Mark a schedule entry done for today
    pub async fn complete_weekly_task(
        &self,
        weekly_id: &TaskId,
        child_id: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Value> {
        let args = CompleteWeeklyArgs {
            id: weekly_id,
            comment: comment.map(str::trim).filter(|c| !c.is_empty()),
        };
        let query = child_query(child_id);
        self.call(Method::POST, Area::Weekly, "complete", &query, Some(&args))
            .await
            .map(unwrap_task)
    }

    pub async fn clear_task_weekly_schedule(&self, task_id: &TaskId, child_id: Option<&str>) -> Result<Value> {
        let path = format!("clear_weekly_schedule/{}", segment(task_id.as_str()));
        let query = child_query(child_id);
        self.call(Method::DELETE, Area::Weekly, &path, &query, None::<&()>)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_task_envelope() {
        assert_eq!(unwrap_task(json!({"task": {"id": 1}})), json!({"id": 1}));
        assert_eq!(unwrap_task(json!({"success": true})), json!({"success": true}));
        assert_eq!(unwrap_task(json!({"task": null})), json!({"task": null}));
    }
}
