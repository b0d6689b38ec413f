//! Backend Command Wrappers
//!
//! Frontend bindings to the REST backend, organized by feature area.
//! Every call carries the session's bearer token and is bounded by the
//! configured request timeout.

mod auth;
mod device;
mod task;
mod time_control;
mod weekly;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, Response};
use serde::Serialize;
use serde_json::Value;

use crate::backend::{AssignWeekly, ScreenTimeBackend, TaskBackend, UpdateWeekly, WeeklyScope};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{Task, TaskDraft, TaskId, UserProfile};

pub use device::{AgentDownload, AgentPackage};

/// Characters left as-is inside a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// `childId` query parameter, when given
pub(crate) fn child_query(child_id: Option<&str>) -> Vec<(&'static str, &str)> {
    child_id.map(|id| vec![("childId", id)]).unwrap_or_default()
}

/// Resource prefix under `/api`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Area {
    Task,
    Weekly,
    TimeControl,
    Device,
    Auth,
}

impl Area {
    fn prefix(self) -> &'static str {
        match self {
            Area::Task => "task",
            Area::Weekly => "weekly",
            Area::TimeControl => "time_control",
            Area::Device => "device",
            Area::Auth => "auth",
        }
    }
}

/// HTTP client for the dashboard backend
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    timeout: Duration,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout());
        Ok(Self {
            http: builder.build()?,
            base_url: Arc::from(config.base_url()),
            timeout: config.request_timeout(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Replace the bearer token (`None` after sign-out)
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::NotSignedIn)
    }

    pub(crate) fn url(&self, area: Area, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, area.prefix(), path)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_ms: self.timeout_ms(),
            }
        } else {
            Error::Http(err)
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = reqwest::Result<T>>,
    ) -> Result<T> {
        fut.await.map_err(|err| self.transport_error(err))
    }

    // reqwest has no client timeout on wasm32; race a browser timer instead
    #[cfg(target_arch = "wasm32")]
    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = reqwest::Result<T>>,
    ) -> Result<T> {
        use futures::future::{select, Either};

        let millis = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let timer = gloo_timers::future::TimeoutFuture::new(millis);
        futures::pin_mut!(fut);
        match select(fut, timer).await {
            Either::Left((result, _)) => result.map_err(|err| self.transport_error(err)),
            Either::Right(_) => Err(Error::Timeout {
                timeout_ms: self.timeout_ms(),
            }),
        }
    }

    /// Send an authenticated request; non-2xx becomes [`Error::Status`]
    pub(crate) async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        area: Area,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Response> {
        let token = self.bearer()?;
        let mut request = self
            .http
            .request(method.clone(), self.url(area, path))
            .bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, area = area.prefix(), path, "backend call");
        let response = self.with_timeout(request.send()).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = self.with_timeout(response.text()).await.unwrap_or_default();
        tracing::warn!(%method, area = area.prefix(), path, status = status.as_u16(), "backend call failed");
        Err(Error::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Send a request and decode the JSON body (`null` when empty)
    pub(crate) async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        area: Area,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Value> {
        let response = self.execute(method, area, path, query, body).await?;
        let bytes = self.with_timeout(response.bytes()).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub(crate) async fn get(&self, area: Area, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.call(Method::GET, area, path, query, None::<&()>).await
    }
}

/// Unwrap `{ <key>: [...] }` (or a bare array) and parse entries leniently
pub(crate) fn parse_list<T: serde::de::DeserializeOwned>(body: Value, key: &str) -> Vec<T> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(error = %err, list = key, "skipping malformed list entry");
                None
            }
        })
        .collect()
}

// ========================
// Backend Trait Impls
// ========================

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl TaskBackend for ApiClient {
    async fn family_tasks(&self) -> Result<Vec<Task>> {
        self.list_family_tasks().await
    }

    async fn child_tasks(&self) -> Result<Vec<Task>> {
        self.list_child_tasks().await
    }

    async fn weekly_schedule(&self, scope: WeeklyScope) -> Result<Value> {
        match scope {
            WeeklyScope::Family { child_id } => self.family_weekly_schedule(child_id.as_deref()).await,
            WeeklyScope::Child => self.child_weekly_schedule().await,
        }
    }

    async fn assign_weekly(&self, request: &AssignWeekly) -> Result<Value> {
        self.assign_task_weekly(request).await
    }

    async fn update_weekly(&self, request: &UpdateWeekly, child_id: Option<&str>) -> Result<Value> {
        self.update_weekly_task(request, child_id).await
    }

    async fn clear_weekly(&self, task_id: &TaskId, child_id: Option<&str>) -> Result<()> {
        self.clear_task_weekly_schedule(task_id, child_id).await.map(|_| ())
    }

    async fn complete_weekly(
        &self,
        weekly_id: &TaskId,
        child_id: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Value> {
        self.complete_weekly_task(weekly_id, child_id, comment).await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<()> {
        self.new_task(draft).await
    }

    async fn update_task(&self, task_id: &TaskId, draft: &TaskDraft) -> Result<Value> {
        self.edit_task(task_id, draft).await
    }

    async fn delete_task(&self, task_id: &TaskId) -> Result<()> {
        self.remove_task(task_id).await
    }

    async fn reassign_task(&self, task_id: &TaskId, assigned_to: &str) -> Result<Value> {
        self.update_task_assignment(task_id, assigned_to).await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl ScreenTimeBackend for ApiClient {
    async fn profile(&self) -> Result<UserProfile> {
        self.me().await
    }

    async fn withdraw_time(&self, child_id: &str, minutes: u32) -> Result<Value> {
        self.withdraw_screen_time(child_id, minutes).await
    }

    async fn withdraw_time_stop(&self) -> Result<()> {
        self.stop_withdraw_screen_time().await
    }
}
