//! Application Services
//!
//! Explicit start-up wiring: one API client, one session, and the sync
//! coordinators built on top of them. Signing in or out swaps the
//! coordinators for fresh ones over the same stores.

use std::sync::{Arc, PoisonError, RwLock};

use rolling_logger::LogBuffer;

use crate::commands::ApiClient;
use crate::config::ApiConfig;
use crate::context::{provide_screen_time_sync, provide_task_sync};
use crate::error::Result;
use crate::models::Role;
use crate::screen_time::ScreenTimeSync;
use crate::session::{Session, SessionManager, SessionStore};
use crate::sync::TaskSync;

/// Lines kept for the in-app diagnostics panel
const LOG_BUFFER_LINES: usize = 500;
const LOG_FILE_PREFIX: &str = "ScreenTime";

fn install_logging(config: &ApiConfig) -> Option<LogBuffer> {
    let installed = match &config.log_dir {
        #[cfg(not(target_arch = "wasm32"))]
        Some(dir) => rolling_logger::init_logger(dir, LOG_FILE_PREFIX),
        _ => rolling_logger::init_buffer_logger(LOG_BUFFER_LINES, log::LevelFilter::Info),
    };
    match installed {
        Ok(buffer) => Some(buffer),
        Err(err) => {
            // Another subscriber is already installed (tests, host app)
            tracing::debug!(error = %err, "logger already initialized");
            None
        }
    }
}

struct Coordinators {
    tasks: TaskSync<ApiClient>,
    screen_time: ScreenTimeSync<ApiClient>,
}

impl Coordinators {
    fn new(client: &Arc<ApiClient>, role: Role) -> Self {
        Self {
            tasks: TaskSync::new(Arc::clone(client), role),
            screen_time: ScreenTimeSync::new(Arc::clone(client)),
        }
    }

    /// Detach these coordinators and return live ones over the same stores
    fn rebind(&self, client: &Arc<ApiClient>, role: Role) -> Self {
        self.tasks.detach();
        self.screen_time.detach();
        Self {
            tasks: TaskSync::with_store(Arc::clone(client), role, self.tasks.store()),
            screen_time: ScreenTimeSync::with_store(Arc::clone(client), self.screen_time.store()),
        }
    }
}

pub struct AppServices<S> {
    pub config: ApiConfig,
    pub client: Arc<ApiClient>,
    pub session: Arc<SessionManager<S>>,
    pub logs: Option<LogBuffer>,
    coordinators: RwLock<Coordinators>,
}

impl<S: SessionStore + 'static> AppServices<S> {
    pub fn bootstrap(config: ApiConfig, session_store: S) -> Result<Self> {
        let logs = install_logging(&config);
        config.validate()?;

        let client = Arc::new(ApiClient::new(&config)?);
        let session = SessionManager::new(session_store);
        let restored = session.bootstrap().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "session storage unavailable; starting signed out");
            None
        });
        let role = restored.as_ref().map(|s| s.role).unwrap_or_default();
        client.set_token(restored.and_then(|s| s.token));

        tracing::info!(backend = config.base_url(), ?role, "services ready");
        Ok(Self {
            coordinators: RwLock::new(Coordinators::new(&client, role)),
            session: Arc::new(session),
            client,
            config,
            logs,
        })
    }

    pub fn tasks(&self) -> TaskSync<ApiClient> {
        self.coordinators.read().unwrap_or_else(PoisonError::into_inner).tasks.clone()
    }

    pub fn screen_time(&self) -> ScreenTimeSync<ApiClient> {
        self.coordinators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .screen_time
            .clone()
    }

    pub fn role(&self) -> Role {
        self.tasks().role()
    }

    /// Children only ever see their own schedule
    pub fn child_id(&self) -> Option<String> {
        match self.role() {
            Role::Child => self.session.current().map(|s| s.uid),
            Role::Parent => None,
        }
    }

    fn rebind(&self, role: Role) -> Coordinators {
        let mut current = self.coordinators.write().unwrap_or_else(PoisonError::into_inner);
        let next = current.rebind(&self.client, role);
        let handles = Coordinators {
            tasks: next.tasks.clone(),
            screen_time: next.screen_time.clone(),
        };
        *current = next;
        handles
    }

    /// Persist a fresh sign-in and authorize the client with it.
    ///
    /// The previous coordinators are detached; call [`Self::provide`] again
    /// so views pick up the new ones.
    pub fn sign_in(&self, session: Session) -> Result<()> {
        let session = self.session.login(session)?;
        self.client.set_token(session.token);
        self.rebind(session.role);
        tracing::debug!(role = ?session.role, "coordinators rebound");
        Ok(())
    }

    /// Forget the session and every piece of data loaded under it
    pub fn sign_out(&self) -> Result<()> {
        self.session.logout()?;
        self.client.set_token(None);
        let fresh = self.rebind(Role::default());
        fresh.tasks.reset();
        fresh.screen_time.reset();
        tracing::info!("signed out");
        Ok(())
    }

    /// Share the current coordinators with the current Leptos owner
    pub fn provide(&self) {
        provide_task_sync(self.tasks());
        provide_screen_time_sync(self.screen_time());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen_time::ScreenTimeState;
    use crate::session::MemorySessionStore;
    use crate::store::{LoadStatus, TaskAction};
    use serde_json::json;

    fn store_with(record: serde_json::Value) -> MemorySessionStore {
        let store = MemorySessionStore::new();
        store.set("user", &record.to_string()).unwrap();
        store
    }

    fn signed_out() -> AppServices<MemorySessionStore> {
        AppServices::bootstrap(ApiConfig::new("http://localhost:8081"), MemorySessionStore::new()).unwrap()
    }

    fn child_session() -> Session {
        serde_json::from_value(json!({"uid": "kid-1", "email": "k@example.com", "token": "t", "role": "CHILD"}))
            .unwrap()
    }

    #[test]
    fn test_bootstrap_restores_child_session() {
        let store = store_with(json!({"uid": "kid-1", "email": "k@example.com", "token": "t", "role": "CHILD"}));

        let services = AppServices::bootstrap(ApiConfig::new("http://localhost:8081"), store).unwrap();

        assert_eq!(services.role(), Role::Child);
        assert_eq!(services.child_id().as_deref(), Some("kid-1"));
        assert!(services.client.has_token());
    }

    #[test]
    fn test_bootstrap_without_session_is_signed_out_parent() {
        let services = signed_out();

        assert_eq!(services.role(), Role::Parent);
        assert_eq!(services.child_id(), None);
        assert!(!services.client.has_token());
    }

    #[test]
    fn test_bootstrap_rejects_bad_config() {
        let result = AppServices::bootstrap(ApiConfig::new("not a url"), MemorySessionStore::new());

        assert!(result.is_err());
    }

    #[test]
    fn test_sign_in_adopts_session_role() {
        let services = signed_out();

        services.sign_in(child_session()).unwrap();

        assert_eq!(services.role(), Role::Child);
        assert_eq!(services.child_id().as_deref(), Some("kid-1"));
        assert!(services.client.has_token());
        assert!(services.tasks().liveness().is_alive());
    }

    #[test]
    fn test_sign_in_detaches_previous_coordinators() {
        let services = signed_out();
        let before = services.tasks();

        services.sign_in(child_session()).unwrap();

        assert!(!before.liveness().is_alive());
        assert!(services.tasks().liveness().is_alive());
        assert!(services.screen_time().liveness().is_alive());
    }

    #[test]
    fn test_sign_out_drops_token() {
        let store = store_with(json!({"uid": "p1", "email": "p@example.com", "token": "t"}));
        let services = AppServices::bootstrap(ApiConfig::new("http://localhost:8081"), store).unwrap();
        let before = services.tasks();

        services.sign_out().unwrap();

        assert!(!services.client.has_token());
        assert!(services.session.current().is_none());
        assert!(!before.liveness().is_alive());
        assert_eq!(services.role(), Role::Parent);
    }

    #[test]
    fn test_sign_out_then_sign_in_stays_live() {
        let services = signed_out();
        services.sign_in(child_session()).unwrap();
        services.sign_out().unwrap();

        services.sign_in(child_session()).unwrap();

        let tasks = services.tasks();
        assert!(tasks.liveness().is_alive());
        assert_eq!(tasks.role(), Role::Child);
        assert!(crate::store::dispatch(&tasks.store(), TaskAction::Reset));
    }

    #[test]
    fn test_sign_out_clears_loaded_data() {
        let services = signed_out();
        services.sign_in(child_session()).unwrap();
        services.screen_time().add_pending(12.0);
        crate::store::dispatch(&services.tasks().store(), TaskAction::Failed("stale".into()));

        services.sign_out().unwrap();

        let state = services.tasks().snapshot();
        assert_eq!(state.status, LoadStatus::Idle);
        assert!(state.error.is_none());
        assert!(state.grid.is_empty());
        assert_eq!(services.screen_time().snapshot(), ScreenTimeState::default());
    }
}
