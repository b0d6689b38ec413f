//! Screen-Time Balance
//!
//! Earned and pending minutes of the signed-in user. The balance is owned
//! by the backend; local changes are previews until the next
//! [`ScreenTimeSync::refresh`].

use std::sync::Arc;

use leptos::prelude::*;
use reactive_stores::Store;
use serde_json::Value;

use crate::backend::ScreenTimeBackend;
use crate::error::{Error, Result};
use crate::sync::Liveness;

#[derive(Clone, Debug, PartialEq, Store)]
pub struct ScreenTimeState {
    pub total_minutes: f64,
    /// Earned but not yet approved by a parent
    pub pending_minutes: f64,
    /// True until the first balance arrives
    pub loading: bool,
}

impl Default for ScreenTimeState {
    fn default() -> Self {
        Self {
            total_minutes: 0.0,
            pending_minutes: 0.0,
            loading: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScreenTimeAction {
    Init { total_minutes: f64, pending_minutes: f64 },
    AddPending(f64),
    /// Move all pending minutes into the balance
    ApprovePending,
    Withdraw(f64),
    Reset,
}

impl ScreenTimeState {
    pub fn reduce(self, action: ScreenTimeAction) -> Self {
        match action {
            ScreenTimeAction::Init {
                total_minutes,
                pending_minutes,
            } => Self {
                total_minutes,
                pending_minutes,
                loading: false,
            },
            ScreenTimeAction::AddPending(minutes) => Self {
                pending_minutes: self.pending_minutes + minutes,
                ..self
            },
            ScreenTimeAction::ApprovePending => Self {
                total_minutes: self.total_minutes + self.pending_minutes,
                pending_minutes: 0.0,
                ..self
            },
            ScreenTimeAction::Withdraw(minutes) => Self {
                total_minutes: (self.total_minutes - minutes).max(0.0),
                ..self
            },
            ScreenTimeAction::Reset => Self::default(),
        }
    }
}

pub type ScreenTimeStore = Store<ScreenTimeState>;

pub struct ScreenTimeSync<B> {
    backend: Arc<B>,
    store: ScreenTimeStore,
    liveness: Liveness,
}

impl<B> Clone for ScreenTimeSync<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: self.store,
            liveness: self.liveness.clone(),
        }
    }
}

impl<B: ScreenTimeBackend> ScreenTimeSync<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_store(backend, Store::new(ScreenTimeState::default()))
    }

    pub fn with_store(backend: Arc<B>, store: ScreenTimeStore) -> Self {
        Self {
            backend,
            store,
            liveness: Liveness::new(),
        }
    }

    pub fn store(&self) -> ScreenTimeStore {
        self.store
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn detach(&self) {
        self.liveness.detach();
    }

    pub fn snapshot(&self) -> ScreenTimeState {
        self.store.get_untracked()
    }

    fn apply(&self, action: ScreenTimeAction) -> bool {
        self.liveness.is_alive()
            && self
                .store
                .try_update(|state| *state = state.clone().reduce(action))
                .is_some()
    }

    /// Reload the balance from the signed-in profile
    pub async fn refresh(&self) -> Result<()> {
        let profile = self.backend.profile().await.inspect_err(|err| {
            tracing::warn!(error = %err, "failed to refresh screen time");
        })?;
        tracing::debug!(
            total = profile.total_time,
            pending = profile.pending_time,
            "screen time refreshed"
        );
        self.apply(ScreenTimeAction::Init {
            total_minutes: profile.total_time,
            pending_minutes: profile.pending_time,
        });
        Ok(())
    }

    /// Spend minutes. The balance drops immediately and is re-read from the
    /// backend whether or not the request succeeds.
    pub async fn withdraw(&self, child_id: &str, minutes: u32) -> Result<Value> {
        if minutes == 0 {
            return Err(Error::Validation("minutes must be positive".into()));
        }
        self.apply(ScreenTimeAction::Withdraw(f64::from(minutes)));

        let result = self.backend.withdraw_time(child_id, minutes).await;
        if let Err(err) = &result {
            tracing::warn!(child_id, minutes, error = %err, "failed to withdraw time; restoring balance");
        }
        if let Err(err) = self.refresh().await {
            tracing::debug!(error = %err, "balance refresh after withdraw failed");
        }
        result
    }

    /// Stop a running withdrawal
    pub async fn stop_withdraw(&self) -> Result<()> {
        self.backend.withdraw_time_stop().await.inspect_err(|err| {
            tracing::warn!(error = %err, "failed to stop time");
        })?;
        self.refresh().await
    }

    /// Forget the balance until the next refresh
    pub fn reset(&self) {
        self.apply(ScreenTimeAction::Reset);
    }

    /// Local preview of minutes earned by a submitted task
    pub fn add_pending(&self, minutes: f64) {
        self.apply(ScreenTimeAction::AddPending(minutes));
    }

    /// Local preview of a parent approving all pending minutes
    pub fn approve_pending(&self) {
        self.apply(ScreenTimeAction::ApprovePending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockBalance {
        profile: Mutex<(f64, f64)>,
        fail_withdraw: bool,
        fail_profile: bool,
        withdrawals: Mutex<Vec<(String, u32)>>,
    }

    impl MockBalance {
        fn new(total: f64, pending: f64) -> Self {
            Self {
                profile: Mutex::new((total, pending)),
                fail_withdraw: false,
                fail_profile: false,
                withdrawals: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ScreenTimeBackend for MockBalance {
        async fn profile(&self) -> Result<UserProfile> {
            if self.fail_profile {
                return Err(Error::Timeout { timeout_ms: 10_000 });
            }
            let (total, pending) = *self.profile.lock().unwrap();
            Ok(serde_json::from_value(json!({
                "role": "CHILD",
                "totalTime": total,
                "pendingTime": pending
            }))
            .unwrap())
        }

        async fn withdraw_time(&self, child_id: &str, minutes: u32) -> Result<Value> {
            self.withdrawals.lock().unwrap().push((child_id.to_string(), minutes));
            if self.fail_withdraw {
                return Err(Error::Status {
                    status: 400,
                    message: "not enough time".into(),
                });
            }
            let mut profile = self.profile.lock().unwrap();
            profile.0 -= f64::from(minutes);
            Ok(json!({"remaining": profile.0}))
        }

        async fn withdraw_time_stop(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reducer() {
        let state = ScreenTimeState::default().reduce(ScreenTimeAction::Init {
            total_minutes: 30.0,
            pending_minutes: 5.0,
        });
        assert!(!state.loading);

        let state = state.reduce(ScreenTimeAction::AddPending(10.0));
        assert_eq!(state.pending_minutes, 15.0);

        let state = state.reduce(ScreenTimeAction::ApprovePending);
        assert_eq!(state.total_minutes, 45.0);
        assert_eq!(state.pending_minutes, 0.0);

        let state = state.reduce(ScreenTimeAction::Withdraw(100.0));
        assert_eq!(state.total_minutes, 0.0);
    }

    #[tokio::test]
    async fn test_refresh_loads_profile_balance() {
        let sync = ScreenTimeSync::new(Arc::new(MockBalance::new(42.0, 7.5)));
        assert!(sync.snapshot().loading);

        sync.refresh().await.unwrap();

        let state = sync.snapshot();
        assert_eq!(state.total_minutes, 42.0);
        assert_eq!(state.pending_minutes, 7.5);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_withdraw_settles_on_server_balance() {
        let backend = Arc::new(MockBalance::new(60.0, 0.0));
        let sync = ScreenTimeSync::new(Arc::clone(&backend));
        sync.refresh().await.unwrap();

        sync.withdraw("kid-1", 15).await.unwrap();

        assert_eq!(sync.snapshot().total_minutes, 45.0);
        assert_eq!(backend.withdrawals.lock().unwrap()[0], ("kid-1".to_string(), 15));
    }

    #[tokio::test]
    async fn test_failed_withdraw_restores_balance() {
        let backend = Arc::new(MockBalance {
            fail_withdraw: true,
            ..MockBalance::new(60.0, 0.0)
        });
        let sync = ScreenTimeSync::new(backend);
        sync.refresh().await.unwrap();

        let result = sync.withdraw("kid-1", 15).await;

        assert!(matches!(result, Err(Error::Status { status: 400, .. })));
        assert_eq!(sync.snapshot().total_minutes, 60.0);
    }

    #[tokio::test]
    async fn test_withdraw_result_kept_when_refresh_fails() {
        let backend = Arc::new(MockBalance {
            fail_profile: true,
            ..MockBalance::new(60.0, 0.0)
        });
        let sync = ScreenTimeSync::new(Arc::clone(&backend));

        let body = sync.withdraw("kid-1", 10).await.unwrap();

        assert_eq!(body, json!({"remaining": 50.0}));
        assert!(sync.snapshot().loading);
    }

    #[tokio::test]
    async fn test_reset_clears_balance() {
        let sync = ScreenTimeSync::new(Arc::new(MockBalance::new(42.0, 3.0)));
        sync.refresh().await.unwrap();

        sync.reset();

        assert_eq!(sync.snapshot(), ScreenTimeState::default());
    }

    #[tokio::test]
    async fn test_zero_withdraw_rejected() {
        let backend = Arc::new(MockBalance::new(60.0, 0.0));
        let sync = ScreenTimeSync::new(Arc::clone(&backend));

        assert!(matches!(sync.withdraw("kid-1", 0).await, Err(Error::Validation(_))));
        assert!(backend.withdrawals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detached_balance_not_updated() {
        let sync = ScreenTimeSync::new(Arc::new(MockBalance::new(42.0, 0.0)));
        sync.detach();

        sync.refresh().await.unwrap();
        sync.add_pending(5.0);

        assert_eq!(sync.snapshot(), ScreenTimeState::default());
    }
}
