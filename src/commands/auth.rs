//! Account Commands
//!
//! Bindings for `/api/auth`.

use reqwest::Method;

use super::{ApiClient, Area};
use crate::error::Result;
use crate::models::{ProfileUpdate, UserProfile};

impl ApiClient {
    /// Role, family and screen-time balance of the signed-in user
    pub async fn me(&self) -> Result<UserProfile> {
        let body = self.get(Area::Auth, "me", &[]).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        self.call(Method::PATCH, Area::Auth, "update", &[], Some(update))
            .await
            .map(|_| ())
    }
}
