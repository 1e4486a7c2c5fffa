//! User lookup and creation.

use std::sync::Arc;

use tracing::info;

use super::Providers;
use crate::error::Result;
use crate::model::User;
use crate::state::State;

/// What `create_user_if_missing` found or made.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: User,
    pub created: bool,
}

pub struct UserEngine {
    state: Arc<dyn State>,
}

impl UserEngine {
    pub fn new(providers: &Providers) -> Self {
        Self {
            state: Arc::clone(&providers.state),
        }
    }

    /// `None` if the user does not exist.
    pub async fn get_user(&self, name: &str) -> Result<Option<User>> {
        match self.state.get_user(name).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_user_if_missing(&self, name: &str) -> Result<CreatedUser> {
        if let Some(user) = self.get_user(name).await? {
            return Ok(CreatedUser {
                user,
                created: false,
            });
        }
        let user = self.state.upsert_user(User::new(name)).await?;
        info!(user = %name, "created user");
        Ok(CreatedUser {
            user,
            created: true,
        })
    }

    /// Pause or resume a user. Paused users are skipped by reconciliation.
    pub async fn set_inactive(&self, name: &str, inactive: bool) -> Result<User> {
        let mut user = self.create_user_if_missing(name).await?.user;
        user.inactive = inactive;
        let user = self.state.upsert_user(user).await?;
        info!(user = %name, inactive, "updated user");
        Ok(user)
    }
}

/// Read a user, creating it with default settings on first access.
pub(crate) async fn load_or_create(state: &dyn State, name: &str) -> Result<User> {
    match state.get_user(name).await {
        Ok(user) => Ok(user),
        Err(e) if e.is_not_found() => {
            info!(user = %name, "created user on first access");
            state.upsert_user(User::new(name)).await
        }
        Err(e) => Err(e),
    }
}
