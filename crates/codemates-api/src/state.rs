use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use codemates_db::Database;
use codemates_gateway::dispatcher::Dispatcher;

use crate::error::{ApiError, ApiResult};
use crate::matchmaking::Matchmaker;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub dispatcher: Dispatcher,
    pub matchmaker: Matchmaker,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, token_ttl: chrono::Duration) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            token_ttl,
            dispatcher: Dispatcher::new(),
            matchmaker: Matchmaker::new(),
        })
    }

    /// Run blocking DB work off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow!("blocking task failed"))
            })?
            .map_err(ApiError::from)
    }

    /// Current username for `user_id`, read from the profile rather than
    /// the token so renames show up immediately.
    pub async fn username_of(self: &Arc<Self>, user_id: uuid::Uuid) -> ApiResult<String> {
        let id = user_id.to_string();
        let profile = self.run_db(move |db| db.get_profile(&id)).await?;
        profile
            .map(|p| p.username)
            .ok_or_else(|| ApiError::not_found("Profile not found"))
    }
}
