//! Application state
//!
//! Every collaborator is built once at startup and handed to the router;
//! handlers never reach for global handles.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::auth::{AuthGate, PgSessionStore, SessionManager, SessionStore};
use crate::config::Config;
use crate::db::{EntityStore, PgEntityStore, ResourceDef};
use crate::lifecycle::{EntityLifecycle, LifecycleHooks, StandardHooks};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application key + session checks
    pub gate: AuthGate,
    /// Issues and closes user sessions
    pub sessions: SessionManager,
    /// Entity persistence
    pub store: Arc<dyn EntityStore>,
    /// Hooks injected into every lifecycle
    pub hooks: Arc<dyn LifecycleHooks>,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: &Config,
        store: Arc<dyn EntityStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let session_codec = config.session_token_codec();

        Self {
            gate: AuthGate::new(
                config.app_key.as_str(),
                session_codec.clone(),
                session_store.clone(),
            ),
            sessions: SessionManager::new(session_codec, session_store),
            store,
            hooks: Arc::new(StandardHooks::new(config.super_admin.clone())),
        }
    }

    /// Connect to PostgreSQL, run migrations and build the state.
    ///
    /// Also returns the session store so the caller can schedule its sweep.
    pub async fn connect(config: &Config) -> Result<(Self, PgSessionStore), BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_with(config.database.connect_options()?)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        let sessions = PgSessionStore::new(pool.clone());
        let state = Self::new(
            config,
            Arc::new(PgEntityStore::new(pool)),
            Arc::new(sessions.clone()),
        );
        Ok((state, sessions))
    }

    /// Lifecycle bound to one resource
    pub fn lifecycle(&self, def: &'static ResourceDef) -> EntityLifecycle {
        EntityLifecycle::new(def, self.store.clone(), self.hooks.clone())
    }
}
