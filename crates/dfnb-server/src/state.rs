//! Application state shared by all handlers.
//!
//! Every store is constructed once here and handed out by `Arc`. Per-session
//! graphs carry their own `tokio::sync::RwLock` inside the registry, so no
//! lock is held at this level.

use std::sync::Arc;

use dfnb_state::{GraphRegistry, StalenessTracker};

use crate::backend::{HttpKernelBackend, KernelBackend};
use crate::config::ServerConfig;
use crate::execution::{ExecutionCoordinator, ExecutionOptions};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub registry: Arc<GraphRegistry>,
    pub staleness: Arc<StalenessTracker>,
    pub config: Arc<ServerConfig>,
    /// Backend new sessions start with, from `backend_url`.
    pub default_backend: Option<Arc<dyn KernelBackend>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(GraphRegistry::new(config.view_channel_capacity));
        let staleness = Arc::new(StalenessTracker::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&registry),
            Arc::clone(&staleness),
        ));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&staleness),
            ExecutionOptions {
                record_timing: config.record_timing,
                enable_tags: config.enable_tags,
            },
        ));

        let default_backend = config.backend_url.as_deref().and_then(|url| {
            match HttpKernelBackend::new(url) {
                Ok(backend) => {
                    tracing::info!(endpoint = backend.endpoint(), "sessions connect to kernel bridge");
                    Some(Arc::new(backend) as Arc<dyn KernelBackend>)
                }
                Err(err) => {
                    tracing::warn!("ignoring backend url: {}", err);
                    None
                }
            }
        });

        AppState {
            sessions,
            coordinator,
            registry,
            staleness,
            config: Arc::new(config),
            default_backend,
        }
    }

    /// State with default configuration (for testing).
    pub fn in_memory() -> Self {
        Self::new(ServerConfig::default())
    }
}
