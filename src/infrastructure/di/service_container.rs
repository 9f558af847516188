//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::application::services::KvService;
use crate::config::Settings;
use crate::infrastructure::nats::NatsStore;
use crate::infrastructure::traits::{KvStore, Prompter, TerminalPrompter};
use crate::infrastructure::InfraResult;

/// Container holding settings and the I/O boundaries.
///
/// The store connection is opened on first use, so argument validation and
/// confirmation prompts never touch the network.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Confirmation prompts for destructive commands
    pub prompter: Arc<dyn Prompter>,

    store: OnceLock<Arc<dyn KvStore>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            prompter: Arc::new(TerminalPrompter),
            store: OnceLock::new(),
        }
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        store: Arc<dyn KvStore>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(store);
        Self {
            settings: Arc::new(settings),
            prompter,
            store: cell,
        }
    }

    /// Replace the confirmation prompter.
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// The store, connecting on first call.
    pub fn store(&self) -> InfraResult<Arc<dyn KvStore>> {
        if let Some(store) = self.store.get() {
            return Ok(Arc::clone(store));
        }
        debug!("store: connecting");
        let store: Arc<dyn KvStore> = Arc::new(NatsStore::connect(&self.settings.connection)?);
        Ok(Arc::clone(self.store.get_or_init(|| store)))
    }

    /// Key-value service over the (lazily connected) store.
    pub fn kv_service(&self) -> InfraResult<KvService> {
        Ok(KvService::new(self.store()?))
    }
}
