//! Startup and shutdown sequencing for the provider.


use futures::future::BoxFuture;
use futures::FutureExt;

use crate::errors::Error;
use crate::errors::Result;

/// Provider lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    NotReady,
    Ready,
}

type StartupHook = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;
type ShutdownHook = Box<dyn FnOnce() + Send>;

/// Runs registered startup hooks exactly once, in registration order, then
/// flips to `Ready`; shutdown hooks run in registration order and are
/// cleared afterwards.
pub struct StateHandler {
    status: ProviderStatus,
    startup: Vec<StartupHook>,
    shutdown: Vec<ShutdownHook>,
}

impl StateHandler {
    pub fn new() -> Self {
        Self {
            status: ProviderStatus::NotReady,
            startup: Vec::new(),
            shutdown: Vec::new(),
        }
    }

    pub fn status(&self) -> ProviderStatus {
        self.status
    }

    /// Registers a hook to run during `init`.
    pub fn register_startup<F, Fut>(&mut self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.startup.push(Box::new(move || hook().boxed()));
    }

    /// Registers a hook to run during `shutdown`.
    pub fn register_shutdown<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shutdown.push(Box::new(hook));
    }

    /// Idempotent by rejection: fails when already `Ready`. A hook error
    /// leaves the handler `NotReady` with the remaining hooks discarded.
    pub async fn init(&mut self) -> Result<()> {
        if self.status != ProviderStatus::NotReady {
            return Err(Error::AlreadyInitialized);
        }
        for hook in std::mem::take(&mut self.startup) {
            hook().await?;
        }
        self.status = ProviderStatus::Ready;
        Ok(())
    }

    /// Runs and clears the shutdown hooks. Safe to call more than once.
    /// Startup hooks that never ran are discarded along with the resources
    /// they captured.
    pub fn shutdown(&mut self) {
        self.startup.clear();
        for hook in std::mem::take(&mut self.shutdown) {
            hook();
        }
    }
}

impl Default for StateHandler {
    fn default() -> Self {
        Self::new()
    }
}
