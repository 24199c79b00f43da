//! Startup and shutdown hooks.
//!
//! Startup hooks run in registration order and stop at the first failure.
//! Shutdown hooks run in reverse order and all of them run; the first
//! failure is reported after the rest have had their turn.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use tracing::{error, info};

pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type HookFn = Box<dyn FnOnce() -> HookFuture + Send>;

/// A named, run-once lifecycle callback.
pub struct Hook {
    name: String,
    run: HookFn,
}

impl Hook {
    pub fn new<F, Fut>(name: impl Into<String>, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(move || Box::pin(hook())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

#[derive(Debug, Default)]
pub struct Lifespan {
    startup: Vec<Hook>,
    shutdown: Vec<Hook>,
}

impl Lifespan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_startup(&mut self, hook: Hook) {
        self.startup.push(hook);
    }

    pub fn on_shutdown(&mut self, hook: Hook) {
        self.shutdown.push(hook);
    }

    pub fn startup_hooks(&self) -> impl Iterator<Item = &str> {
        self.startup.iter().map(Hook::name)
    }

    pub fn shutdown_hooks(&self) -> impl Iterator<Item = &str> {
        self.shutdown.iter().map(Hook::name)
    }

    /// Runs the startup hooks, returning the shutdown half.
    ///
    /// On failure the remaining startup hooks are dropped unrun and the
    /// shutdown half comes back alongside the error so the caller can
    /// still release what the earlier hooks acquired.
    pub async fn startup(self) -> Result<Shutdown, (anyhow::Error, Shutdown)> {
        let shutdown = Shutdown {
            hooks: self.shutdown,
        };

        for hook in self.startup {
            info!(hook = %hook.name, "running startup hook");
            let name = hook.name;
            if let Err(err) = (hook.run)()
                .await
                .with_context(|| format!("startup hook `{name}` failed"))
            {
                error!(hook = %name, error = %format!("{err:#}"), "startup aborted");
                return Err((err, shutdown));
            }
        }

        Ok(shutdown)
    }
}

/// Shutdown hooks left over after startup.
#[derive(Debug, Default)]
pub struct Shutdown {
    hooks: Vec<Hook>,
}

impl Shutdown {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut first_error = None;

        for hook in self.hooks.into_iter().rev() {
            info!(hook = %hook.name, "running shutdown hook");
            let name = hook.name;
            if let Err(err) = (hook.run)()
                .await
                .with_context(|| format!("shutdown hook `{name}` failed"))
            {
                error!(hook = %name, error = %format!("{err:#}"), "shutdown hook failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
