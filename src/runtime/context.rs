// SPDX-License-Identifier: MIT

//! Logging context handed to each component.
//!
//! Nothing in this crate installs a global subscriber.  The embedding program
//! creates one `SandboxContext` at start-up and passes it down; worker threads
//! enter the same dispatcher so their events land in the same sink.

use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone)]
pub struct SandboxContext {
    level: LevelFilter,
    dispatch: Dispatch,
}

impl SandboxContext {
    /// Log to stderr at the given level.
    pub fn new(level: LevelFilter) -> Self {
        let subscriber = tracing_subscriber::registry().with(level).with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        );
        Self { level, dispatch: Dispatch::new(subscriber) }
    }

    /// Use a caller supplied sink.
    pub fn with_dispatch(level: LevelFilter, dispatch: Dispatch) -> Self {
        Self { level, dispatch }
    }

    /// Drop every event.
    pub fn silent() -> Self {
        Self { level: LevelFilter::OFF, dispatch: Dispatch::none() }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Route this thread's events to the context until the guard drops.
    pub fn enter(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for SandboxContext {
    fn default() -> Self {
        Self::new(LevelFilter::INFO)
    }
}

impl std::fmt::Debug for SandboxContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxContext").field("level", &self.level).finish()
    }
}
