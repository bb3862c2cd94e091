//! Runtime orchestration: configuration, logging and the serve loop.
//!
//! The runtime owns a [`Dispatcher`] and feeds it messages from a tokio
//! channel, dispatching each message on its own task. Transports push
//! inbound messages into the channel and drain replies from whatever
//! [`MessageSendingOperations`] the runtime was built with.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use waypoint_runtime::WaypointRuntime;
//! use waypoint_core::ChannelSendingOperations;
//!
//! let (sender, replies) = ChannelSendingOperations::channel();
//! let runtime = WaypointRuntime::builder()
//!     .config_file("config/waypoint.toml")
//!     .controller(Arc::new(ChatController::default()))
//!     .sender(sender)
//!     .build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(256);
//! runtime.run(rx).await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use waypoint_core::{BoxedSender, Message, MessageSendingOperations};
use waypoint_framework::{
    Controller, Dispatched, Dispatcher, HandlerMethod, HandlerRegistry, RegistrationResult,
};

use crate::config::{ConfigLoader, WaypointConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

// =============================================================================
// Stats
// =============================================================================

/// Counts of what a serve loop did with its messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub received: u64,
    /// Handled without a reply.
    pub handled: u64,
    /// Handled with a reply sent.
    pub forwarded: u64,
    pub ignored: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    handled: AtomicU64,
    forwarded: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ServeStats {
        ServeStats {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// WaypointRuntime
// =============================================================================

/// A configured dispatcher plus the loop that feeds it.
pub struct WaypointRuntime {
    config: WaypointConfig,
    dispatcher: Dispatcher,
}

impl WaypointRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &WaypointConfig {
        &self.config
    }

    /// The dispatcher; clones share its registry and sender.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatches messages from `rx` until the channel closes or `shutdown`
    /// is cancelled, then waits for in-flight messages to finish.
    pub async fn serve(
        &self,
        mut rx: mpsc::Receiver<Message>,
        shutdown: CancellationToken,
    ) -> ServeStats {
        let counters = Arc::new(Counters::default());
        let mut tasks = JoinSet::new();

        info!(
            methods = self.dispatcher.registry().method_count(),
            mappings = self.dispatcher.registry().mapping_count(),
            "Waypoint runtime serving"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, draining in-flight messages");
                    break;
                }
                message = rx.recv() => {
                    let Some(message) = message else {
                        debug!("Inbound channel closed");
                        break;
                    };
                    Counters::bump(&counters.received);

                    let dispatcher = self.dispatcher.clone();
                    let counters = Arc::clone(&counters);
                    tasks.spawn(async move { dispatch_one(&dispatcher, &message, &counters) });
                }
            }

            while let Some(result) = tasks.try_join_next() {
                reap(result, &counters);
            }
        }

        while let Some(result) = tasks.join_next().await {
            reap(result, &counters);
        }

        let stats = counters.snapshot();
        info!(
            received = stats.received,
            forwarded = stats.forwarded,
            failed = stats.failed,
            "Waypoint runtime stopped"
        );
        stats
    }

    /// Serves `rx` until it closes or Ctrl+C / SIGTERM arrives.
    pub async fn run(&self, rx: mpsc::Receiver<Message>) -> RuntimeResult<ServeStats> {
        let shutdown = CancellationToken::new();
        let serve = self.serve(rx, shutdown.clone());
        tokio::pin!(serve);

        info!("Waypoint runtime is now running. Press Ctrl+C to stop.");

        tokio::select! {
            stats = &mut serve => return Ok(stats),
            signal = wait_for_shutdown() => signal?,
        }

        shutdown.cancel();
        Ok(serve.await)
    }
}

fn dispatch_one(dispatcher: &Dispatcher, message: &Message, counters: &Counters) {
    match dispatcher.handle_message(message) {
        Ok(Dispatched::Ignored(reason)) => {
            Counters::bump(&counters.ignored);
            debug!(
                ?reason,
                destination = ?message.headers().destination(),
                "Message ignored"
            );
        }
        Ok(Dispatched::Handled { .. }) => Counters::bump(&counters.handled),
        Ok(Dispatched::Forwarded { .. }) => Counters::bump(&counters.forwarded),
        Err(err) => {
            Counters::bump(&counters.failed);
            error!(method = err.method(), error = %err, "Dispatch failed");
        }
    }
}

fn reap(result: Result<(), JoinError>, counters: &Counters) {
    if let Err(err) = result {
        Counters::bump(&counters.failed);
        error!(error = %err, "Dispatch task panicked");
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

type Registration = Box<dyn FnOnce(&mut HandlerRegistry) -> RegistrationResult<usize>>;

/// Builder for a [`WaypointRuntime`].
///
/// Controllers are registered in [`build`](Self::build), after logging is
/// initialized, so registration is logged.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<WaypointConfig>,
    registry: HandlerRegistry,
    registrations: Vec<Registration>,
    sender: Option<BoxedSender>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            registry: HandlerRegistry::new(),
            registrations: Vec::new(),
            sender: None,
            init_logging: true,
        }
    }

    /// Uses `config` as is instead of loading from files and environment.
    pub fn config(mut self, config: WaypointConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration over the loaded sources.
    pub fn merge(mut self, config: WaypointConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Starts from `registry`, e.g. one built with custom resolvers.
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn controller<C: Controller>(mut self, controller: Arc<C>) -> Self {
        self.registrations
            .push(Box::new(move |registry| registry.register_handler(controller)));
        self
    }

    pub fn method(mut self, method: HandlerMethod) -> Self {
        self.registrations
            .push(Box::new(move |registry| registry.register_method(method)));
        self
    }

    /// Where replies go.
    pub fn sender<S: MessageSendingOperations + 'static>(mut self, sender: S) -> Self {
        self.sender = Some(Arc::new(sender));
        self
    }

    /// Skips installing the global tracing subscriber.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads and validates configuration, initializes logging, then registers
    /// every controller and method.
    pub fn build(self) -> RuntimeResult<WaypointRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let sender = self.sender.ok_or(RuntimeError::MissingSender)?;

        let mut registry = self.registry;
        for register in self.registrations {
            register(&mut registry)?;
        }

        info!(
            log_level = %config.logging.level,
            prefixes = ?config.dispatch.destination_prefixes,
            broker_prefix = %config.dispatch.broker_prefix,
            "Runtime initialized from configuration"
        );

        let dispatcher = Dispatcher::with_options(registry, sender, config.dispatch.to_options());
        Ok(WaypointRuntime { config, dispatcher })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
