// src/watch/manager.rs

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::errors::{RegistrationError, Result};
use crate::fs::{FileSystem, RealFileSystem, walk_dirs};
use crate::watch::subscriber::{EventReceiver, NotifyBackend, Subscriber, SubscriptionBackend};
use crate::watch::watcher::{Watch, WatchDef, WatchState, handle_event};

struct Running {
    exit: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns every registered watch and their event loops.
pub struct WatchManager {
    engine: Arc<Engine>,
    fs: Arc<dyn FileSystem>,
    backend: Arc<dyn SubscriptionBackend>,
    watches: Vec<Arc<Watch>>,
    running: Vec<Running>,
}

impl std::fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchManager")
            .field("watches", &self.watches)
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl WatchManager {
    /// Manager on the real filesystem and notify.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_backend(engine, Arc::new(RealFileSystem), Arc::new(NotifyBackend))
    }

    pub fn with_backend(
        engine: Arc<Engine>,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn SubscriptionBackend>,
    ) -> Self {
        Self {
            engine,
            fs,
            backend,
            watches: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Compile and add a watch. Nothing is subscribed until
    /// [`WatchManager::start`].
    pub fn register(&mut self, def: WatchDef) -> std::result::Result<Arc<Watch>, RegistrationError> {
        let watch = Arc::new(def.build()?);
        debug!(?watch, "registered watch");
        self.watches.push(Arc::clone(&watch));
        Ok(watch)
    }

    pub fn watches(&self) -> &[Arc<Watch>] {
        &self.watches
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Subscribe every directory under each watch's base and spawn one
    /// event loop per watch. Returns once all loops are running.
    ///
    /// A directory that cannot be read or subscribed is logged and skipped.
    /// An unreadable base directory or a backend that cannot open fails the
    /// start; loops already started are stopped again.
    pub async fn start(&mut self) -> Result<()> {
        for watch in self.watches.clone() {
            match self.start_one(&watch) {
                Ok(running) => self.running.push(running),
                Err(err) => {
                    self.stop_all().await;
                    return Err(err);
                }
            }
        }
        info!(watches = self.running.len(), "watching for changes");
        Ok(())
    }

    fn start_one(&self, watch: &Arc<Watch>) -> Result<Running> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriber = self.backend.open(tx)?;

        let dirs = walk_dirs(self.fs.as_ref(), watch.base_dir())
            .with_context(|| format!("listing directories under {:?}", watch.base_dir()))?;
        let mut subscribed = 0;
        for dir in &dirs {
            match subscriber.subscribe(dir) {
                Ok(()) => subscribed += 1,
                Err(err) => warn!(path = ?dir, "failed to subscribe: {err:#}"),
            }
        }
        watch.set_state(WatchState::Subscribed);
        debug!(base_dir = ?watch.base_dir(), subscribed, "subscribed watch");

        let (exit_tx, exit_rx) = oneshot::channel();
        let handle = tokio::spawn(event_loop(
            Arc::clone(watch),
            Arc::clone(&self.engine),
            Arc::clone(&self.fs),
            subscriber,
            rx,
            exit_rx,
        ));
        Ok(Running {
            exit: exit_tx,
            handle,
        })
    }

    /// Run until `shutdown` resolves, then stop every watch.
    pub async fn start_all_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.watches.is_empty() {
            return Ok(());
        }
        self.start().await?;
        shutdown.await;
        debug!("got shutdown signal");
        self.stop_all().await;
        Ok(())
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn start_all(&mut self) -> Result<()> {
        self.start_all_until(shutdown_signal()).await
    }

    /// Signal every loop to exit and wait for them. Triggered runs already
    /// in progress are left to finish.
    pub async fn stop_all(&mut self) {
        for running in self.running.drain(..) {
            let _ = running.exit.send(());
            if let Err(err) = running.handle.await {
                warn!("watch loop ended abnormally: {err}");
            }
        }
    }
}

async fn event_loop(
    watch: Arc<Watch>,
    engine: Arc<Engine>,
    fs: Arc<dyn FileSystem>,
    mut subscriber: Box<dyn Subscriber>,
    mut events: EventReceiver,
    mut exit: oneshot::Receiver<()>,
) {
    watch.set_state(WatchState::Watching);

    loop {
        tokio::select! {
            _ = &mut exit => break,
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    handle_event(&watch, &engine, event, fs.as_ref(), subscriber.as_mut()).await;
                }
                Some(Err(err)) => warn!("watcher caught an error: {err}"),
                None => break,
            },
        }
    }

    drop(subscriber);
    watch.set_state(WatchState::Stopped);
    debug!(base_dir = ?watch.base_dir(), "watch loop finished");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
