// src/watch/watcher.rs

//! A single watch: filtering, debouncing and dispatching of events.
//!
//! Per watch:
//! - events whose operation is in the skip mask are dropped;
//! - the path is classified with `stat`; newly created directories are
//!   subscribed so later changes inside them are seen;
//! - unmatched paths are dropped;
//! - matched events are dispatched at once (`wait == 0`) or buffered until
//!   the debounce timer armed by the first buffered event fires.
//!
//! The pending buffer and the execution lock are separate, so events keep
//! being accepted while a batch runs.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::engine::Engine;
use crate::errors::{BudError, RegistrationError, Result};
use crate::fs::{FileKind, FileSystem};
use crate::task::TaskName;
use crate::watch::event::{Event, Op};
use crate::watch::selector::Selector;
use crate::watch::subscriber::Subscriber;

pub const DEFAULT_WAIT: Duration = Duration::from_millis(100);
pub const DEFAULT_SKIP: Op = Op::CHMOD;

/// Called with every dispatched batch, after the watch's tasks ran.
pub type WatchCallback = Arc<dyn Fn(&[Event]) -> anyhow::Result<()> + Send + Sync>;

/// Watch registration builder.
///
/// ```
/// use std::time::Duration;
/// use bud::watch::{Op, WatchDef};
///
/// let def = WatchDef::new(["src/**/*.rs"])
///     .base_dir(".")
///     .tasks(["build"])
///     .skip(Op::CHMOD | Op::REMOVE)
///     .wait(Duration::from_millis(200));
/// # let _ = def;
/// ```
#[derive(Clone)]
pub struct WatchDef {
    patterns: Vec<String>,
    base_dir: Option<PathBuf>,
    tasks: Vec<TaskName>,
    callback: Option<WatchCallback>,
    skip: Option<Op>,
    wait: Option<Duration>,
    merge: Option<bool>,
}

impl WatchDef {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            base_dir: None,
            tasks: Vec::new(),
            callback: None,
            skip: None,
            wait: None,
            merge: None,
        }
    }

    /// Directory patterns are evaluated against. Defaults to `.`.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Tasks run, in order, for every dispatched batch.
    pub fn tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Event]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }

    /// Operations to ignore. An empty mask falls back to [`DEFAULT_SKIP`].
    pub fn skip(mut self, ops: Op) -> Self {
        self.skip = Some(ops);
        self
    }

    /// Debounce interval; zero dispatches every event on its own.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Collapse buffered events for the same path into one.
    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = Some(merge);
        self
    }

    pub(crate) fn build(self) -> std::result::Result<Watch, RegistrationError> {
        if self.patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(RegistrationError::EmptyPatterns);
        }
        if self.tasks.is_empty() && self.callback.is_none() {
            return Err(RegistrationError::WatchWithoutTarget);
        }
        let selector =
            Selector::new(&self.patterns).map_err(|err| RegistrationError::InvalidPattern {
                pattern: self.patterns.join(", "),
                reason: format!("{err:#}"),
            })?;

        Ok(Watch {
            base_dir: self.base_dir.unwrap_or_else(|| PathBuf::from(".")),
            selector,
            tasks: self.tasks,
            callback: self.callback,
            skip: self.skip.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SKIP),
            wait: self.wait.unwrap_or(DEFAULT_WAIT),
            merge: self.merge.unwrap_or(true),
            state: Mutex::new(WatchState::Created),
            pending: Mutex::new(Vec::new()),
            exec_lock: Mutex::new(()),
        })
    }
}

impl fmt::Debug for WatchDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchDef")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Created,
    Subscribed,
    Watching,
    Stopped,
}

/// What happened to one incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Skipped,
    /// `stat` failed, or the path vanished and the event does not explain it.
    Dropped,
    Unmatched,
    /// Run now (`wait == 0`).
    Immediate(Event),
    /// Added to the pending buffer; `arm` is true for the first one.
    Buffered { arm: bool },
}

pub struct Watch {
    base_dir: PathBuf,
    selector: Selector,
    tasks: Vec<TaskName>,
    callback: Option<WatchCallback>,
    skip: Op,
    wait: Duration,
    merge: bool,

    state: Mutex<WatchState>,
    pending: Mutex<Vec<Event>>,
    exec_lock: Mutex<()>,
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("base_dir", &self.base_dir)
            .field("selector", &self.selector)
            .field("tasks", &self.tasks)
            .field("skip", &self.skip)
            .field("wait", &self.wait)
            .field("merge", &self.merge)
            .finish_non_exhaustive()
    }
}

impl Watch {
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn skip_mask(&self) -> Op {
        self.skip
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn merges(&self) -> bool {
        self.merge
    }

    pub fn state(&self) -> WatchState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: WatchState) {
        *lock(&self.state) = state;
    }

    /// Number of buffered, not yet dispatched events.
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Filter one event and, if it matches, dispatch or buffer it.
    pub fn accept(
        &self,
        event: Event,
        fs: &dyn FileSystem,
        subscriber: &mut dyn Subscriber,
    ) -> Disposition {
        trace!(event = %event, "received event");

        if event.op.intersects(self.skip) {
            trace!(event = %event, "event skipped");
            return Disposition::Skipped;
        }

        let is_dir = match fs.stat(&event.path) {
            Ok(FileKind::Dir) => {
                if event.is_create() {
                    match subscriber.subscribe(&event.path) {
                        Ok(()) => debug!(path = ?event.path, "subscribed new directory"),
                        Err(err) => warn!(path = ?event.path, "failed to subscribe: {err:#}"),
                    }
                }
                true
            }
            Ok(FileKind::File) => false,
            Ok(FileKind::Missing) if event.is_remove() || event.is_rename() => false,
            Ok(FileKind::Missing) => {
                debug!(event = %event, "path vanished before it could be inspected");
                return Disposition::Dropped;
            }
            Err(err) => {
                warn!(path = ?event.path, "stat failed: {err:#}");
                return Disposition::Dropped;
            }
        };

        if !self.selector.is_match(&self.base_dir, &event.path, is_dir) {
            trace!(event = %event, "event does not match");
            return Disposition::Unmatched;
        }

        if self.wait.is_zero() {
            return Disposition::Immediate(event);
        }
        Disposition::Buffered {
            arm: self.buffer(event),
        }
    }

    /// Append to the pending buffer, OR-ing into an existing entry for the
    /// same path when merging. Returns true if the buffer was empty.
    pub(crate) fn buffer(&self, event: Event) -> bool {
        let mut pending = lock(&self.pending);
        let first = pending.is_empty();

        if self.merge {
            if let Some(existing) = pending.iter_mut().find(|e| e.path == event.path) {
                existing.op |= event.op;
                return first;
            }
        }
        pending.push(event);
        first
    }

    /// Swap the pending buffer out.
    pub(crate) fn take_pending(&self) -> Vec<Event> {
        std::mem::take(&mut *lock(&self.pending))
    }

    /// Run the watch's tasks through `engine`, then the callback.
    ///
    /// Batches of one watch never overlap. The first failure abandons the
    /// rest of the batch.
    pub fn dispatch(&self, engine: &Engine, events: &[Event]) -> Result<()> {
        let _running = lock(&self.exec_lock);
        debug!(events = events.len(), tasks = ?self.tasks, "dispatching batch");

        for task in &self.tasks {
            engine.run_task(task)?;
        }

        if let Some(callback) = &self.callback {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(events)));
            match outcome {
                Ok(result) => result.map_err(BudError::Other)?,
                Err(_) => {
                    error!("watch callback panicked");
                    return Err(BudError::Panicked {
                        task: "watch callback".to_string(),
                        message: "callback panicked".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// [`Watch::dispatch`] on the blocking pool, logging failures.
    pub(crate) async fn dispatch_blocking(self: Arc<Self>, engine: Arc<Engine>, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let joined = tokio::task::spawn_blocking(move || self.dispatch(&engine, &events)).await;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("watch run failed: {err}"),
            Err(err) => error!("watch run aborted: {err}"),
        }
    }
}

/// Handle one incoming event for `watch`, including arming the debounce
/// timer.
pub(crate) async fn handle_event(
    watch: &Arc<Watch>,
    engine: &Arc<Engine>,
    event: Event,
    fs: &dyn FileSystem,
    subscriber: &mut dyn Subscriber,
) {
    match watch.accept(event, fs, subscriber) {
        Disposition::Immediate(event) => {
            Arc::clone(watch)
                .dispatch_blocking(Arc::clone(engine), vec![event])
                .await;
        }
        Disposition::Buffered { arm: true } => {
            let watch = Arc::clone(watch);
            let engine = Arc::clone(engine);
            tokio::spawn(async move {
                tokio::time::sleep(watch.wait).await;
                let batch = watch.take_pending();
                watch.dispatch_blocking(engine, batch).await;
            });
        }
        Disposition::Buffered { arm: false }
        | Disposition::Skipped
        | Disposition::Dropped
        | Disposition::Unmatched => {}
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[derive(Default)]
    struct Recorded(Vec<PathBuf>);

    impl Subscriber for Recorded {
        fn subscribe(&mut self, dir: &Path) -> anyhow::Result<()> {
            self.0.push(dir.to_path_buf());
            Ok(())
        }
    }

    fn watch(def: WatchDef) -> Watch {
        def.base_dir("/p").build().unwrap()
    }

    fn fs() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/a.rs");
        fs.add_file("/p/src/b.rs");
        fs.add_file("/p/notes.txt");
        fs
    }

    #[test]
    fn registration_requires_patterns_and_a_target() {
        let err = WatchDef::new(Vec::<String>::new()).tasks(["t"]).build().unwrap_err();
        assert_eq!(err, RegistrationError::EmptyPatterns);

        let err = WatchDef::new(["**/*.rs"]).build().unwrap_err();
        assert_eq!(err, RegistrationError::WatchWithoutTarget);

        let err = WatchDef::new(["src/[.rs"]).tasks(["t"]).build().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    #[test]
    fn defaults_apply() {
        let w = WatchDef::new(["*"]).tasks(["t"]).skip(Op::empty()).build().unwrap();
        assert_eq!(w.skip_mask(), Op::CHMOD);
        assert_eq!(w.wait(), DEFAULT_WAIT);
        assert!(w.merges());
        assert_eq!(w.base_dir(), Path::new("."));
        assert_eq!(w.state(), WatchState::Created);
    }

    #[test]
    fn chmod_is_skipped_by_default() {
        let w = watch(WatchDef::new(["src/*.rs"]).tasks(["t"]));
        let d = w.accept(Event::new("/p/src/a.rs", Op::CHMOD), &fs(), &mut Recorded::default());
        assert_eq!(d, Disposition::Skipped);
        assert_eq!(w.pending_len(), 0);
    }

    #[test]
    fn unmatched_and_vanished_paths_are_discarded() {
        let w = watch(WatchDef::new(["src/*.rs"]).tasks(["t"]));
        let fs = fs();
        let mut sub = Recorded::default();

        assert_eq!(
            w.accept(Event::new("/p/notes.txt", Op::WRITE), &fs, &mut sub),
            Disposition::Unmatched
        );
        assert_eq!(
            w.accept(Event::new("/p/src/gone.rs", Op::WRITE), &fs, &mut sub),
            Disposition::Dropped
        );
        // A removal explains the missing path.
        assert_eq!(
            w.accept(Event::new("/p/src/gone.rs", Op::REMOVE), &fs, &mut sub),
            Disposition::Buffered { arm: true }
        );
    }

    #[test]
    fn new_directories_are_subscribed() {
        let w = watch(WatchDef::new(["src/**/*.rs"]).tasks(["t"]));
        let fs = fs();
        fs.add_dir("/p/src/nested");
        let mut sub = Recorded::default();

        w.accept(Event::new("/p/src/nested", Op::CREATE), &fs, &mut sub);
        assert_eq!(sub.0, vec![PathBuf::from("/p/src/nested")]);
    }

    #[test]
    fn merge_or_combines_same_path() {
        let w = watch(WatchDef::new(["src/*.rs"]).tasks(["t"]));
        let fs = fs();
        let mut sub = Recorded::default();

        assert_eq!(
            w.accept(Event::new("/p/src/a.rs", Op::CREATE), &fs, &mut sub),
            Disposition::Buffered { arm: true }
        );
        assert_eq!(
            w.accept(Event::new("/p/src/a.rs", Op::WRITE), &fs, &mut sub),
            Disposition::Buffered { arm: false }
        );
        w.accept(Event::new("/p/src/b.rs", Op::WRITE), &fs, &mut sub);

        let batch = w.take_pending();
        assert_eq!(
            batch,
            vec![
                Event::new("/p/src/a.rs", Op::CREATE | Op::WRITE),
                Event::new("/p/src/b.rs", Op::WRITE),
            ]
        );
        assert_eq!(w.pending_len(), 0);
    }

    #[test]
    fn without_merge_every_event_is_kept() {
        let w = watch(WatchDef::new(["src/*.rs"]).tasks(["t"]).merge(false));
        let fs = fs();
        let mut sub = Recorded::default();
        w.accept(Event::new("/p/src/a.rs", Op::WRITE), &fs, &mut sub);
        w.accept(Event::new("/p/src/a.rs", Op::WRITE), &fs, &mut sub);
        assert_eq!(w.take_pending().len(), 2);
    }

    #[test]
    fn zero_wait_dispatches_immediately() {
        let w = watch(WatchDef::new(["src/*.rs"]).tasks(["t"]).wait(Duration::ZERO));
        let d = w.accept(Event::new("/p/src/a.rs", Op::WRITE), &fs(), &mut Recorded::default());
        assert_eq!(d, Disposition::Immediate(Event::new("/p/src/a.rs", Op::WRITE)));
    }

    #[test]
    fn dispatch_runs_tasks_then_callback_and_stops_on_failure() {
        let engine = Engine::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        engine
            .register(crate::task::TaskDef::new("g", "t").run(move || {
                o.lock().unwrap().push("task".to_string());
                Ok(())
            }))
            .unwrap();

        let o = Arc::clone(&order);
        let w = watch(WatchDef::new(["*"]).tasks(["g.t"]).callback(move |events| {
            o.lock().unwrap().push(format!("callback:{}", events.len()));
            Ok(())
        }));
        w.dispatch(&engine, &[Event::new("/p/x", Op::WRITE)]).unwrap();
        assert_eq!(*order.lock().unwrap(), ["task", "callback:1"]);

        let w = watch(WatchDef::new(["*"]).tasks(["g.missing"]).callback(|_| {
            panic!("callback must not run")
        }));
        let err = w.dispatch(&engine, &[]).unwrap_err();
        assert!(matches!(err, BudError::TaskNotFound(_)));
    }
}
