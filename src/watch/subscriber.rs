// src/watch/subscriber.rs

//! Directory subscriptions.
//!
//! A watch never talks to `notify` directly. It asks a
//! [`SubscriptionBackend`] for a [`Subscriber`] bound to the sending half
//! of its event channel, then subscribes directories one by one. Dropping
//! the subscriber ends the subscription.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::trace;

use crate::watch::event::Event;

pub type RawEventError = notify::Error;
/// What arrives on a watch's event channel.
pub type RawEvent = std::result::Result<Event, RawEventError>;
pub type EventSender = mpsc::UnboundedSender<RawEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RawEvent>;

pub trait Subscriber: Send {
    /// Start delivering events for the entries of `dir` (not recursive).
    fn subscribe(&mut self, dir: &Path) -> Result<()>;
}

pub trait SubscriptionBackend: Send + Sync + fmt::Debug {
    fn open(&self, events: EventSender) -> Result<Box<dyn Subscriber>>;
}

/// Backend built on notify's platform watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend;

impl SubscriptionBackend for NotifyBackend {
    fn open(&self, events: EventSender) -> Result<Box<dyn Subscriber>> {
        Ok(Box::new(NotifySubscriber::new(events)?))
    }
}

pub struct NotifySubscriber {
    inner: RecommendedWatcher,
}

impl fmt::Debug for NotifySubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySubscriber").finish()
    }
}

impl NotifySubscriber {
    pub fn new(events: EventSender) -> Result<Self> {
        // Called synchronously on notify's own thread.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let forwarded = match res {
                    Ok(event) => Event::from_notify(event)
                        .into_iter()
                        .try_for_each(|e| events.send(Ok(e))),
                    Err(err) => events.send(Err(err)),
                };
                if forwarded.is_err() {
                    // Receiver gone: the watch loop has stopped.
                    trace!("dropping notify event after watch stopped");
                }
            },
            notify::Config::default(),
        )
        .context("creating filesystem watcher")?;
        Ok(Self { inner })
    }
}

impl Subscriber for NotifySubscriber {
    fn subscribe(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("subscribing {:?}", dir))
    }
}
