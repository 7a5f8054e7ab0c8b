use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bud::watch::{Event, EventSender, RawEventError, Subscriber, SubscriptionBackend};

#[derive(Debug, Default)]
struct Channels {
    senders: Vec<EventSender>,
    subscribed: Vec<Vec<PathBuf>>,
    rejected: Vec<PathBuf>,
}

/// Subscription backend without a real watcher.
///
/// Each opened subscription is numbered in opening order (one per watch,
/// in registration order). Tests push events with [`FakeBackend::send`]
/// and inspect subscribed directories with [`FakeBackend::subscribed`].
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    channels: Arc<Mutex<Channels>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.channels.lock().unwrap().senders.len()
    }

    /// Deliver `event` to subscription `index`. Returns false once the
    /// receiving loop has stopped.
    pub fn send(&self, index: usize, event: Event) -> bool {
        let sender = self.channels.lock().unwrap().senders[index].clone();
        sender.send(Ok(event)).is_ok()
    }

    pub fn send_error(&self, index: usize, message: &str) -> bool {
        let sender = self.channels.lock().unwrap().senders[index].clone();
        sender.send(Err(RawEventError::generic(message))).is_ok()
    }

    /// Make every later `subscribe` of `dir` fail.
    pub fn reject(&self, dir: impl Into<PathBuf>) {
        self.channels.lock().unwrap().rejected.push(dir.into());
    }

    pub fn subscribed(&self, index: usize) -> Vec<PathBuf> {
        self.channels.lock().unwrap().subscribed[index].clone()
    }
}

impl SubscriptionBackend for FakeBackend {
    fn open(&self, events: EventSender) -> anyhow::Result<Box<dyn Subscriber>> {
        let mut channels = self.channels.lock().unwrap();
        channels.senders.push(events);
        channels.subscribed.push(Vec::new());
        Ok(Box::new(FakeSubscriber {
            index: channels.senders.len() - 1,
            channels: Arc::clone(&self.channels),
        }))
    }
}

struct FakeSubscriber {
    index: usize,
    channels: Arc<Mutex<Channels>>,
}

impl Subscriber for FakeSubscriber {
    fn subscribe(&mut self, dir: &Path) -> anyhow::Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if channels.rejected.iter().any(|r| r == dir) {
            anyhow::bail!("cannot subscribe {:?}", dir);
        }
        channels.subscribed[self.index].push(dir.to_path_buf());
        Ok(())
    }
}
