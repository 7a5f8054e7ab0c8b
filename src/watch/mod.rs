// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling watch patterns into a [`Selector`].
//! - Subscribing directories through a [`SubscriptionBackend`] (`notify` by
//!   default) and mapping raw notifications to [`Event`]s.
//! - Filtering, debouncing and merging events per [`Watch`], then running
//!   the watch's tasks through the [`Engine`](crate::engine::Engine).
//!
//! It knows nothing about task dependencies; the engine resolves those.

pub mod event;
pub mod manager;
pub mod selector;
pub mod subscriber;
pub mod watcher;

pub use event::{Event, Op, skip_op};
pub use manager::WatchManager;
pub use selector::Selector;
pub use subscriber::{
    EventReceiver, EventSender, NotifyBackend, NotifySubscriber, RawEvent, RawEventError, Subscriber,
    SubscriptionBackend,
};
pub use watcher::{
    DEFAULT_SKIP, DEFAULT_WAIT, Disposition, Watch, WatchCallback, WatchDef, WatchState,
};
