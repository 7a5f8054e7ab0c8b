#![allow(dead_code)]

use std::sync::Arc;

use bud::engine::Engine;
use bud::task::TaskDef;
use bud_test_utils::recording::{Journal, RecordingExecutor};

pub use bud_test_utils::init_tracing;

/// Register `group.name` backed by a [`RecordingExecutor`] labelled with the
/// qualified name.
pub fn recorded(engine: &Engine, journal: &Journal, group: &str, name: &str, after: &[&str]) {
    let label = format!("{group}.{name}");
    engine
        .register(
            TaskDef::new(group, name)
                .after(after.iter().copied())
                .structured(RecordingExecutor::new(label, journal)),
        )
        .unwrap();
}

pub fn shared_engine() -> Arc<Engine> {
    Arc::new(Engine::new())
}
