// tests/watch_serialization.rs
mod common;
use crate::common::init_tracing;

use std::sync::Arc;
use std::time::Duration;

use bud::engine::Engine;
use bud::fs::mock::MockFileSystem;
use bud::task::TaskDef;
use bud::watch::{Event, Op, WatchDef, WatchManager};
use bud_test_utils::backend::FakeBackend;
use bud_test_utils::recording::{Journal, RecordingExecutor, Step};
use bud_test_utils::{wait_until, with_timeout};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_from_different_watches_never_overlap() {
    init_tracing();
    let journal = Journal::new();
    let engine = Arc::new(Engine::new());
    engine
        .register(
            TaskDef::new("g", "slow").structured(RecordingExecutor::new("slow", &journal).sleeping(300)),
        )
        .unwrap();
    engine
        .register(TaskDef::new("g", "fast").structured(RecordingExecutor::new("fast", &journal)))
        .unwrap();

    let fs = MockFileSystem::new();
    fs.add_file("/p/a/one.txt");
    fs.add_file("/p/b/two.txt");

    let backend = FakeBackend::new();
    let mut manager = WatchManager::with_backend(engine, Arc::new(fs), Arc::new(backend.clone()));
    manager
        .register(
            WatchDef::new(["a/*.txt"])
                .base_dir("/p")
                .tasks(["g.slow"])
                .wait(Duration::ZERO),
        )
        .unwrap();
    manager
        .register(
            WatchDef::new(["b/*.txt"])
                .base_dir("/p")
                .tasks(["g.fast"])
                .wait(Duration::ZERO),
        )
        .unwrap();
    manager.start().await.unwrap();

    backend.send(0, Event::new("/p/a/one.txt", Op::WRITE));
    assert!(wait_until(Duration::from_secs(2), || journal.started() == ["slow"]).await);
    backend.send(1, Event::new("/p/b/two.txt", Op::WRITE));

    assert!(wait_until(Duration::from_secs(3), || journal.finished().len() == 2).await);
    let slow_done = journal
        .position(|s| *s == Step::Finished("slow".into()))
        .unwrap();
    let fast_start = journal
        .position(|s| matches!(s, Step::Started { task, .. } if task == "fast"))
        .unwrap();
    assert!(slow_done < fast_start, "{:?}", journal.steps());

    with_timeout(manager.stop_all()).await;
}

#[tokio::test]
async fn failing_batch_is_logged_and_the_watch_keeps_going() {
    let journal = Journal::new();
    let engine = Arc::new(Engine::new());
    engine
        .register(TaskDef::new("g", "ok").structured(RecordingExecutor::new("ok", &journal)))
        .unwrap();

    let fs = MockFileSystem::new();
    fs.add_file("/p/x.txt");
    let backend = FakeBackend::new();
    let mut manager = WatchManager::with_backend(engine, Arc::new(fs), Arc::new(backend.clone()));
    manager
        .register(
            WatchDef::new(["*.txt"])
                .base_dir("/p")
                .tasks(["g.missing"])
                .wait(Duration::ZERO),
        )
        .unwrap();
    manager
        .register(
            WatchDef::new(["*.txt"])
                .base_dir("/p")
                .tasks(["g.ok"])
                .wait(Duration::ZERO),
        )
        .unwrap();
    manager.start().await.unwrap();

    // Watch 0 fails on the unknown task twice; both times its loop survives.
    assert!(backend.send(0, Event::new("/p/x.txt", Op::WRITE)));
    assert!(backend.send(0, Event::new("/p/x.txt", Op::WRITE)));
    assert!(backend.send(1, Event::new("/p/x.txt", Op::WRITE)));
    assert!(wait_until(Duration::from_secs(2), || journal.finished() == ["ok"]).await);
    assert!(backend.send(0, Event::new("/p/x.txt", Op::WRITE)));

    with_timeout(manager.stop_all()).await;
}
