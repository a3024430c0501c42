//! Watch mode end to end with a scripted engine

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chapterize::convert::{BookConverter, ConvertOptions};
use chapterize::storage::{FileState, FileStatus, StateStore};
use chapterize::watch::{Daemon, WatchSettings};
use chapterize::ChapterizeError;
use common::FakeEngine;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn settings(root: &Path, out: &Path, key: Option<&str>) -> WatchSettings {
    WatchSettings {
        root: root.to_path_buf(),
        options: ConvertOptions {
            output_dir: out.to_path_buf(),
            activation_bytes: key.map(str::to_string),
            ..ConvertOptions::default()
        },
        threads: 2,
        interval: Duration::from_millis(100),
    }
}

async fn wait_for_status(store: &StateStore, file: &Path, status: FileStatus) -> bool {
    for _ in 0..100 {
        if let Some(state) = store.get(file).unwrap() {
            if state.status == Some(status) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn wait_for_terminal(store: &StateStore, file: &Path) -> Option<FileState> {
    for _ in 0..100 {
        if let Some(state) = store.get(file).unwrap() {
            if state.status.map(|s| s.is_terminal()).unwrap_or(false) {
                return Some(state);
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    None
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_file_is_converted_once() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let engine = Arc::new(FakeEngine::new(Some("good"), 3));
    let daemon = Arc::new(
        Daemon::new(
            settings(watch_dir.path(), out_dir.path(), Some("good")),
            BookConverter::new(engine.clone()),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let handle = {
        let daemon = daemon.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { daemon.run(shutdown).await })
    };

    // Let the watch and the initial scan settle
    tokio::time::sleep(Duration::from_millis(500)).await;

    let book = watch_dir.path().join("Book.aax");
    std::fs::write(&book, b"pretend audio").unwrap();
    std::fs::write(watch_dir.path().join("notes.txt"), b"ignored").unwrap();

    let store = StateStore::in_dir(out_dir.path());
    let state = wait_for_terminal(&store, &book)
        .await
        .expect("file never reached a terminal state");
    assert_eq!(state.status, Some(FileStatus::Processed));

    // Longer than several quiescence windows; no second dispatch may appear
    tokio::time::sleep(Duration::from_millis(500)).await;

    shutdown.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(daemon.queue().total_enqueued(), 1);
    assert_eq!(engine.chapter_count(), 3);
    assert_eq!(store.snapshot().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_existing_file_picked_up_at_start() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let book = watch_dir.path().join("nested").join("old.AAX");
    common::touch(&book);

    let engine = Arc::new(FakeEngine::new(Some("good"), 1));
    let daemon = Arc::new(
        Daemon::new(
            settings(watch_dir.path(), out_dir.path(), Some("good")),
            BookConverter::new(engine),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let handle = {
        let daemon = daemon.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { daemon.run(shutdown).await })
    };

    let store = StateStore::in_dir(out_dir.path());
    let state = wait_for_terminal(&store, &book).await.unwrap();
    assert_eq!(state.status, Some(FileStatus::Processed));

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_missing_engine_stops_before_watching() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let daemon = Daemon::new(
        settings(watch_dir.path(), out_dir.path(), Some("good")),
        BookConverter::new(Arc::new(FakeEngine::missing())),
    )
    .unwrap();

    let err = daemon.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ChapterizeError::FfmpegNotFound));
}

#[tokio::test]
async fn test_root_must_be_directory() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::new(
        settings(&dir.path().join("absent"), dir.path(), Some("good")),
        BookConverter::new(Arc::new(FakeEngine::new(None, 1))),
    )
    .unwrap();

    let err = daemon.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ChapterizeError::NotADirectory(_)));
}

#[tokio::test]
async fn test_interrupt_while_waiting_for_auth() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let daemon = Daemon::new(
        settings(watch_dir.path(), out_dir.path(), None),
        BookConverter::new(Arc::new(FakeEngine::new(None, 1))),
    )
    .unwrap();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    daemon.run(shutdown).await.unwrap();
    assert_eq!(daemon.queue().total_enqueued(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_engine_lost_mid_run_stops_daemon() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let mut engine = FakeEngine::new(Some("good"), 3);
    engine.vanishes_on_export = true;
    let daemon = Daemon::new(
        settings(watch_dir.path(), out_dir.path(), Some("good")),
        BookConverter::new(Arc::new(engine)),
    )
    .unwrap();

    let shutdown = CancellationToken::new();
    let book = watch_dir.path().join("Book.aax");
    let writer = {
        let book = book.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            std::fs::write(&book, b"pretend audio").unwrap();
        })
    };

    // Nobody cancels `shutdown`; the run must end by itself
    let result = tokio::time::timeout(Duration::from_secs(10), daemon.run(shutdown))
        .await
        .expect("daemon kept running after losing the engine");
    writer.await.unwrap();

    let err = result.unwrap_err();
    assert!(err.is_fatal_for_run());
    match err {
        ChapterizeError::ChapterExportFailed { track, source, .. } => {
            assert_eq!(track, 1);
            assert!(matches!(*source, ChapterizeError::FfmpegNotFound));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let store = StateStore::in_dir(out_dir.path());
    let state = store.get(&book).unwrap().unwrap();
    assert_eq!(state.status, Some(FileStatus::Error));
    assert!(state.end_date.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_during_conversion_finishes_current_step() {
    let watch_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let book = watch_dir.path().join("Slow.aax");
    common::touch(&book);

    let mut engine = FakeEngine::new(Some("good"), 5);
    engine.chapter_delay = Some(Duration::from_millis(400));
    let engine = Arc::new(engine);
    let daemon = Arc::new(
        Daemon::new(
            settings(watch_dir.path(), out_dir.path(), Some("good")),
            BookConverter::new(engine.clone()),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let handle = {
        let daemon = daemon.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { daemon.run(shutdown).await })
    };

    let store = StateStore::in_dir(out_dir.path());
    assert!(wait_for_status(&store, &book, FileStatus::Processing).await);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();

    // The chapter being written completes; the rest are never started
    let state = store.get(&book).unwrap().unwrap();
    assert_eq!(state.status, Some(FileStatus::Error));
    assert!(state.end_date.is_some());
    assert!(engine.chapter_count() < 5);
}
