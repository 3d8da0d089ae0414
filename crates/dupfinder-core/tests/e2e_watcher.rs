/// End-to-end watcher integration tests.
///
/// These drive the platform change-notification backend against real files
/// in a temporary directory. Notifications are asynchronous, so every wait
/// polls a channel or the registry snapshot against a generous deadline
/// rather than sleeping for a fixed time.
use crossbeam_channel::{unbounded, Receiver};
use dupfinder_core::watcher::registry::WatchedDirectory;
use dupfinder_core::{log, FileWatcher, WatchError, WatcherConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEADLINE: Duration = Duration::from_secs(10);

// ── Helpers ──────────────────────────────────────────────────────────────────

fn start() -> (FileWatcher, Receiver<PathBuf>) {
    let watcher = FileWatcher::start(WatcherConfig::default(), log::discard())
        .expect("change notification must be available");
    let (tx, rx) = unbounded();
    watcher.set_callback(move |path: &Path| {
        let _ = tx.send(path.to_path_buf());
    });
    (watcher, rx)
}

fn write(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, rel).unwrap();
    path
}

fn next_gone(rx: &Receiver<PathBuf>) -> PathBuf {
    rx.recv_timeout(DEADLINE)
        .expect("no disappearance reported within the deadline")
}

/// Poll the registry until `pred` holds for its snapshot.
fn wait_for_registry<F>(watcher: &FileWatcher, what: &str, pred: F) -> Vec<WatchedDirectory>
where
    F: Fn(&[WatchedDirectory]) -> bool,
{
    let deadline = Instant::now() + DEADLINE;
    loop {
        let snapshot = watcher.watched().expect("watcher stopped unexpectedly");
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(20));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Deleting one file of a class reports exactly that file; deleting the only
/// watched file of a directory releases the directory.
#[test]
fn deletions_are_reported_per_file() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let a = write(tmp.path(), "d1/a");
    let b = write(tmp.path(), "d1/b");
    let c = write(tmp.path(), "d2/c");

    let (watcher, gone) = start();
    for p in [&a, &b, &c] {
        watcher.add_file(p).unwrap();
    }
    assert_eq!(watcher.watched().unwrap().len(), 2);

    fs::remove_file(&a).unwrap();
    assert_eq!(next_gone(&gone), a);

    fs::remove_file(&c).unwrap();
    assert_eq!(next_gone(&gone), c);

    let d1 = fs::canonicalize(tmp.path().join("d1")).unwrap();
    let snapshot = wait_for_registry(&watcher, "d2 teardown", |s| s.len() == 1);
    assert_eq!(snapshot[0].dir, d1);
    assert_eq!(snapshot[0].files, vec![b.clone()]);
    assert!(gone.try_recv().is_err(), "b must not be reported");

    watcher.shutdown().unwrap();
}

/// Two files in one directory share one entry and both get reported.
#[test]
fn shared_directory_reports_both_then_tears_down() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let a = write(tmp.path(), "a");
    let b = write(tmp.path(), "b");

    let (watcher, gone) = start();
    watcher.add_file(&a).unwrap();
    watcher.add_file(&b).unwrap();

    let snapshot = watcher.watched().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].files, vec![a.clone(), b.clone()]);

    fs::remove_file(&a).unwrap();
    fs::remove_file(&b).unwrap();
    let mut reported = vec![next_gone(&gone), next_gone(&gone)];
    reported.sort();
    assert_eq!(reported, vec![a, b]);

    wait_for_registry(&watcher, "teardown", |s| s.is_empty());
}

/// Registering the same file twice still yields a single report.
#[test]
fn double_registration_reports_once() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let a = write(tmp.path(), "a");
    let keep = write(tmp.path(), "keep");

    let (watcher, gone) = start();
    watcher.add_file(&a).unwrap();
    watcher.add_file(&a).unwrap();
    watcher.add_file(&keep).unwrap();

    fs::remove_file(&a).unwrap();
    assert_eq!(next_gone(&gone), a);
    wait_for_registry(&watcher, "a removed", |s| s[0].files == [keep.clone()]);
    assert!(gone.recv_timeout(Duration::from_millis(300)).is_err());
}

/// Writing to a watched file is not a disappearance.
#[test]
fn modification_is_not_reported() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let a = write(tmp.path(), "a");
    let marker = write(tmp.path(), "marker");

    let (watcher, gone) = start();
    watcher.add_file(&a).unwrap();
    watcher.add_file(&marker).unwrap();

    fs::write(&a, "changed contents").unwrap();
    write(tmp.path(), "unrelated");
    // Deleting the marker flushes everything queued before it.
    fs::remove_file(&marker).unwrap();
    assert_eq!(next_gone(&gone), marker);
    assert!(gone.try_recv().is_err());
}

/// Only regular files can be registered.
#[test]
fn non_files_are_rejected() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let (watcher, _gone) = start();

    assert!(matches!(
        watcher.add_file(tmp.path()),
        Err(WatchError::NotARegularFile { .. })
    ));
    assert!(matches!(
        watcher.add_file(&tmp.path().join("missing")),
        Err(WatchError::NotARegularFile { .. })
    ));
    assert!(watcher.watched().unwrap().is_empty());
}

/// Dropping the watcher releases everything and later handles start clean.
#[test]
fn drop_stops_the_loop() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let a = write(tmp.path(), "a");
    {
        let (watcher, _gone) = start();
        watcher.add_file(&a).unwrap();
        assert!(watcher.is_running());
    }

    let (watcher, gone) = start();
    watcher.add_file(&a).unwrap();
    fs::remove_file(&a).unwrap();
    assert_eq!(next_gone(&gone), a);
}
