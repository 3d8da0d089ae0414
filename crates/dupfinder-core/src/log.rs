//! The textual log stream shared by the scanner and the watcher.
//!
//! Lines are delivered with their `\r\n` terminator already attached so a
//! collaborator can append them verbatim to a text view. Each producer keeps
//! its own order; nothing is promised across producers.
use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::Arc;

/// Terminator appended to every log line.
pub const LINE_END: &str = "\r\n";

/// A capability accepting progress lines.
///
/// The scanner calls it from the walking thread; the watcher calls it from
/// its completion thread. Marshalling to a UI thread is the implementor's
/// business.
pub trait LogSink {
    fn log_line(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str),
{
    fn log_line(&self, line: &str) {
        self(line)
    }
}

/// A sink the watcher can keep for the life of its completion thread.
pub type SharedLog = Arc<dyn LogSink + Send + Sync>;

/// Forwards lines to another thread. Once the receiver is gone lines are
/// dropped.
pub fn forward_to(tx: Sender<String>) -> SharedLog {
    Arc::new(move |line: &str| {
        let _ = tx.send(line.to_owned());
    })
}

/// A sink that discards everything.
pub fn discard() -> SharedLog {
    Arc::new(|_: &str| {})
}

pub(crate) fn hashing_completed(path: &Path) -> String {
    format!("Hashing completed: {}{LINE_END}", path.display())
}

pub(crate) fn file_error(path: &Path, reason: &dyn std::fmt::Display) -> String {
    format!("Error processing file {}: {reason}{LINE_END}", path.display())
}

pub(crate) fn watch_rearm_failed(dir: &Path, reason: &dyn std::fmt::Display) -> String {
    format!("Watch re-arm failed for {}: {reason}{LINE_END}", dir.display())
}

pub(crate) fn watch_failed(dir: &Path, reason: &dyn std::fmt::Display) -> String {
    format!("Watch failed for {}: {reason}{LINE_END}", dir.display())
}

pub(crate) fn watcher_stopped(reason: &dyn std::fmt::Display) -> String {
    format!("Watcher stopped: {reason}{LINE_END}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |line: &str| seen.lock().push(line.to_owned());
        sink.log_line("one");
        sink.log_line("two");
        assert_eq!(*seen.lock(), vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn forwarding_sink_survives_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let sink = forward_to(tx);
        sink.log_line("kept");
        assert_eq!(rx.recv().unwrap(), "kept");
        drop(rx);
        // Must not panic once the receiving side is gone.
        sink.log_line("dropped");
    }

    #[test]
    fn line_formats_are_stable() {
        let p = Path::new("/data/a.bin");
        assert_eq!(hashing_completed(p), "Hashing completed: /data/a.bin\r\n");
        assert_eq!(
            file_error(p, &"Permission denied"),
            "Error processing file /data/a.bin: Permission denied\r\n"
        );
        assert!(watch_rearm_failed(Path::new("/data"), &"gone").ends_with(LINE_END));
    }
}
