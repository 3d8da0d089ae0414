//! Change source backed by the `notify` crate's recommended watcher
//! (inotify, FSEvents, kqueue).
//!
//! `notify` keeps a watch armed until it is removed, so re-arming is a
//! no-op. Events arrive on a channel fed from notify's own thread and are
//! regrouped into per-directory batches.
use super::completion::Command;
use super::records::{ChangeAction, ChangeBatch, ChangeRecord};
use super::source::{ChangeSource, NoopWake, Wake, Wakeup};
use crossbeam_channel::{select, unbounded, Receiver};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct NotifySource {
    watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    armed: HashSet<PathBuf>,
    pending: VecDeque<Wakeup>,
}

impl NotifySource {
    pub(crate) fn new() -> io::Result<Self> {
        let (tx, events) = unbounded::<notify::Result<Event>>();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(into_io)?;
        Ok(Self {
            watcher,
            events,
            armed: HashSet::new(),
            pending: VecDeque::new(),
        })
    }

    fn queue_event(&mut self, event: Event) {
        if event.need_rescan() {
            debug!("Watcher: backend asked for a rescan");
            self.queue_rescan();
            return;
        }
        for batch in batches_for(&event, &self.armed) {
            self.pending.push_back(Wakeup::Batch(batch));
        }
    }

    fn queue_error(&mut self, err: notify::Error) {
        let failed: Vec<PathBuf> = err
            .paths
            .iter()
            .filter_map(|p| owning_dir(p, &self.armed))
            .collect();
        if failed.is_empty() {
            // Nothing to pin it on: assume events were lost everywhere.
            warn!("Watcher: backend error: {err}");
            self.queue_rescan();
            return;
        }
        let message = err.to_string();
        for dir in failed {
            self.pending.push_back(Wakeup::WatchFailed {
                dir,
                error: io::Error::other(message.clone()),
            });
        }
    }

    fn queue_rescan(&mut self) {
        for dir in &self.armed {
            self.pending
                .push_back(Wakeup::Batch(ChangeBatch::overflow(dir.clone())));
        }
    }
}

impl ChangeSource for NotifySource {
    fn arm(&mut self, dir: &Path) -> io::Result<()> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(into_io)?;
        self.armed.insert(dir.to_path_buf());
        Ok(())
    }

    fn rearm(&mut self, _dir: &Path) -> io::Result<()> {
        Ok(())
    }

    fn disarm(&mut self, dir: &Path) {
        if self.armed.remove(dir) {
            if let Err(e) = self.watcher.unwatch(dir) {
                debug!("Watcher: unwatch {} failed: {e}", dir.display());
            }
        }
    }

    fn next_wakeup(&mut self, commands: &Receiver<Command>) -> io::Result<Wakeup> {
        let events = self.events.clone();
        loop {
            if let Some(wakeup) = self.pending.pop_front() {
                return Ok(wakeup);
            }
            select! {
                recv(commands) -> msg => {
                    return Ok(msg.map(Wakeup::Command).unwrap_or(Wakeup::Shutdown));
                }
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => self.queue_event(event),
                    Ok(Err(err)) => self.queue_error(err),
                    Err(_) => return Err(io::Error::other("change notification channel closed")),
                },
            }
        }
    }

    fn waker(&self) -> Arc<dyn Wake> {
        Arc::new(NoopWake)
    }
}

/// Translate one event into batches for the armed directories it touches.
fn batches_for(event: &Event, armed: &HashSet<PathBuf>) -> Vec<ChangeBatch> {
    let action_at = |index: usize| match &event.kind {
        EventKind::Remove(_) => Some(ChangeAction::Removed),
        EventKind::Create(_) => Some(ChangeAction::Added),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeAction::RenamedOldName),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeAction::RenamedNewName),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if index > 0 => {
            Some(ChangeAction::RenamedNewName)
        }
        // The old half of a paired rename, or a rename the backend could not
        // pair up; the attribute check settles which side it was.
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeAction::RenamedOldName),
        EventKind::Modify(_) => Some(ChangeAction::Modified),
        _ => None,
    };

    let mut batches: Vec<ChangeBatch> = Vec::new();
    for (index, path) in event.paths.iter().enumerate() {
        let Some(action) = action_at(index) else {
            continue;
        };
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };
        if !armed.contains(dir) {
            continue;
        }
        let record = ChangeRecord::new(action, name);
        match batches.iter_mut().find(|b| b.dir == dir) {
            Some(batch) => batch.records.push(record),
            None => batches.push(ChangeBatch::new(dir.to_path_buf(), vec![record])),
        }
    }
    batches
}

fn owning_dir(path: &Path, armed: &HashSet<PathBuf>) -> Option<PathBuf> {
    if armed.contains(path) {
        return Some(path.to_path_buf());
    }
    path.parent()
        .filter(|dir| armed.contains(*dir))
        .map(Path::to_path_buf)
}

fn into_io(err: notify::Error) -> io::Error {
    match err.kind {
        notify::ErrorKind::Io(source) => source,
        notify::ErrorKind::PathNotFound => io::Error::from(io::ErrorKind::NotFound),
        kind => io::Error::other(notify::Error::new(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn armed(dirs: &[&str]) -> HashSet<PathBuf> {
        dirs.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn removals_map_to_departures_in_armed_directories() {
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path("/w/a.txt".into())
            .add_path("/elsewhere/b.txt".into());
        let batches = batches_for(&event, &armed(&["/w"]));
        assert_eq!(
            batches,
            vec![ChangeBatch::new(
                "/w".into(),
                vec![ChangeRecord::new(ChangeAction::Removed, "a.txt")]
            )]
        );
    }

    #[test]
    fn paired_rename_splits_old_and_new() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/w/old".into())
            .add_path("/v/new".into());
        let batches = batches_for(&event, &armed(&["/w", "/v"]));
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].records[0].action, ChangeAction::RenamedOldName);
        assert_eq!(batches[1].dir, PathBuf::from("/v"));
        assert_eq!(batches[1].records[0].action, ChangeAction::RenamedNewName);
    }

    #[test]
    fn creates_and_writes_are_not_departures() {
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path("/w/a".into());
        let write = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/w/a".into());
        let set = armed(&["/w"]);
        for event in [create, write] {
            let batches = batches_for(&event, &set);
            assert!(!batches[0].records[0].action.is_departure());
        }
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path("/w/a".into());
        assert!(batches_for(&access, &set).is_empty());
    }

    #[test]
    fn errors_are_pinned_to_the_owning_directory() {
        let set = armed(&["/w"]);
        assert_eq!(owning_dir(Path::new("/w"), &set), Some(PathBuf::from("/w")));
        assert_eq!(owning_dir(Path::new("/w/f"), &set), Some(PathBuf::from("/w")));
        assert_eq!(owning_dir(Path::new("/x/f"), &set), None);

        let err = into_io(notify::Error::io(io::Error::from(io::ErrorKind::PermissionDenied)));
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
