// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::store::{Action, Store};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{FileWatchProfile, matching_watches};

/// Keeps the underlying `RecommendedWatcher` alive. Dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and record an event on every `FileWatch` whose
/// profile matches a changed path.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<FileWatchProfile>,
    store: Store,
    clock: SharedClock,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Receiver gone means the runtime is shutting down.
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = ?root, watches = profiles.len(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");
            record_event(&root, &event.paths, &profiles, &store, &clock);
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Stamp every watch interested in any of `paths`, once per batch.
pub fn record_event(
    root: &Path,
    paths: &[PathBuf],
    profiles: &[FileWatchProfile],
    store: &Store,
    clock: &SharedClock,
) -> usize {
    let mut hit = BTreeSet::new();
    for path in paths {
        let Some(rel) = relative_str(root, path) else {
            debug!(?path, "event outside watch root");
            continue;
        };
        for name in matching_watches(profiles, &rel) {
            debug!(watch = name, path = %rel, "path matched file watch");
            hit.insert(name.to_string());
        }
    }

    let at = clock.now();
    for name in &hit {
        store.dispatch(Action::RecordFileEvent {
            name: name.clone(),
            at,
        });
    }
    hit.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::model::FileWatch;
    use crate::watch::patterns::build_profiles;

    #[test]
    fn matching_paths_stamp_their_watches() {
        let store = Store::default();
        let web = FileWatch {
            paths: vec!["web".into()],
            ..FileWatch::new("web")
        };
        let docs = FileWatch {
            paths: vec!["docs/**/*.md".into()],
            ..FileWatch::new("docs")
        };
        store.dispatch(Action::UpsertFileWatch(web.clone()));
        store.dispatch(Action::UpsertFileWatch(docs.clone()));
        let profiles = build_profiles([&web, &docs]).unwrap();

        let root = Path::new("/proj");
        let hit = record_event(
            root,
            &[root.join("web/a.html"), root.join("web/b.html")],
            &profiles,
            &store,
            &clock::system(),
        );

        assert_eq!(hit, 1);
        store.read(|st| {
            assert!(st.file_watches["web"].last_event_time.is_some());
            assert!(st.file_watches["docs"].last_event_time.is_none());
        });
    }
}
