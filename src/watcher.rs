use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use crate::error::ServeError;

/// How long a burst of filesystem events is coalesced before reporting
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Keeps a debounced recursive watch alive for as long as it is held
pub struct FileWatcher {
    _debouncer: Mutex<Debouncer<notify::RecommendedWatcher>>,
}

/// Watches `dir` and calls `on_change` once per changed path accepted by `filter`
pub fn watch_directory<F, C>(dir: &Path, filter: F, on_change: C) -> Result<FileWatcher, ServeError>
where
    F: Fn(&Path) -> bool + Send + 'static,
    C: Fn(PathBuf) + Send + 'static,
{
    let watch_error = |source| ServeError::Watch {
        path: dir.to_path_buf(),
        source,
    };

    let mut debouncer = new_debouncer(DEBOUNCE, move |res: DebounceEventResult| {
        handle_fs_events(res, &filter, &on_change);
    })
    .map_err(watch_error)?;

    debouncer
        .watcher()
        .watch(dir, RecursiveMode::Recursive)
        .map_err(watch_error)?;

    tracing::debug!(dir = %dir.display(), "watching for changes");
    Ok(FileWatcher {
        _debouncer: Mutex::new(debouncer),
    })
}

fn handle_fs_events<F, C>(res: DebounceEventResult, filter: &F, on_change: &C)
where
    F: Fn(&Path) -> bool,
    C: Fn(PathBuf),
{
    match res {
        Ok(events) => {
            for event in events {
                if filter(&event.path) {
                    tracing::debug!(path = %event.path.display(), "file changed");
                    on_change(event.path);
                }
            }
        }
        Err(e) => tracing::warn!("watch error: {e}"),
    }
}
