//! Normalizes external filesystem events and dispatches them to the reload
//! controller on a dedicated background worker (§4.7).
//!
//! Built on the `notify` crate (the filesystem-watching crate already used
//! elsewhere in the reference corpus for this exact purpose), following the
//! same thread+channel idiom the teacher crate uses for its own background
//! event stream.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::controller::{FsEvent, FsEventKind, ReloadController};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Owns a background thread watching the configured roots and forwarding
/// debounced, normalized events to a [`ReloadController`]. Dropping or
/// calling [`WatcherAdapter::stop`] joins the thread synchronously, per the
/// engine's synchronous-teardown guarantee (§5).
pub struct WatcherAdapter {
    _watcher: RecommendedWatcher,
    worker: Option<JoinHandle<()>>,
    stop_tx: mpsc::Sender<()>,
}

impl WatcherAdapter {
    /// Starts watching `roots` recursively, debouncing bursts within
    /// `debounce` before dispatching to `controller`. Watch errors are
    /// logged and never fatal (§7 WatchFailure).
    pub fn start(
        roots: &[PathBuf],
        debounce: Duration,
        controller: Arc<ReloadController>,
    ) -> notify::Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel::<Event>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(err) => warn!("watcher error: {err}"),
        })?;

        for root in roots {
            if let Err(err) = watcher.watch(root, RecursiveMode::Recursive) {
                warn!("failed to watch '{}': {}", root.display(), err);
            }
        }

        let debounce = if debounce.is_zero() { DEFAULT_DEBOUNCE } else { debounce };
        let worker = thread::spawn(move || debounce_loop(raw_rx, stop_rx, debounce, controller));

        Ok(Self {
            _watcher: watcher,
            worker: Some(worker),
            stop_tx,
        })
    }

    /// Stops the watcher and joins its background thread.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for WatcherAdapter {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Coalesces bursts of raw `notify` events per path within `debounce`, then
/// normalizes and dispatches the latest kind seen for that path.
fn debounce_loop(
    raw_rx: mpsc::Receiver<Event>,
    stop_rx: mpsc::Receiver<()>,
    debounce: Duration,
    controller: Arc<ReloadController>,
) {
    let mut pending: HashMap<PathBuf, (FsEventKind, Instant)> = HashMap::new();

    loop {
        if stop_rx.try_recv().is_ok() {
            return;
        }

        match raw_rx.recv_timeout(debounce) {
            Ok(event) => {
                for (path, kind) in normalize(&event) {
                    pending.insert(path, (kind, Instant::now()));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        let ready: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= debounce)
            .map(|(path, _)| path.clone())
            .collect();

        for path in ready {
            if let Some((kind, _)) = pending.remove(&path) {
                debug!("dispatching {:?} for '{}'", kind, path.display());
                controller.handle_event(&FsEvent { kind, path });
            }
        }
    }
}

fn normalize(event: &Event) -> Vec<(PathBuf, FsEventKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Modify(_) => FsEventKind::Modified,
        EventKind::Remove(_) => FsEventKind::Deleted,
        _ => return Vec::new(),
    };
    event.paths.iter().cloned().map(|p| (p, kind.clone())).collect()
}
