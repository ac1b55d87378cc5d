//! Re-runs extraction when the ACME document changes.
//!
//! The notifier thread only forwards events over a channel; passes run on
//! the thread that calls [`WatchLoop::run`], one at a time. A termination
//! request is honored between passes, never during one.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, trace, warn};

use crate::error::ExtractResult;
use crate::pipeline::{Extractor, PassReport};

/// Events closer together than this collapse into one pass
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// How often the stop flag is checked while idle
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Collapses bursts of notifications for one logical change.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_triggered: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_triggered: None,
        }
    }

    /// Whether an event arriving at `now` should trigger a pass.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_triggered {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        }
    }

    /// Record that a pass was triggered at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_triggered = Some(now);
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// Whether `event` is a modification of the file at `source`.
///
/// Events for the containing directory or sibling files are ignored.
pub fn is_source_event(event: &Event, source: &Path) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }

    event
        .paths
        .iter()
        .any(|p| p.file_name() == source.file_name() && !p.is_dir())
}

/// Idle → Processing → Idle until the stop flag is raised.
#[derive(Debug)]
pub struct WatchLoop {
    extractor: Extractor,
    debouncer: Debouncer,
    stop: Arc<AtomicBool>,
}

impl WatchLoop {
    pub fn new(extractor: Extractor, stop: Arc<AtomicBool>) -> Self {
        Self {
            extractor,
            debouncer: Debouncer::default(),
            stop,
        }
    }

    pub fn with_debouncer(mut self, debouncer: Debouncer) -> Self {
        self.debouncer = debouncer;
        self
    }

    /// Watch the source document and re-extract on change.
    ///
    /// Returns `Ok` once the stop flag is raised. Write failures end the
    /// loop with an error; other pass errors are logged and the loop waits
    /// for the next change.
    pub fn run(mut self) -> ExtractResult<()> {
        let source = self.extractor.config().acme_path();
        let watch_dir = match source.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                // The receiver is gone only while shutting down
                let _ = tx.send(res);
            })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        info!(path = %source.display(), "Watching ACME file for changes");

        let extractor = self.extractor.clone();
        let passes = self.drive(&rx, &source, || extractor.run_pass())?;

        drop(watcher);
        info!(passes, "Stopped watching ACME file");
        Ok(())
    }

    /// Consume events until stopped or the channel closes; returns the pass count.
    pub fn drive<F>(
        &mut self,
        rx: &Receiver<notify::Result<Event>>,
        source: &Path,
        mut pass: F,
    ) -> ExtractResult<usize>
    where
        F: FnMut() -> ExtractResult<PassReport>,
    {
        let mut passes = 0;

        while !self.stop.load(Ordering::SeqCst) {
            let event = match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    warn!(error = %e, "File watcher reported an error");
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("File watcher channel closed");
                    break;
                }
            };

            if !is_source_event(&event, source) {
                trace!(kind = ?event.kind, paths = ?event.paths, "Ignoring event");
                continue;
            }

            if !self.debouncer.ready(Instant::now()) {
                debug!(kind = ?event.kind, "Ignoring duplicate change notification");
                continue;
            }

            info!(path = %source.display(), "Change detected in ACME file");
            match pass() {
                Ok(report) => debug!(?report, "Re-extraction finished"),
                Err(e) if e.is_pass_fatal_only() => {
                    error!(error = %e, "Re-extraction failed, waiting for the next change");
                }
                Err(e) => return Err(e),
            }
            self.debouncer.mark(Instant::now());
            passes += 1;
        }

        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use std::path::PathBuf;
    use std::sync::mpsc::Sender;
    use std::thread;

    use acme_extract_config::ExtractConfig;
    use notify::event::{CreateKind, DataChange, ModifyKind};

    fn modify(path: &Path) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.to_path_buf()))
    }

    fn watch_loop(stop: Arc<AtomicBool>, window: Duration) -> WatchLoop {
        WatchLoop::new(Extractor::new(Arc::new(ExtractConfig::default())), stop)
            .with_debouncer(Debouncer::new(window))
    }

    fn source() -> PathBuf {
        PathBuf::from("/nonexistent/acme/acme.json")
    }

    #[test]
    fn test_debouncer_window() {
        let mut debouncer = Debouncer::default();
        let t0 = Instant::now();
        assert!(debouncer.ready(t0));
        debouncer.mark(t0);

        assert!(!debouncer.ready(t0 + Duration::from_millis(200)));
        assert!(debouncer.ready(t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn test_source_event_filter() {
        let src = source();
        assert!(is_source_event(&modify(&src).unwrap(), &src));

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(src.clone());
        assert!(is_source_event(&created, &src));

        let sibling = modify(Path::new("/nonexistent/acme/other.json")).unwrap();
        assert!(!is_source_event(&sibling, &src));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(src.clone());
        assert!(!is_source_event(&access, &src));
    }

    #[test]
    fn test_directory_event_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("acme.json");
        std::fs::create_dir(&src).unwrap();
        assert!(!is_source_event(&modify(&src).unwrap(), &src));
    }

    #[test]
    fn test_burst_triggers_single_pass() {
        let (tx, rx) = mpsc::channel();
        let src = source();
        for _ in 0..3 {
            tx.send(modify(&src)).unwrap();
        }
        drop(tx);

        let mut runs = 0;
        let mut wl = watch_loop(Arc::new(AtomicBool::new(false)), DEBOUNCE_WINDOW);
        let passes = wl
            .drive(&rx, &src, || {
                runs += 1;
                Ok(PassReport::default())
            })
            .unwrap();
        assert_eq!(passes, 1);
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_spaced_events_trigger_two_passes() {
        let (tx, rx): (Sender<_>, _) = mpsc::channel();
        let src = source();
        let sender_src = src.clone();
        let sender = thread::spawn(move || {
            tx.send(modify(&sender_src)).unwrap();
            thread::sleep(Duration::from_millis(150));
            tx.send(modify(&sender_src)).unwrap();
        });

        let mut wl = watch_loop(Arc::new(AtomicBool::new(false)), Duration::from_millis(50));
        let passes = wl.drive(&rx, &src, || Ok(PassReport::default())).unwrap();
        sender.join().unwrap();
        assert_eq!(passes, 2);
    }

    #[test]
    fn test_pass_errors_keep_watching() {
        let (tx, rx) = mpsc::channel();
        let src = source();
        tx.send(modify(&src)).unwrap();
        drop(tx);

        let mut wl = watch_loop(Arc::new(AtomicBool::new(false)), DEBOUNCE_WINDOW);
        let passes = wl
            .drive(&rx, &src, || Err(ExtractError::SourceMissing(source())))
            .unwrap();
        assert_eq!(passes, 1);
    }

    #[test]
    fn test_write_failure_stops_loop() {
        let (tx, rx) = mpsc::channel();
        let src = source();
        tx.send(modify(&src)).unwrap();

        let mut wl = watch_loop(Arc::new(AtomicBool::new(false)), DEBOUNCE_WINDOW);
        let err = wl
            .drive(&rx, &src, || {
                Err(ExtractError::WriteFailure {
                    path: "/certs".into(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                })
            })
            .unwrap_err();
        assert_eq!(err.exit_code(), 5);
        drop(tx);
    }

    #[test]
    fn test_stop_flag_ends_loop() {
        let (tx, rx) = mpsc::channel();
        let src = source();
        tx.send(modify(&src)).unwrap();

        let mut wl = watch_loop(Arc::new(AtomicBool::new(true)), DEBOUNCE_WINDOW);
        let passes = wl.drive(&rx, &src, || Ok(PassReport::default())).unwrap();
        assert_eq!(passes, 0);
        drop(tx);
    }
}
