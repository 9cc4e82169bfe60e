//! Distribution of file paths to concurrent workers.
//!
//! Two shapes are provided behind the [`Dispatcher`] trait:
//!
//! - [`QueueDispatcher`] fills a bounded channel with every path, closes it,
//!   and lets a fixed number of named worker threads drain it. Workers record
//!   their outcomes straight into the shared [`Aggregator`].
//! - [`FanOutDispatcher`] spawns one Rayon task per path. Tasks must take an
//!   admission permit before processing, which caps active work at the worker
//!   count independently of how many tasks exist. Outcomes travel over a
//!   rendezvous channel to the calling thread, which is the only recorder.
//!
//! Either way every dispatched path produces exactly one outcome, and the
//! summary is only produced after all of them have been recorded.

use crate::aggregator::{Aggregator, ReplaceOutcome, RunSummary};
use crate::cancel::CancellationToken;
use crate::config::{Config, DispatchMode};
use crate::errors::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, debug_span, warn};

/// How long a fan-out task waits for a permit before rechecking cancellation.
const ADMISSION_POLL: Duration = Duration::from_millis(25);

/// Turns one path into one outcome. Implementations must not panic on I/O
/// failures; those belong in [`ReplaceOutcome::error`].
pub trait FileProcessor: Sync {
    fn process(&self, path: &Path, cancel: &CancellationToken) -> ReplaceOutcome;
}

/// Runs a [`FileProcessor`] over a list of paths and aggregates the results.
pub trait Dispatcher {
    fn dispatch<P: FileProcessor>(
        &self,
        files: Vec<PathBuf>,
        processor: &P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary>;
}

/// Either dispatcher shape, chosen at runtime from a [`Config`].
pub enum AnyDispatcher {
    Queue(QueueDispatcher),
    FanOut(FanOutDispatcher),
}

impl AnyDispatcher {
    pub fn from_config(config: &Config, progress: ProgressBar) -> Result<Self> {
        Ok(match config.mode() {
            DispatchMode::Queue => {
                AnyDispatcher::Queue(QueueDispatcher::new(config.workers()).with_progress(progress))
            }
            DispatchMode::FanOut => AnyDispatcher::FanOut(
                FanOutDispatcher::new(config.workers())?.with_progress(progress),
            ),
        })
    }
}

impl Dispatcher for AnyDispatcher {
    fn dispatch<P: FileProcessor>(
        &self,
        files: Vec<PathBuf>,
        processor: &P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        match self {
            AnyDispatcher::Queue(d) => d.dispatch(files, processor, cancel),
            AnyDispatcher::FanOut(d) => d.dispatch(files, processor, cancel),
        }
    }
}

/// A fixed pool of worker threads draining a pre-filled, closed queue.
pub struct QueueDispatcher {
    workers: usize,
    progress: ProgressBar,
}

impl QueueDispatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch<P: FileProcessor>(
        &self,
        files: Vec<PathBuf>,
        processor: &P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let expected = files.len();
        let aggregator = Aggregator::new();
        self.progress.set_length(expected as u64);

        let (work_tx, work_rx) = crossbeam_channel::bounded::<PathBuf>(expected.max(1));
        for path in files {
            work_tx.try_send(path).map_err(|e| {
                Error::Dispatch(format!(
                    "work queue rejected {}",
                    e.into_inner().display()
                ))
            })?;
        }
        // Closed: workers stop once the queue is empty.
        drop(work_tx);

        let worker_count = self.workers.min(expected);
        debug!(workers = worker_count, files = expected, "starting queue workers");

        thread::scope(|scope| -> Result<()> {
            for id in 0..worker_count {
                let work_rx = work_rx.clone();
                let aggregator = &aggregator;
                let progress = &self.progress;
                thread::Builder::new()
                    .name(format!("replace-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        let _span = debug_span!("worker", id).entered();
                        for path in work_rx.iter() {
                            let outcome = processor.process(&path, cancel);
                            aggregator.record(&outcome);
                            progress.inc(1);
                        }
                    })?;
            }
            Ok(())
        })?;

        finish(aggregator, expected, &self.progress)
    }
}

/// One task per file with at most `workers` of them processing at a time.
pub struct FanOutDispatcher {
    workers: usize,
    pool: rayon::ThreadPool,
    progress: ProgressBar,
}

impl FanOutDispatcher {
    /// Creates a dispatcher whose task pool has at least as many threads as
    /// there are logical CPUs, so admission permits are what bound the work.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        Self::with_task_threads(workers, workers.max(num_cpus::get()))
    }

    /// Creates a dispatcher with an explicit task pool size.
    pub fn with_task_threads(workers: usize, task_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(task_threads.max(1))
            .thread_name(|i| format!("replace-task-{i}"))
            .build()?;
        Ok(Self {
            workers: workers.max(1),
            pool,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }
}

impl Dispatcher for FanOutDispatcher {
    fn dispatch<P: FileProcessor>(
        &self,
        files: Vec<PathBuf>,
        processor: &P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let expected = files.len();
        let aggregator = Aggregator::new();
        let admission = AdmissionPool::new(self.workers);
        self.progress.set_length(expected as u64);
        debug!(
            workers = self.workers,
            task_threads = self.pool.current_num_threads(),
            files = expected,
            "starting fan-out tasks"
        );

        let (result_tx, result_rx) = crossbeam_channel::bounded::<ReplaceOutcome>(0);

        thread::scope(|scope| -> Result<()> {
            let admission = &admission;
            let pool = &self.pool;

            // The watcher owns the only long-lived sender. Task clones are
            // dropped as each task finishes, and the watcher drops the
            // original once the task scope has joined, which disconnects the
            // channel exactly once.
            thread::Builder::new()
                .name("replace-watcher".to_string())
                .spawn_scoped(scope, move || {
                    pool.scope(|tasks| {
                        for path in files {
                            let result_tx = result_tx.clone();
                            tasks.spawn(move |_| {
                                let permit = admission.acquire(cancel);
                                let outcome = match permit {
                                    Some(_) => processor.process(&path, cancel),
                                    None => {
                                        debug!(path = %path.display(), "not admitted, run cancelled");
                                        ReplaceOutcome::cancelled(&path)
                                    }
                                };
                                if result_tx.send(outcome).is_err() {
                                    warn!(path = %path.display(), "result channel closed early");
                                }
                                drop(permit);
                            });
                        }
                    });
                    drop(result_tx);
                })?;

            for outcome in result_rx.iter() {
                aggregator.record(&outcome);
                self.progress.inc(1);
            }
            Ok(())
        })?;

        finish(aggregator, expected, &self.progress)
    }
}

fn finish(aggregator: Aggregator, expected: usize, progress: &ProgressBar) -> Result<RunSummary> {
    let recorded = aggregator.recorded();
    progress.finish_and_clear();
    if recorded != expected {
        return Err(Error::Dispatch(format!(
            "expected {expected} outcomes, recorded {recorded}"
        )));
    }
    Ok(aggregator.finalize())
}

/// A counting semaphore built from a channel pre-loaded with tokens.
pub struct AdmissionPool {
    release: Sender<()>,
    acquire: Receiver<()>,
}

/// Returns its token to the pool when dropped.
pub struct Permit<'a> {
    pool: &'a AdmissionPool,
}

impl AdmissionPool {
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        let (release, acquire) = crossbeam_channel::bounded(permits);
        for _ in 0..permits {
            if release.try_send(()).is_err() {
                break;
            }
        }
        Self { release, acquire }
    }

    /// Waits for a permit, giving up with `None` once `cancel` is set.
    pub fn acquire(&self, cancel: &CancellationToken) -> Option<Permit<'_>> {
        loop {
            match self.acquire.recv_timeout(ADMISSION_POLL) {
                Ok(()) => return Some(Permit { pool: self }),
                Err(RecvTimeoutError::Timeout) if cancel.is_cancelled() => return None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.acquire.len()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.pool.release.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FileError;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how many paths are in `process` at once and which paths it saw.
    #[derive(Default)]
    struct CountingProcessor {
        active: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<PathBuf>>,
        delay: Duration,
    }

    impl CountingProcessor {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<PathBuf> {
            let mut seen = self.seen.lock().unwrap().clone();
            seen.sort();
            seen
        }
    }

    impl FileProcessor for CountingProcessor {
        fn process(&self, path: &Path, cancel: &CancellationToken) -> ReplaceOutcome {
            if cancel.is_cancelled() {
                return ReplaceOutcome::cancelled(path);
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.seen.lock().unwrap().push(path.to_path_buf());
            self.active.fetch_sub(1, Ordering::SeqCst);

            if path.ends_with("unreadable") {
                return ReplaceOutcome::failed(FileError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            ReplaceOutcome {
                total_replacements: 1,
                content_changed: true,
                ..ReplaceOutcome::untouched(path)
            }
        }
    }

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("file-{i:03}"))).collect()
    }

    fn dispatchers(workers: usize) -> Vec<(&'static str, AnyDispatcher)> {
        vec![
            ("queue", AnyDispatcher::Queue(QueueDispatcher::new(workers))),
            (
                "fan-out",
                AnyDispatcher::FanOut(FanOutDispatcher::with_task_threads(workers, 8).unwrap()),
            ),
        ]
    }

    #[test]
    fn test_one_outcome_per_file_for_every_worker_count() {
        let files = paths(12);
        for workers in 1..=files.len() {
            for (name, dispatcher) in dispatchers(workers) {
                let processor = CountingProcessor::default();
                let summary = dispatcher
                    .dispatch(files.clone(), &processor, &CancellationToken::new())
                    .unwrap();
                assert_eq!(summary.files_processed, files.len(), "{name} with {workers} workers");
                assert_eq!(summary.files_touched, files.len(), "{name} with {workers} workers");
                assert_eq!(processor.seen(), files, "{name} with {workers} workers");
            }
        }
    }

    #[test]
    fn test_more_workers_than_files() {
        for (name, dispatcher) in dispatchers(16) {
            let processor = CountingProcessor::default();
            let summary = dispatcher
                .dispatch(paths(3), &processor, &CancellationToken::new())
                .unwrap();
            assert_eq!(summary.files_processed, 3, "{name}");
        }
    }

    #[test]
    fn test_empty_file_list() {
        for (name, dispatcher) in dispatchers(4) {
            let summary = dispatcher
                .dispatch(Vec::new(), &CountingProcessor::default(), &CancellationToken::new())
                .unwrap();
            assert_eq!(summary, RunSummary::default(), "{name}");
        }
    }

    #[test]
    fn test_concurrency_never_exceeds_worker_count() {
        for workers in [1, 2, 3] {
            for (name, dispatcher) in dispatchers(workers) {
                let processor = CountingProcessor::with_delay(Duration::from_millis(5));
                dispatcher
                    .dispatch(paths(24), &processor, &CancellationToken::new())
                    .unwrap();
                assert!(
                    processor.peak() <= workers,
                    "{name}: peak {} with {workers} workers",
                    processor.peak()
                );
                assert!(processor.peak() >= 1);
            }
        }
    }

    #[test]
    fn test_fan_out_runs_in_parallel_up_to_the_bound() {
        let dispatcher = FanOutDispatcher::with_task_threads(4, 8).unwrap();
        let processor = CountingProcessor::with_delay(Duration::from_millis(20));
        dispatcher
            .dispatch(paths(16), &processor, &CancellationToken::new())
            .unwrap();
        assert!(processor.peak() > 1);
        assert!(processor.peak() <= 4);
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let mut files = paths(6);
        files.push(PathBuf::from("dir/unreadable"));
        for (name, dispatcher) in dispatchers(3) {
            let processor = CountingProcessor::default();
            let summary = dispatcher
                .dispatch(files.clone(), &processor, &CancellationToken::new())
                .unwrap();
            assert_eq!(summary.files_processed, 7, "{name}");
            assert_eq!(summary.failed, 1, "{name}");
            assert_eq!(summary.files_touched, 6, "{name}");
            assert_eq!(summary.total_replacements, 6, "{name}");
        }
    }

    #[test]
    fn test_cancelled_run_still_reports_every_file() {
        for (name, dispatcher) in dispatchers(2) {
            let cancel = CancellationToken::new();
            cancel.cancel_with_reason("test");
            let processor = CountingProcessor::default();
            let summary = dispatcher.dispatch(paths(10), &processor, &cancel).unwrap();
            assert_eq!(summary.files_processed, 10, "{name}");
            assert_eq!(summary.cancelled, 10, "{name}");
            assert_eq!(summary.files_touched, 0, "{name}");
            assert!(processor.seen().is_empty(), "{name}");
        }
    }

    #[test]
    fn test_admission_pool_bounds_permits() {
        let pool = AdmissionPool::new(2);
        let cancel = CancellationToken::new();
        let first = pool.acquire(&cancel).unwrap();
        let _second = pool.acquire(&cancel).unwrap();
        assert_eq!(pool.available(), 0);

        cancel.cancel();
        assert!(pool.acquire(&cancel).is_none());

        drop(first);
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire(&cancel).is_some());
    }
}
