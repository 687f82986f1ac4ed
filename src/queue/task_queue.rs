//! Rate-Limited Task Queue
//!
//! Runs submitted async operations one at a time, in submission order, with
//! a fixed cooldown between one task finishing and the next one starting.

use crate::queue::error::{QueueError, TaskError};
use crate::queue::pending::{self, PendingResult};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A task with its arguments bound and its resolver attached
type Job = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;

enum Message {
    Run { id: u64, job: Job },
    Drain { reply: oneshot::Sender<QueueStats> },
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Name used in log output
    pub name: String,

    /// Minimum time between a task finishing and the next one starting
    pub cooldown: Duration,
}

impl QueueConfig {
    /// Config with the given log name and cooldown
    pub fn new(name: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            cooldown,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("default", Duration::from_secs(1))
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks accepted by the queue
    pub submitted: u64,
    pub succeeded: u64,
    /// Tasks whose operation returned an error
    pub failed: u64,
    pub panicked: u64,
}

impl QueueStats {
    /// Tasks that ran to an outcome
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }

    /// Tasks waiting in line or currently running
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.finished())
    }
}

#[derive(Debug)]
struct Shared {
    name: String,
    running: AtomicBool,
    next_id: AtomicU64,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Submitter handle for a sequential, rate-limited task queue
///
/// Cloning the handle shares the same queue and worker. The worker stops
/// after [`shutdown`](Self::shutdown) or once every handle is dropped.
#[derive(Debug, Clone)]
pub struct RateLimitedQueue {
    tx: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Run { id, .. } => f.debug_struct("Run").field("id", id).finish(),
            Message::Drain { .. } => f.write_str("Drain"),
        }
    }
}

impl RateLimitedQueue {
    /// Start a queue and its worker on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            name: config.name,
            running: AtomicBool::new(true),
            next_id: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        tokio::spawn(run_loop(rx, Arc::clone(&shared), config.cooldown));
        info!(queue = %shared.name, cooldown_ms = config.cooldown.as_millis() as u64, "task queue started");

        Self { tx, shared }
    }

    /// Queue `operation(args)` and return a handle to its outcome
    pub fn submit<A, F, Fut, T, E>(&self, operation: F, args: A) -> PendingResult<T, E>
    where
        A: Send + 'static,
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.submit_fn(move || operation(args))
    }

    /// Queue a zero-argument operation and return a handle to its outcome
    ///
    /// Never blocks. If the queue has stopped, the handle resolves to
    /// [`TaskError::Abandoned`].
    pub fn submit_fn<F, Fut, T, E>(&self, operation: F) -> PendingResult<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (resolver, pending) = pending::channel();
        let shared = Arc::clone(&self.shared);

        let job: Job = Box::new(move || -> BoxFuture {
            Box::pin(async move {
                let outcome = AssertUnwindSafe(async move { operation().await })
                    .catch_unwind()
                    .await;

                let outcome = match outcome {
                    Ok(Ok(value)) => {
                        shared.succeeded.fetch_add(1, Ordering::Relaxed);
                        Ok(value)
                    }
                    Ok(Err(err)) => {
                        shared.failed.fetch_add(1, Ordering::Relaxed);
                        Err(TaskError::Failed(err))
                    }
                    Err(payload) => {
                        shared.panicked.fetch_add(1, Ordering::Relaxed);
                        Err(TaskError::Panicked(panic_message(payload)))
                    }
                };

                resolver.resolve(outcome);
            })
        });

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        // counted before the send so the worker can never finish it first
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(Message::Run { id, job }) {
            Ok(()) => {
                debug!(queue = %self.shared.name, task_id = id, "submit: task queued");
            }
            Err(_) => {
                self.shared.submitted.fetch_sub(1, Ordering::Relaxed);
                // the rejected job is dropped here, taking the resolver with it
                debug!(queue = %self.shared.name, task_id = id, "submit: queue stopped, task abandoned");
            }
        }

        pending
    }

    /// Run every task submitted so far, then stop the worker
    ///
    /// Returns the final counters. Tasks submitted after this call resolve to
    /// [`TaskError::Abandoned`].
    pub async fn shutdown(&self) -> Result<QueueStats, QueueError> {
        debug!(queue = %self.shared.name, "shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::Drain { reply: reply_tx })
            .map_err(|_| QueueError::Stopped)?;
        reply_rx.await.map_err(|_| QueueError::Stopped)
    }

    /// Whether the worker is still accepting tasks
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current counters
    pub fn stats(&self) -> QueueStats {
        self.shared.snapshot()
    }

    /// Name given in [`QueueConfig`]
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

async fn run_loop(mut rx: mpsc::UnboundedReceiver<Message>, shared: Arc<Shared>, cooldown: Duration) {
    debug!(queue = %shared.name, "run_loop: started");
    let mut last_finished: Option<Instant> = None;

    while let Some(message) = rx.recv().await {
        match message {
            Message::Run { id, job } => {
                if let Some(finished) = last_finished {
                    tokio::time::sleep_until(finished + cooldown).await;
                }

                debug!(queue = %shared.name, task_id = id, "run_loop: running task");
                job().await;
                last_finished = Some(Instant::now());
            }
            Message::Drain { reply } => {
                shared.running.store(false, Ordering::Release);
                rx.close();
                let stats = shared.snapshot();
                info!(queue = %shared.name, finished = stats.finished(), "task queue drained");
                let _ = reply.send(stats);
                break;
            }
        }
    }

    shared.running.store(false, Ordering::Release);
    debug!(queue = %shared.name, "run_loop: stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio_test::{assert_pending, assert_ready_eq};

    const COOLDOWN: Duration = Duration::from_millis(10);

    fn queue() -> RateLimitedQueue {
        RateLimitedQueue::start(QueueConfig::new("test", COOLDOWN))
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct ValueError(&'static str);

    impl std::fmt::Display for ValueError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "ValueError: {}", self.0)
        }
    }

    async fn explode() -> Result<u32, String> {
        panic!("boom")
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_failure_success_in_order() {
        let queue = queue();
        let log: Arc<Mutex<Vec<(&'static str, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let record = |label: &'static str, outcome: Result<u32, ValueError>| {
            let log = Arc::clone(&log);
            move || async move {
                log.lock().push((label, Instant::now()));
                outcome
            }
        };

        let a = queue.submit_fn(record("A", Ok(1)));
        let b = queue.submit_fn(record("B", Err(ValueError("bad input"))));
        let c = queue.submit_fn(record("C", Ok(3)));

        assert_eq!(a.await, Ok(1));
        assert_eq!(b.await, Err(TaskError::Failed(ValueError("bad input"))));
        assert_eq!(c.await, Ok(3));

        let log = log.lock();
        let labels: Vec<_> = log.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert!(started.elapsed() >= COOLDOWN * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completions_separated_by_cooldown() {
        let queue = queue();
        let finished: Arc<Mutex<Vec<(usize, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let finished = Arc::clone(&finished);
                queue.submit(
                    |(i, finished): (usize, Arc<Mutex<Vec<(usize, Instant)>>>)| async move {
                        tokio::time::sleep(Duration::from_millis(3)).await;
                        finished.lock().push((i, Instant::now()));
                        Ok::<_, String>(i)
                    },
                    (i, finished),
                )
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await, Ok(i));
        }

        let finished = finished.lock();
        let order: Vec<_> = finished.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        for pair in finished.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= COOLDOWN);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_does_not_poison_queue() {
        let queue = queue();

        let first = queue.submit_fn(explode);
        let second = queue.submit_fn(|| async { Ok::<_, String>(2u32) });

        assert_eq!(first.await, Err(TaskError::Panicked("boom".to_string())));
        assert_eq!(second.await, Ok(2));

        let stats = queue.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.succeeded, 1);
        assert!(queue.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submitters_get_their_own_values() {
        let queue = queue();

        let callers: Vec<_> = (0..16u64)
            .map(|k| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let value = queue
                        .submit(|k: u64| async move { Ok::<_, String>(k * 10) }, k)
                        .await;
                    (k, value)
                })
            })
            .collect();

        for caller in callers {
            let (k, value) = caller.await.unwrap();
            assert_eq!(value, Ok(k * 10));
        }

        let stats = queue.stats();
        assert_eq!(stats.submitted, 16);
        assert_eq!(stats.succeeded, 16);
        assert_eq!(stats.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_queue_stays_quiet() {
        let queue = queue();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(queue.is_running());
        assert_eq!(queue.stats(), QueueStats::default());

        // no earlier completion, so no cooldown before the first task
        let before = Instant::now();
        assert_eq!(queue.submit_fn(|| async { Ok::<_, String>("ok") }).await, Ok("ok"));
        assert!(before.elapsed() < COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_task_runs() {
        let queue = queue();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let mut pending = tokio_test::task::spawn(queue.submit_fn(move || async move {
            gate_rx.await.map_err(|_| "gate dropped")?;
            Ok::<_, &'static str>(7)
        }));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_pending!(pending.poll());

        gate_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_ready_eq!(pending.poll(), Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_then_abandons() {
        let queue = queue();

        let queued: Vec<_> = (0..3u32)
            .map(|i| queue.submit_fn(move || async move { Ok::<_, String>(i) }))
            .collect();

        let stats = queue.shutdown().await.unwrap();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.succeeded, 3);
        assert!(!queue.is_running());

        for (i, handle) in queued.into_iter().enumerate() {
            assert_eq!(handle.await, Ok(i as u32));
        }

        let late = queue.submit_fn(|| async { Ok::<_, String>(99u32) });
        assert_eq!(late.await, Err(TaskError::Abandoned));
        assert_eq!(queue.shutdown().await, Err(QueueError::Stopped));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submitted_never_trails_finished() {
        let queue = RateLimitedQueue::start(QueueConfig::new("counts", Duration::ZERO));

        let handles: Vec<_> = (0..50u32)
            .map(|_| {
                let observer = queue.clone();
                queue.submit_fn(move || async move {
                    // this task is running, so it is counted but not finished
                    let stats = observer.stats();
                    Ok::<_, String>(stats.submitted > stats.finished())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await, Ok(true));
        }

        let stats = queue.shutdown().await.unwrap();
        assert_eq!(stats.submitted, 50);
        assert_eq!(stats.outstanding(), 0);

        let late = queue.submit_fn(|| async { Ok::<_, String>(()) });
        assert_eq!(late.await, Err(TaskError::Abandoned));
        assert_eq!(queue.stats().submitted, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_still_runs_task() {
        let queue = queue();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        drop(queue.submit_fn(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        }));

        queue.shutdown().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
