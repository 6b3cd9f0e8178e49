//! Serial command executor.
//!
//! A [`PlayQueue`] owns one worker thread and the state `S` that only that
//! worker may touch. Producers on any thread hand it tasks through a cloneable
//! [`QueueHandle`]; tasks run one at a time in submission order. Submission
//! never blocks: when the bounded mailbox is full the task is rejected with
//! [`QueueError::Full`] and the caller decides what to log.

use log::{debug, error, log, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{EngineError, PlayerError, QueueError};
use crate::logging::OperationTimer;

/// A unit of work executed on the worker with exclusive access to its state
pub type Task<S> = Box<dyn FnOnce(&mut S) -> Result<(), PlayerError> + Send>;

/// Worker thread settings
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub name: String,
    pub capacity: usize,
    pub slow_task_threshold: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: "play-queue".to_string(),
            capacity: 10,
            slow_task_threshold: Duration::from_millis(250),
        }
    }
}

struct Shared<S> {
    sender: Mutex<Option<SyncSender<Task<S>>>>,
    capacity: usize,
    dropped: AtomicU64,
}

/// Submit-only handle to a running [`PlayQueue`]
pub struct QueueHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S> QueueHandle<S> {
    /// Enqueue `task` without blocking
    pub fn submit<F>(&self, task: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) -> Result<(), PlayerError> + Send + 'static,
    {
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = sender.as_ref().ok_or(QueueError::ShutDown)?;

        match sender.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Full {
                    capacity: self.shared.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(QueueError::ShutDown),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of tasks rejected because the mailbox was full
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

/// Owner of the worker thread. Dropping it shuts the worker down.
pub struct PlayQueue<S> {
    handle: QueueHandle<S>,
    worker: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl<S: Send + 'static> PlayQueue<S> {
    /// Start the worker. `on_failure` runs on the worker after a task returned
    /// an error or panicked, before the next task is taken.
    pub fn spawn<F>(settings: QueueSettings, state: S, on_failure: F) -> Result<Self, QueueError>
    where
        F: FnMut(&mut S, &PlayerError) + Send + 'static,
    {
        let capacity = settings.capacity.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Task<S>>(capacity);

        let name = settings.name.clone();
        let threshold = settings.slow_task_threshold;
        let worker_name = name.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(&worker_name, receiver, state, on_failure, threshold))
            .map_err(|e| QueueError::Spawn(e.to_string()))?;

        debug!("Started queue worker '{}' (capacity {})", name, capacity);

        Ok(Self {
            handle: QueueHandle {
                shared: Arc::new(Shared {
                    sender: Mutex::new(Some(sender)),
                    capacity,
                    dropped: AtomicU64::new(0),
                }),
            },
            worker: Mutex::new(Some(worker)),
            name,
        })
    }
}

impl<S> PlayQueue<S> {
    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    pub fn submit<F>(&self, task: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) -> Result<(), PlayerError> + Send + 'static,
    {
        self.handle.submit(task)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Stop accepting tasks, let the worker drain what is queued, then join it.
    /// Safe to call repeatedly and from any thread.
    pub fn shutdown(&self) {
        // Dropping the only sender lets the worker finish the backlog and exit
        let sender = self
            .handle
            .shared
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(worker) = worker else {
            return;
        };

        if worker.thread().id() == thread::current().id() {
            // The worker exits on its own once this task returns
            warn!("Queue '{}' shut down from its own worker; not joining", self.name);
            return;
        }

        if worker.join().is_err() {
            error!("Queue worker '{}' terminated abnormally", self.name);
        } else {
            debug!("Queue worker '{}' stopped", self.name);
        }
    }
}

impl<S> Drop for PlayQueue<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S, F>(
    name: &str,
    receiver: Receiver<Task<S>>,
    mut state: S,
    mut on_failure: F,
    slow_task_threshold: Duration,
) where
    F: FnMut(&mut S, &PlayerError),
{
    let mut executed: u64 = 0;

    while let Ok(task) = receiver.recv() {
        let timer = OperationTimer::new(format!("{} task #{}", name, executed));

        let failure = match panic::catch_unwind(AssertUnwindSafe(|| task(&mut state))) {
            Ok(Ok(())) => None,
            Ok(Err(err)) => {
                log!(err.severity().log_level(), "Queue task failed: {}", err);
                Some(err)
            }
            Err(payload) => {
                let err = PlayerError::Engine(EngineError::Fault(panic_message(payload.as_ref())));
                error!("Queue task panicked: {}", err);
                Some(err)
            }
        };

        if let Some(err) = failure {
            if panic::catch_unwind(AssertUnwindSafe(|| on_failure(&mut state, &err))).is_err() {
                error!("Failure handler of queue '{}' panicked", name);
            }
        }

        timer.finish_with_threshold(slow_task_threshold);
        executed += 1;
    }

    debug!("Queue worker '{}' exiting after {} tasks", name, executed);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::channel;

    fn settings(capacity: usize) -> QueueSettings {
        QueueSettings {
            name: "test-queue".to_string(),
            capacity,
            ..Default::default()
        }
    }

    fn no_failures<S>(_: &mut S, err: &PlayerError) {
        panic!("unexpected failure: {}", err);
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let queue = PlayQueue::spawn(settings(64), Vec::new(), no_failures).unwrap();
        let (tx, rx) = channel();

        for n in 0..20u32 {
            queue.submit(move |seen: &mut Vec<u32>| {
                seen.push(n);
                Ok(())
            }).unwrap();
        }
        queue.submit(move |seen: &mut Vec<u32>| {
            tx.send(seen.clone()).unwrap();
            Ok(())
        }).unwrap();

        assert_eq!(rx.recv().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let queue = PlayQueue::spawn(settings(2), (), no_failures).unwrap();
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel::<()>();

        queue.submit(move |_| {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok(())
        }).unwrap();
        started_rx.recv().unwrap();

        assert!(queue.submit(|_| Ok(())).is_ok());
        assert!(queue.submit(|_| Ok(())).is_ok());
        match queue.submit(|_| Ok(())) {
            Err(QueueError::Full { capacity }) => assert_eq!(capacity, 2),
            other => panic!("Expected Full, got {:?}", other),
        }
        assert_eq!(queue.handle().dropped_count(), 1);

        release_tx.send(()).unwrap();
        queue.shutdown();
    }

    #[test]
    fn test_failing_task_does_not_wedge_the_queue() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failures_clone = failures.clone();
        let queue = PlayQueue::spawn(settings(8), 0u32, move |count: &mut u32, err: &PlayerError| {
            *count = 100;
            failures_clone.lock().unwrap().push(err.to_string());
        })
        .unwrap();

        queue.submit(|_| Err(EngineError::Fault("decoder crashed".to_string()).into())).unwrap();
        queue.submit(|_| panic!("engine exploded")).unwrap();

        let (tx, rx) = channel();
        queue.submit(move |count: &mut u32| {
            *count += 1;
            tx.send(*count).unwrap();
            Ok(())
        }).unwrap();

        assert_eq!(rx.recv().unwrap(), 101);
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("decoder crashed"));
        assert!(failures[1].contains("engine exploded"));
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let executed = Arc::new(AtomicU64::new(0));
        let queue = PlayQueue::spawn(settings(16), (), no_failures).unwrap();

        for _ in 0..10 {
            let executed = executed.clone();
            queue.submit(move |_| {
                thread::sleep(Duration::from_millis(2));
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }).unwrap();
        }
        queue.shutdown();

        assert_eq!(executed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let queue = PlayQueue::spawn(settings(4), (), no_failures).unwrap();
        let handle = queue.handle();

        queue.shutdown();
        queue.shutdown();

        assert!(!queue.is_running());
        assert!(handle.is_shut_down());
        assert!(matches!(handle.submit(|_| Ok(())), Err(QueueError::ShutDown)));
    }

    #[test]
    fn test_concurrent_producers_never_overlap() {
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicU64::new(0));
        let queue = PlayQueue::spawn(settings(1024), Vec::new(), no_failures).unwrap();

        let mut producers = Vec::new();
        for producer in 0..4u32 {
            let handle = queue.handle();
            let in_flight = in_flight.clone();
            let overlaps = overlaps.clone();
            producers.push(thread::spawn(move || {
                for n in 0..50u32 {
                    let in_flight = in_flight.clone();
                    let overlaps = overlaps.clone();
                    handle.submit(move |seen: &mut Vec<(u32, u32)>| {
                        if in_flight.swap(true, Ordering::SeqCst) {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        seen.push((producer, n));
                        in_flight.store(false, Ordering::SeqCst);
                        Ok(())
                    }).unwrap();
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }

        let (tx, rx) = channel();
        queue.submit(move |seen: &mut Vec<(u32, u32)>| {
            tx.send(seen.clone()).unwrap();
            Ok(())
        }).unwrap();
        let seen = rx.recv().unwrap();

        assert_eq!(seen.len(), 200);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        for producer in 0..4 {
            let order: Vec<u32> = seen.iter().filter(|(p, _)| *p == producer).map(|(_, n)| *n).collect();
            assert_eq!(order, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_drop_joins_worker() {
        let executed = Arc::new(AtomicBool::new(false));
        {
            let queue = PlayQueue::spawn(settings(4), (), no_failures).unwrap();
            let executed = executed.clone();
            queue.submit(move |_| {
                thread::sleep(Duration::from_millis(5));
                executed.store(true, Ordering::SeqCst);
                Ok(())
            }).unwrap();
        }
        assert!(executed.load(Ordering::SeqCst));
    }
}
