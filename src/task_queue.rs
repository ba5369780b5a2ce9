//! # Task Queue
//!
//! A single-consumer FIFO executor backing the asynchronous behaviour of an
//! island. Each queue owns one dedicated worker thread; closures submitted
//! via [`TaskQueue::enqueue`] run on that thread strictly in submission
//! order, and each submission returns a [`TaskHandle`] through which the
//! task's outcome can be polled or joined.
//!
//! Outcomes are captured, never propagated out of the worker: a task that
//! returns an error (or panics) stores the failure in its handle, and the
//! worker moves on to the next task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::trace;

use crate::error::{PelagoError, Result};

type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Completion handle for a submitted task.
///
/// Handles may be polled with [`is_ready`](TaskHandle::is_ready) without
/// consuming anything, or joined with [`get`](TaskHandle::get), which
/// blocks until the task has run and yields its error exactly once.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<HandleShared>,
}

struct HandleShared {
    // `None` while the task is pending, `Some(outcome)` once it ran.
    outcome: Mutex<Option<Result<()>>>,
    cond: Condvar,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(HandleShared {
                outcome: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    fn complete(&self, outcome: Result<()>) {
        if let Ok(mut slot) = self.shared.outcome.lock() {
            *slot = Some(outcome);
            self.shared.cond.notify_all();
        }
    }

    /// Returns `true` once the task has finished running, without
    /// consuming its outcome.
    pub fn is_ready(&self) -> Result<bool> {
        Ok(self.shared.outcome.lock()?.is_some())
    }

    /// Blocks until the task has finished and returns its outcome.
    ///
    /// A task failure is yielded exactly once: subsequent calls on the same
    /// handle return `Ok(())`.
    pub fn get(&self) -> Result<()> {
        let mut slot = self.shared.outcome.lock()?;
        while slot.is_none() {
            slot = self.shared.cond.wait(slot)?;
        }
        match slot.take() {
            Some(Err(err)) => {
                *slot = Some(Ok(()));
                Err(err)
            }
            _ => {
                *slot = Some(Ok(()));
                Ok(())
            }
        }
    }
}

/// FIFO queue executing submitted closures on a dedicated worker thread.
pub struct TaskQueue {
    sender: Option<Sender<(Task, TaskHandle)>>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Creates the queue and spawns its worker thread.
    pub fn new() -> Self {
        let (sender, receiver) = channel::<(Task, TaskHandle)>();
        let worker = std::thread::Builder::new()
            .name("pelago-island-worker".to_string())
            .spawn(move || {
                while let Ok((task, handle)) = receiver.recv() {
                    trace!("running task on island worker");
                    let outcome = catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
                        Err(PelagoError::Other(panic_message(payload.as_ref())))
                    });
                    handle.complete(outcome.map_err(PelagoError::into_task_error));
                }
            })
            .expect("cannot spawn the island worker thread");
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Submits a closure for execution and returns its completion handle.
    ///
    /// Returns immediately; the closure runs after every previously
    /// enqueued task has completed. Fails with a `System` error if the
    /// worker thread is no longer alive, in which case nothing was
    /// enqueued.
    pub fn enqueue<F>(&self, task: F) -> Result<TaskHandle>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = TaskHandle::new();
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| PelagoError::System("task queue is shut down".to_string()))?;
        sender
            .send((Box::new(task), handle.clone()))
            .map_err(|_| PelagoError::System("island worker thread is gone".to_string()))?;
        Ok(handle)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain whatever is still
        // queued and then exit; the join afterwards makes teardown
        // deterministic.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("task panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("task panicked: {msg}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_tasks_run_in_submission_order() {
        let queue = TaskQueue::new();
        let trace = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<TaskHandle> = (0..16)
            .map(|i| {
                let trace = Arc::clone(&trace);
                queue
                    .enqueue(move || {
                        trace.lock().unwrap().push(i);
                        Ok(())
                    })
                    .unwrap()
            })
            .collect();
        for handle in &handles {
            handle.get().unwrap();
        }
        assert_eq!(*trace.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_error_is_captured_and_yielded_once() {
        let queue = TaskQueue::new();
        let handle = queue
            .enqueue(|| Err(PelagoError::Other("boom".to_string())))
            .unwrap();
        let err = handle.get().unwrap_err();
        assert!(matches!(err, PelagoError::Task(_)));
        // Second join on the same handle is a no-op.
        assert!(handle.get().is_ok());
    }

    #[test]
    fn test_panic_is_captured() {
        let queue = TaskQueue::new();
        let panicking = queue.enqueue(|| panic!("kaboom")).unwrap();
        let after = queue
            .enqueue(|| Ok(()))
            .expect("worker must survive a panicking task");
        let err = panicking.get().unwrap_err();
        match err {
            PelagoError::Task(inner) => assert!(inner.to_string().contains("kaboom")),
            other => panic!("expected Task, got {other:?}"),
        }
        after.get().unwrap();
    }

    #[test]
    fn test_is_ready_does_not_consume() {
        let queue = TaskQueue::new();
        let handle = queue.enqueue(|| Ok(())).unwrap();
        while !handle.is_ready().unwrap() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.is_ready().unwrap());
        handle.get().unwrap();
    }

    #[test]
    fn test_drop_drains_queued_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let queue = TaskQueue::new();
            for _ in 0..8 {
                let counter = Arc::clone(&counter);
                queue
                    .enqueue(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
