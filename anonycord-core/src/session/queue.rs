use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::models::error::CaptureError;

/// Work item executed against the queue's owned state.
pub(crate) type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Envelope<S> {
    Run(Job<S>),
    Stop,
}

/// Cloneable submission handle for a `SerialQueue`.
pub(crate) struct QueueSender<S> {
    tx: mpsc::Sender<Envelope<S>>,
    pending: Arc<AtomicUsize>,
}

impl<S> Clone for QueueSender<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<S> QueueSender<S> {
    /// Enqueue `job`. Returns false once the worker has stopped; the job is
    /// dropped in that case.
    pub fn submit(&self, job: Job<S>) -> bool {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Envelope::Run(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Jobs submitted but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// A dedicated worker thread that owns `S` and runs jobs one at a time, in
/// submission order.
///
/// This is the only context allowed to touch `S`.
pub(crate) struct SerialQueue<S> {
    sender: QueueSender<S>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Spawn the worker. `init` builds the owned state and receives a sender
    /// to this very queue, so the state can post follow-up work to itself.
    pub fn spawn(name: &str, init: impl FnOnce(QueueSender<S>) -> S) -> Result<Self, CaptureError> {
        let (tx, rx) = mpsc::channel::<Envelope<S>>();
        let sender = QueueSender {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        };
        let mut state = init(sender.clone());
        let pending = Arc::clone(&sender.pending);

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Ok(envelope) = rx.recv() {
                    match envelope {
                        Envelope::Run(job) => {
                            pending.fetch_sub(1, Ordering::SeqCst);
                            job(&mut state);
                        }
                        Envelope::Stop => break,
                    }
                }
                log::debug!("{} worker exiting", thread::current().name().unwrap_or("queue"));
            })
            .map_err(|e| CaptureError::Capture(format!("failed to spawn {} thread: {}", name, e)))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Run `job` on the worker and wait for its result.
    pub fn run_sync<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R, CaptureError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let submitted = self.submit(Box::new(move |state: &mut S| {
            let _ = tx.send(job(state));
        }));
        if !submitted {
            return Err(CaptureError::ShutDown);
        }
        rx.recv().map_err(|_| CaptureError::ShutDown)
    }
}

impl<S> SerialQueue<S> {
    pub fn sender(&self) -> QueueSender<S> {
        self.sender.clone()
    }

    pub fn submit(&self, job: Job<S>) -> bool {
        self.sender.submit(job)
    }

    pub fn pending(&self) -> usize {
        self.sender.pending()
    }

    /// Stop the worker after the jobs already queued and join it.
    ///
    /// Idempotent. Never joins from the worker thread itself.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.tx.send(Envelope::Stop);
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("serial queue worker panicked");
        }
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_jobs_in_submission_order() {
        let queue = SerialQueue::spawn("test-order", |_| Vec::<u32>::new()).unwrap();
        for i in 0..100 {
            assert!(queue.submit(Box::new(move |log: &mut Vec<u32>| log.push(i))));
        }
        let log = queue.run_sync(|log| log.clone()).unwrap();
        assert_eq!(log, (0..100).collect::<Vec<_>>());
    }

    struct Log {
        sender: QueueSender<Log>,
        entries: Vec<&'static str>,
    }

    #[test]
    fn jobs_can_post_follow_up_work() {
        let queue = SerialQueue::spawn("test-follow-up", |sender| Log {
            sender,
            entries: Vec::new(),
        })
        .unwrap();

        // Hold the worker until everything below is queued.
        let (release, gate) = mpsc::channel::<()>();
        queue.submit(Box::new(move |_: &mut Log| {
            let _ = gate.recv();
        }));
        queue.submit(Box::new(|log: &mut Log| {
            log.entries.push("first");
            log.sender
                .submit(Box::new(|log: &mut Log| log.entries.push("follow-up")));
        }));
        queue.submit(Box::new(|log: &mut Log| log.entries.push("second")));
        release.send(()).unwrap();

        // The follow-up was queued behind "second".
        queue.run_sync(|_| ()).unwrap();
        let entries = queue.run_sync(|log| log.entries.clone()).unwrap();
        assert_eq!(entries, vec!["first", "second", "follow-up"]);
    }

    #[test]
    fn submit_fails_after_shutdown() {
        let mut queue = SerialQueue::spawn("test-shutdown", |_| 0u32).unwrap();
        let sender = queue.sender();
        queue.shutdown();
        assert!(!sender.submit(Box::new(|n: &mut u32| *n += 1)));
        assert_eq!(sender.pending(), 0);
        assert_eq!(queue.run_sync(|n| *n), Err(CaptureError::ShutDown));
    }
}
