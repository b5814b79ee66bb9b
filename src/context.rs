//! Delivery contexts: serial executors callbacks are marshaled onto.
//!
//! A [`DeliveryContext`] owns a dedicated thread draining an unbounded job
//! channel. Jobs run strictly in dispatch order on that one thread, which is
//! what gives the pipeline its ordering and mutual-exclusion guarantees.
//! Contexts are cheap to clone; the worker thread exits once every clone has
//! been dropped.

use crossbeam_channel::{unbounded, Sender};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;

type Job = Box<dyn FnOnce() + Send>;

struct ContextInner {
    name: String,
    sender: Sender<Job>,
}

/// Execution context all of a chain's callbacks run on.
#[derive(Clone)]
pub struct DeliveryContext {
    inner: Arc<ContextInner>,
}

impl DeliveryContext {
    /// Spawn a dedicated serial context.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();

        // Detached worker; exits when every sender clone is gone.
        let _ = thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                job();
            }
        });

        Self {
            inner: Arc::new(ContextInner { name, sender }),
        }
    }

    /// The process-wide shared context, the default for chains that carry
    /// user-facing updates. Created on first use, lives for the process.
    pub fn shared() -> Self {
        static SHARED: OnceLock<DeliveryContext> = OnceLock::new();
        SHARED.get_or_init(|| DeliveryContext::new("tether-shared")).clone()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Enqueue a job. Returns false if the worker is gone.
    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.inner.sender.send(Box::new(job)).is_ok()
    }

    /// Block until every job dispatched before this call has run.
    ///
    /// Must not be called from the context's own worker thread.
    pub fn flush(&self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if self.dispatch(move || {
            let _ = tx.send(());
        }) {
            let _ = rx.recv();
        }
    }

    /// Whether two values refer to the same underlying context.
    pub fn same_context(&self, other: &DeliveryContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DeliveryContext {
    fn default() -> Self {
        DeliveryContext::shared()
    }
}

impl fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_jobs_run_in_dispatch_order() {
        let ctx = DeliveryContext::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            ctx.dispatch(move || seen.lock().push(i));
        }
        ctx.flush();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_run_on_one_thread() {
        let ctx = DeliveryContext::new("test");
        let ids = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..10 {
            let ids = Arc::clone(&ids);
            ctx.dispatch(move || ids.lock().push(thread::current().id()));
        }
        ctx.flush();

        let ids = ids.lock();
        assert_eq!(ids.len(), 10);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_ne!(ids[0], thread::current().id());
    }

    #[test]
    fn test_shared_is_one_context() {
        let a = DeliveryContext::shared();
        let b = DeliveryContext::default();
        assert!(a.same_context(&b));

        let dedicated = DeliveryContext::new("other");
        assert!(!a.same_context(&dedicated));
    }
}
