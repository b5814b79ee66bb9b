//! Link: one-shot connector between a producer and a chain.
//!
//! Constructing a link immediately and synchronously subscribes the producer
//! to the chain's callbacks. There is no other public operation: the
//! subscription's lifetime is governed solely by its cancellation handle,
//! never by the link value itself.
//!
//! Delivery contract, per subscription:
//! - every callback runs on the chain's delivery context, in dispatch order;
//! - per batch: `on_receive`, then `on_store` with the live handle registry;
//! - exactly one terminal callback (`on_failure` or `on_finish`), strictly
//!   after all batch deliveries, and nothing after it;
//! - no retries, no re-subscription: a failed producer ends the link's job.

use crate::cancel::{CancelHandle, CancelWatcher, HandleSet};
use crate::chain::{Chain, FailureFn, FinishFn, ReceiveFn, StoreFn};
use crate::context::DeliveryContext;
use crate::error::LinkError;
use crate::producer::Producer;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-subscription delivery state, shared between the outlet handed to the
/// producer and the jobs it dispatches onto the delivery context.
struct DeliveryState<T> {
    on_failure: Option<FailureFn>,
    on_finish: Option<FinishFn>,
    on_receive: Option<ReceiveFn<T>>,
    on_store: Option<StoreFn<T>>,
    /// Live registry passed by mutable reference to `on_store`. Seeded from
    /// the chain's handles at connect time; does not hold this
    /// subscription's own handle, which would keep it alive forever.
    registry: Arc<Mutex<HandleSet>>,
    /// Non-owning view of this subscription's cancelled flag.
    watcher: CancelWatcher,
    /// Terminal latch. Only flipped on the delivery context, so checks and
    /// stores inside jobs are serialized.
    terminated: AtomicBool,
}

impl<T> DeliveryState<T> {
    fn gated(&self) -> bool {
        self.watcher.is_cancelled() || self.terminated.load(Ordering::SeqCst)
    }

    fn deliver_batch(&self, values: Vec<T>) {
        if self.gated() {
            trace!("batch dropped: subscription cancelled or terminal");
            return;
        }
        if let Some(on_receive) = &self.on_receive {
            on_receive(&values);
        }
        if let Some(on_store) = &self.on_store {
            on_store(&values, &mut self.registry.lock());
        }
    }

    fn deliver_failure(&self, error: LinkError) {
        if self.gated() {
            return;
        }
        self.terminated.store(true, Ordering::SeqCst);
        match &self.on_failure {
            Some(on_failure) => on_failure(error),
            None => debug!(%error, "terminal failure dropped: no on_failure callback"),
        }
    }

    fn deliver_finish(&self) {
        if self.gated() {
            return;
        }
        self.terminated.store(true, Ordering::SeqCst);
        if let Some(on_finish) = &self.on_finish {
            on_finish();
        }
    }
}

/// Producer-facing event sink for one subscription.
///
/// Producers may call these methods from any thread; each event is handed
/// off to the chain's delivery context without blocking the producer. After
/// a terminal event or cancellation, further events are silently ignored.
pub struct Outlet<T> {
    context: DeliveryContext,
    state: Arc<DeliveryState<T>>,
}

impl<T: Send + 'static> Outlet<T> {
    /// Emit one value batch.
    pub fn batch(&self, values: Vec<T>) {
        if !self.is_live() {
            return;
        }
        let state = Arc::clone(&self.state);
        let _ = self.context.dispatch(move || state.deliver_batch(values));
    }

    /// Terminate with failure. At most one terminal event is delivered;
    /// later ones are dropped.
    pub fn fail(&self, error: LinkError) {
        if !self.is_live() {
            return;
        }
        let state = Arc::clone(&self.state);
        let _ = self.context.dispatch(move || state.deliver_failure(error));
    }

    /// Terminate with graceful completion.
    pub fn finish(&self) {
        if !self.is_live() {
            return;
        }
        let state = Arc::clone(&self.state);
        let _ = self.context.dispatch(move || state.deliver_finish());
    }

    /// False once the subscription is cancelled or terminal. Producers can
    /// poll this to stop emitting early. It is a hint, not a gate; the
    /// delivery side enforces the contract regardless.
    pub fn is_live(&self) -> bool {
        !self.state.gated()
    }
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Outlet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outlet")
            .field("context", &self.context.name())
            .field("live", &!self.state.gated())
            .finish()
    }
}

/// One-shot connector: subscribes a producer to a chain at construction.
///
/// The constructor consumes the producer, so a link can never re-subscribe.
/// The chain is taken by value and never mutated; the registry updated with
/// this subscription's handle is surfaced as a derived chain via
/// [`Link::chain`] / [`Link::into_chain`].
///
/// Dropping the link without extracting its handle or derived chain drops
/// the last owning handle clones and cancels the subscription. Cloning the
/// handle out (or keeping the derived chain) keeps the subscription alive
/// independent of the link value.
pub struct Link<T> {
    chain: Chain<T>,
    handle: CancelHandle,
    registry: Arc<Mutex<HandleSet>>,
    source: Option<String>,
}

impl<T: Send + 'static> Link<T> {
    /// Connect `producer` to `chain`, subscribing immediately.
    pub fn new(producer: impl Producer<T>, chain: Chain<T>) -> Self {
        Self::connect(producer, chain, None)
    }

    /// Like [`Link::new`], tagging the link with a descriptive source
    /// locator (an originating URL, say). Metadata only; never interpreted.
    pub fn with_source(
        producer: impl Producer<T>,
        chain: Chain<T>,
        source: impl Into<String>,
    ) -> Self {
        Self::connect(producer, chain, Some(source.into()))
    }

    fn connect(producer: impl Producer<T>, chain: Chain<T>, source: Option<String>) -> Self {
        let registry = Arc::new(Mutex::new(chain.handles().clone()));
        let flag = Arc::new(AtomicBool::new(false));

        let state = Arc::new(DeliveryState {
            on_failure: chain.on_failure.clone(),
            on_finish: chain.on_finish.clone(),
            on_receive: chain.on_receive.clone(),
            on_store: chain.on_store.clone(),
            registry: Arc::clone(&registry),
            watcher: CancelWatcher::from_flag(Arc::clone(&flag)),
            terminated: AtomicBool::new(false),
        });
        let outlet = Outlet {
            context: chain.delivery().clone(),
            state,
        };

        let upstream = producer.subscribe(outlet);
        let handle = CancelHandle::from_flag(flag, move || upstream.cancel());

        let mut updated = chain.handles().clone();
        updated.insert(handle.clone());
        let chain = chain.with_updated_handles(updated);

        debug!(
            handle = %handle.id(),
            context = chain.delivery().name(),
            source = source.as_deref(),
            "link subscribed"
        );

        Self {
            chain,
            handle,
            registry,
            source,
        }
    }
}

impl<T> Link<T> {
    /// This subscription's cancellation handle.
    pub fn handle(&self) -> &CancelHandle {
        &self.handle
    }

    /// The chain derived at connect time: the input configuration with this
    /// subscription's handle added to the registry.
    pub fn chain(&self) -> &Chain<T> {
        &self.chain
    }

    /// Consume the link, keeping the subscription alive through the handle
    /// held in the returned chain's registry.
    pub fn into_chain(self) -> Chain<T> {
        self.chain
    }

    /// Snapshot of the live registry `on_store` callbacks mutate.
    pub fn stored_handles(&self) -> HandleSet {
        self.registry.lock().clone()
    }

    /// Descriptive source locator, if one was attached.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("handle", &self.handle)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_closure_producer_finish() {
        let (done_tx, done_rx) = bounded(1);
        let chain: Chain<u32> = Chain::new()
            .deliver_on(DeliveryContext::new("link-test"))
            .on_finish(move || {
                let _ = done_tx.send(());
            });

        let _link = Link::new(
            |outlet: Outlet<u32>| {
                outlet.batch(vec![1]);
                outlet.finish();
                CancelHandle::new()
            },
            chain,
        );

        done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("on_finish not delivered");
    }

    #[test]
    fn test_events_after_terminal_are_dropped() {
        let ctx = DeliveryContext::new("link-test");
        let (seen_tx, seen_rx) = bounded(16);
        let chain: Chain<u32> = Chain::new()
            .deliver_on(ctx.clone())
            .on_receive({
                let seen_tx = seen_tx.clone();
                move |batch: &[u32]| {
                    let _ = seen_tx.send(format!("receive:{:?}", batch));
                }
            })
            .on_finish({
                let seen_tx = seen_tx.clone();
                move || {
                    let _ = seen_tx.send("finish".to_string());
                }
            })
            .on_failure(move |_| {
                let _ = seen_tx.send("failure".to_string());
            });

        // Misbehaving producer: events after its terminal, then a second
        // terminal of the other kind.
        let _link = Link::new(
            |outlet: Outlet<u32>| {
                outlet.batch(vec![1]);
                outlet.finish();
                outlet.batch(vec![2]);
                outlet.fail(LinkError::source("late"));
                outlet.finish();
                CancelHandle::new()
            },
            chain,
        );
        ctx.flush();

        let mut events = Vec::new();
        while let Ok(event) = seen_rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events, vec!["receive:[1]".to_string(), "finish".to_string()]);
    }

    #[test]
    fn test_derived_chain_contains_new_handle() {
        let chain: Chain<u32> = Chain::new().deliver_on(DeliveryContext::new("link-test"));
        let link = Link::new(
            |_outlet: Outlet<u32>| CancelHandle::new(),
            chain.clone(),
        );

        assert!(chain.handles().is_empty());
        assert_eq!(link.chain().handles().len(), 1);
        assert!(link.chain().handles().contains(link.handle().id()));
    }

    #[test]
    fn test_source_is_inert_metadata() {
        let chain: Chain<u32> = Chain::new().deliver_on(DeliveryContext::new("link-test"));
        let link = Link::with_source(
            |_outlet: Outlet<u32>| CancelHandle::new(),
            chain,
            "https://example.test/feed",
        );
        assert_eq!(link.source(), Some("https://example.test/feed"));
    }
}
