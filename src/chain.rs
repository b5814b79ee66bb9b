//! Chain: inert callback configuration consumed by a link.
//!
//! A chain is pure data: four optional callback slots, the delivery context
//! they run on, and a registry of cancellation handles. It performs no I/O
//! and holds no reference to any producer. Registry updates are
//! copy-on-write via [`Chain::with_updated_handles`], so chain values
//! already consumed by a link are never retroactively mutated and are safe
//! to share across concurrent subscriptions.

use crate::cancel::HandleSet;
use crate::context::DeliveryContext;
use crate::error::LinkError;
use std::fmt;
use std::sync::Arc;

pub(crate) type FailureFn = Arc<dyn Fn(LinkError) + Send + Sync>;
pub(crate) type FinishFn = Arc<dyn Fn() + Send + Sync>;
pub(crate) type ReceiveFn<T> = Arc<dyn Fn(&[T]) + Send + Sync>;
pub(crate) type StoreFn<T> = Arc<dyn Fn(&[T], &mut HandleSet) + Send + Sync>;

/// Callback configuration for one subscription.
///
/// `T` is the element type of a value batch. All slots are optional; an
/// absent slot skips that notification rather than erroring.
pub struct Chain<T> {
    pub(crate) on_failure: Option<FailureFn>,
    pub(crate) on_finish: Option<FinishFn>,
    pub(crate) on_receive: Option<ReceiveFn<T>>,
    pub(crate) on_store: Option<StoreFn<T>>,
    pub(crate) delivery: DeliveryContext,
    pub(crate) handles: HandleSet,
}

impl<T> Chain<T> {
    /// Empty configuration: no-op callbacks, shared delivery context, empty
    /// handle registry.
    pub fn new() -> Self {
        Self {
            on_failure: None,
            on_finish: None,
            on_receive: None,
            on_store: None,
            delivery: DeliveryContext::shared(),
            handles: HandleSet::new(),
        }
    }

    /// Invoked at most once, only on terminal failure.
    pub fn on_failure(mut self, f: impl Fn(LinkError) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(f));
        self
    }

    /// Invoked at most once, only on terminal success.
    pub fn on_finish(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    /// Invoked once per emitted batch, in emission order, before any
    /// terminal callback.
    pub fn on_receive(mut self, f: impl Fn(&[T]) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Invoked once per batch, immediately after that batch's `on_receive`,
    /// with write access to the live handle registry so derived
    /// subscriptions can be retained.
    pub fn on_store(mut self, f: impl Fn(&[T], &mut HandleSet) + Send + Sync + 'static) -> Self {
        self.on_store = Some(Arc::new(f));
        self
    }

    /// Execution context all of this chain's callbacks run on.
    pub fn deliver_on(mut self, context: DeliveryContext) -> Self {
        self.delivery = context;
        self
    }

    pub fn delivery(&self) -> &DeliveryContext {
        &self.delivery
    }

    /// Registry of cancellation handles owned by this chain value.
    pub fn handles(&self) -> &HandleSet {
        &self.handles
    }

    /// Derive a new chain identical to this one except for its handle
    /// registry. Pure: the receiver is untouched. Any set is accepted,
    /// including empty.
    pub fn with_updated_handles(&self, handles: HandleSet) -> Self {
        Self {
            on_failure: self.on_failure.clone(),
            on_finish: self.on_finish.clone(),
            on_receive: self.on_receive.clone(),
            on_store: self.on_store.clone(),
            delivery: self.delivery.clone(),
            handles,
        }
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        self.with_updated_handles(self.handles.clone())
    }
}

impl<T> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("on_failure", &self.on_failure.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_store", &self.on_store.is_some())
            .field("delivery", &self.delivery.name())
            .field("handles", &self.handles.len())
            .finish()
    }
}
