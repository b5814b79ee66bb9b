//! Producer side of a subscription.
//!
//! A producer emits zero or more value batches, then at most one terminal
//! event (failure or finish). Emission may happen from any thread; the link
//! normalizes delivery onto the chain's context. The handle returned from
//! [`Producer::subscribe`] must tear down upstream production when cancelled
//! or dropped.

use crate::cancel::CancelHandle;
use crate::error::LinkError;
use crate::link::Outlet;
use crossbeam_channel::{bounded, select, Receiver};
use std::thread;

/// An asynchronous source of value batches with a single terminal outcome.
///
/// `subscribe` consumes the producer, so one producer value backs at most
/// one subscription.
pub trait Producer<T: Send + 'static>: Send {
    fn subscribe(self, outlet: Outlet<T>) -> CancelHandle;
}

/// Closures work directly as producers.
impl<T, F> Producer<T> for F
where
    T: Send + 'static,
    F: Send + FnOnce(Outlet<T>) -> CancelHandle,
{
    fn subscribe(self, outlet: Outlet<T>) -> CancelHandle {
        self(outlet)
    }
}

/// One upstream event fed into a [`ChannelProducer`].
#[derive(Debug)]
pub enum Feed<T> {
    /// A batch of values.
    Batch(Vec<T>),
    /// Terminal failure.
    Fail(LinkError),
    /// Terminal success.
    Finish,
}

/// Adapts a crossbeam channel into a producer.
///
/// Whatever actually fetches data pushes [`Feed`] events into the sending
/// half; a forwarding thread drains the receiving half into the outlet. A
/// feed that disconnects without an explicit terminal counts as graceful
/// completion.
pub struct ChannelProducer<T> {
    receiver: Receiver<Feed<T>>,
}

impl<T> ChannelProducer<T> {
    pub fn new(receiver: Receiver<Feed<T>>) -> Self {
        Self { receiver }
    }
}

impl<T: Send + 'static> Producer<T> for ChannelProducer<T> {
    fn subscribe(self, outlet: Outlet<T>) -> CancelHandle {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let receiver = self.receiver;

        // Detached forwarder; exits on terminal, cancel, or disconnect.
        let _ = thread::spawn(move || loop {
            select! {
                recv(receiver) -> event => match event {
                    Ok(Feed::Batch(values)) => {
                        outlet.batch(values);
                        if !outlet.is_live() {
                            break;
                        }
                    }
                    Ok(Feed::Fail(error)) => {
                        outlet.fail(error);
                        break;
                    }
                    Ok(Feed::Finish) | Err(_) => {
                        outlet.finish();
                        break;
                    }
                },
                // Ready (with Err) as soon as the handle's release action
                // drops the sending half.
                recv(stop_rx) -> _ => break,
            }
        });

        CancelHandle::with_release(move || drop(stop_tx))
    }
}

impl<T> std::fmt::Debug for ChannelProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProducer")
            .field("pending", &self.receiver.len())
            .finish()
    }
}
