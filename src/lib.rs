//! # Tether
//!
//! A single-subscription reactive pipeline: a [`Chain`] holds user-supplied
//! callbacks plus the execution context they run on, and a [`Link`] attaches
//! one asynchronous producer to that chain exactly once.
//!
//! ## Core Concepts
//!
//! - **Chain**: inert callback configuration: `on_receive`/`on_store` per
//!   value batch, `on_failure`/`on_finish` for the single terminal outcome,
//!   a delivery context, and a registry of cancellation handles
//! - **Link**: one-shot connector; constructing it subscribes immediately
//! - **CancelHandle**: opaque token whose lifetime governs the subscription
//! - **DeliveryContext**: serial executor every callback is marshaled onto
//!
//! ## Example
//!
//! ```ignore
//! use tether::{Chain, ChannelProducer, Feed, Link};
//!
//! let (feed, source) = crossbeam_channel::unbounded();
//!
//! let chain = Chain::new()
//!     .on_receive(|batch: &[u64]| println!("got {} values", batch.len()))
//!     .on_finish(|| println!("done"))
//!     .on_failure(|err| eprintln!("failed: {err}"));
//!
//! let link = Link::new(ChannelProducer::new(source), chain);
//!
//! feed.send(Feed::Batch(vec![1, 2, 3]))?;
//! feed.send(Feed::Finish)?;
//!
//! // Keep the derived chain around: its registry holds the handle that
//! // keeps the subscription alive.
//! let chain = link.into_chain();
//! ```

pub mod cancel;
pub mod chain;
pub mod context;
pub mod error;
pub mod link;
pub mod producer;

// Re-exports
pub use cancel::{CancelHandle, HandleId, HandleSet};
pub use chain::Chain;
pub use context::DeliveryContext;
pub use error::{LinkError, Result};
pub use link::{Link, Outlet};
pub use producer::{ChannelProducer, Feed, Producer};
