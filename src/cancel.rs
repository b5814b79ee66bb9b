//! Cancellation handles and the handle registry.
//!
//! A [`CancelHandle`] is the opaque token representing one live subscription.
//! Clones share a single guard; the subscription is released at the earliest
//! of an explicit [`CancelHandle::cancel`] call or the last owning clone
//! being dropped. Releasing sets a shared flag (observed by delivery
//! internals through a non-owning [`CancelWatcher`]) and runs a one-shot
//! release action that tears down upstream resources.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide counter for handle identities.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a cancellation handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

impl HandleId {
    fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot release action run when the handle fires.
type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Shared guard behind a handle. Fires once, on explicit cancel or when the
/// last owning clone drops.
struct CancelGuard {
    flag: Arc<AtomicBool>,
    release: Mutex<Option<ReleaseFn>>,
}

impl CancelGuard {
    fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Some(release) = self.release.lock().take() {
            release();
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Opaque token representing one live subscription.
///
/// Equality and hashing are by identity: two handles compare equal only if
/// they are clones of the same subscription's token.
pub struct CancelHandle {
    id: HandleId,
    guard: Arc<CancelGuard>,
}

impl CancelHandle {
    /// Handle with no release action beyond the shared flag.
    pub fn new() -> Self {
        Self::with_release(|| {})
    }

    /// Handle that runs `release` once when cancelled or fully dropped.
    pub fn with_release(release: impl FnOnce() + Send + 'static) -> Self {
        Self::from_flag(Arc::new(AtomicBool::new(false)), release)
    }

    /// Build around an existing flag so delivery internals can watch the
    /// flag without owning the guard.
    pub(crate) fn from_flag(
        flag: Arc<AtomicBool>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id: HandleId::next(),
            guard: Arc::new(CancelGuard {
                flag,
                release: Mutex::new(Some(Box::new(release))),
            }),
        }
    }

    /// This handle's identity.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Explicitly release the subscription. Idempotent.
    pub fn cancel(&self) {
        self.guard.fire();
    }

    /// Whether the subscription has been released.
    pub fn is_cancelled(&self) -> bool {
        self.guard.flag.load(Ordering::SeqCst)
    }

    /// Non-owning view of the cancelled flag.
    pub(crate) fn watcher(&self) -> CancelWatcher {
        CancelWatcher {
            flag: Arc::clone(&self.guard.flag),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CancelHandle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            guard: Arc::clone(&self.guard),
        }
    }
}

impl PartialEq for CancelHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CancelHandle {}

impl std::hash::Hash for CancelHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Non-owning view of a handle's cancelled flag. Holding a watcher does not
/// keep the subscription alive.
pub(crate) struct CancelWatcher {
    flag: Arc<AtomicBool>,
}

impl CancelWatcher {
    pub(crate) fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Identity-keyed set of cancellation handles.
///
/// Insertion order is irrelevant; uniqueness is by handle identity. Cloning
/// the set clones the handles it holds, so a clone shares liveness with the
/// original entries.
#[derive(Clone, Default)]
pub struct HandleSet {
    inner: HashMap<HandleId, CancelHandle>,
}

impl HandleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle. Returns false if an identical handle was present.
    pub fn insert(&mut self, handle: CancelHandle) -> bool {
        self.inner.insert(handle.id(), handle).is_none()
    }

    /// Remove a handle by identity, returning it if present.
    pub fn remove(&mut self, id: HandleId) -> Option<CancelHandle> {
        self.inner.remove(&id)
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Identities of all held handles.
    pub fn ids(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.inner.keys().copied()
    }

    /// Explicitly release every held subscription.
    pub fn cancel_all(&self) {
        for handle in self.inner.values() {
            handle.cancel();
        }
    }
}

impl fmt::Debug for HandleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSet")
            .field("len", &self.inner.len())
            .finish()
    }
}
