//! Lazy, target-scoped resolution of native handles.
//!
//! A label or local is referenced by many steps, and each of them resolves it
//! independently during replay. The binder makes that resolution idempotent
//! per backend target: the first resolution creates the native handle, later
//! ones return it.
//!
//! Resolving against a *different* target drops the cached handle and creates
//! a new one there. This is what lets one recorded buffer be flushed into more
//! than one backend, but it also means the identity now points at the newest
//! target: a handle obtained earlier from another target stays valid for that
//! target, yet the binder no longer remembers it.

use core::cell::Cell;

use crate::backend::{Backend, TargetId};

/// Single-slot cache of `(last target, native handle)`.
#[derive(Debug)]
pub struct DeferredBinder<H: Copy> {
    binding: Cell<Option<(TargetId, H)>>,
}

impl<H: Copy> DeferredBinder<H> {
    pub fn new() -> Self {
        Self {
            binding: Cell::new(None),
        }
    }

    /// Return the handle for `backend`, creating it with `create` if this
    /// binder has not been resolved against that target yet.
    pub fn resolve<B>(&self, backend: &mut B, create: impl FnOnce(&mut B) -> H) -> H
    where
        B: Backend + ?Sized,
    {
        let target = backend.target();
        match self.binding.get() {
            Some((bound, handle)) if bound == target => handle,
            previous => {
                if let Some((stale, _)) = previous {
                    tracing::debug!(?stale, ?target, "rebinding deferred handle to new target");
                }
                let handle = create(backend);
                self.binding.set(Some((target, handle)));
                handle
            }
        }
    }

    /// The target this binder was last resolved against.
    pub fn bound_target(&self) -> Option<TargetId> {
        self.binding.get().map(|(target, _)| target)
    }
}

impl<H: Copy> Default for DeferredBinder<H> {
    fn default() -> Self {
        Self::new()
    }
}
