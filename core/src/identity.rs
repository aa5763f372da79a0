//! Label, local and exception-block identities.
//!
//! Identities are shared (`Rc`) between the steps that reference them. Each
//! owns the [`DeferredBinder`] that maps it to a native handle of whichever
//! backend is being flushed.

use core::fmt;

use crate::backend::{Backend, NativeLabel, NativeLocal};
use crate::binder::DeferredBinder;
use crate::metadata::TypeRef;
use crate::{Rc, String};

/// How a label's native handle comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelOrigin {
    /// `define_label`, marked explicitly later.
    Defined,
    /// `begin_exception_block`; the backend marks it when the region ends.
    BlockEnd,
}

/// A branch target.
#[derive(Debug)]
pub struct Label {
    name: String,
    origin: LabelOrigin,
    binder: DeferredBinder<NativeLabel>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: LabelOrigin::Defined,
            binder: DeferredBinder::new(),
        }
    }

    fn block_end(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: LabelOrigin::BlockEnd,
            binder: DeferredBinder::new(),
        }
    }

    /// Whether this label ends an exception region rather than being marked.
    pub fn ends_exception_block(&self) -> bool {
        self.origin == LabelOrigin::BlockEnd
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The native label on `backend`, defined there on first use.
    ///
    /// A region's end label is created by opening the region, so it must not
    /// be resolved before its `BeginExceptionBlock` step replays.
    pub fn resolve<B: Backend + ?Sized>(&self, backend: &mut B) -> NativeLabel {
        match self.origin {
            LabelOrigin::Defined => self.binder.resolve(backend, |b| b.define_label()),
            LabelOrigin::BlockEnd => self.binder.resolve(backend, |b| b.begin_exception_block()),
        }
    }

    pub fn binder(&self) -> &DeferredBinder<NativeLabel> {
        &self.binder
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A local variable occupying a fixed slot.
#[derive(Debug)]
pub struct Local {
    name: String,
    slot: u16,
    value_type: TypeRef,
    binder: DeferredBinder<NativeLocal>,
}

impl Local {
    pub fn new(name: impl Into<String>, slot: u16, value_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            slot,
            value_type,
            binder: DeferredBinder::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn value_type(&self) -> &TypeRef {
        &self.value_type
    }

    /// The native local on `backend`, declared there on first use.
    pub fn resolve<B: Backend + ?Sized>(&self, backend: &mut B) -> NativeLocal {
        self.binder
            .resolve(backend, |b| b.declare_local(&self.value_type))
    }

    pub fn binder(&self) -> &DeferredBinder<NativeLocal> {
        &self.binder
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A protected region, identified by the label ending it.
///
/// The end label is an ordinary branch target: `leave` instructions inside
/// the region and its handlers jump to it.
#[derive(Debug)]
pub struct ExceptionBlock {
    end: Rc<Label>,
}

impl ExceptionBlock {
    pub fn new(end_name: impl Into<String>) -> Self {
        Self {
            end: Rc::new(Label::block_end(end_name)),
        }
    }

    pub fn end_label(&self) -> &Rc<Label> {
        &self.end
    }

    /// Opens the region on `backend` the first time, returning its end label.
    pub fn resolve<B: Backend + ?Sized>(&self, backend: &mut B) -> NativeLabel {
        self.end.resolve(backend)
    }

    pub fn binder(&self) -> &DeferredBinder<NativeLabel> {
        self.end.binder()
    }
}

/// The step interval during which a local owns its slot.
///
/// Scope records are kept by whoever allocates locals; the buffer reads them
/// to annotate its description.
#[derive(Debug, Clone)]
pub struct LocalScope {
    pub local: Rc<Local>,
    pub declared_at: usize,
    pub released_at: Option<usize>,
}

impl LocalScope {
    pub fn new(local: Rc<Local>, declared_at: usize) -> Self {
        Self {
            local,
            declared_at,
            released_at: None,
        }
    }

    pub fn released(mut self, at: usize) -> Self {
        self.released_at = Some(at);
        self
    }

    /// Whether the local holds its slot at step `index`.
    pub fn is_active_at(&self, index: usize) -> bool {
        self.declared_at <= index && self.released_at.is_none_or(|released| released > index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_activity() {
        let local = Rc::new(Local::new("acc", 0, TypeRef::value("System.Int32")));
        let scope = LocalScope::new(local.clone(), 2).released(5);

        assert!(!scope.is_active_at(1));
        assert!(scope.is_active_at(2));
        assert!(scope.is_active_at(4));
        assert!(!scope.is_active_at(5));

        let forever = LocalScope::new(local, 2);
        assert!(forever.is_active_at(1_000));
    }

    #[test]
    fn test_block_end_label_opens_the_region() {
        use crate::backend::{BackendCall, RecordingBackend};

        let block = ExceptionBlock::new("after_try");
        let mut backend = RecordingBackend::new();

        let end = block.end_label().resolve(&mut backend);
        assert_eq!(block.resolve(&mut backend), end);
        assert!(block.end_label().ends_exception_block());
        assert!(!Label::new("plain").ends_exception_block());
        assert_eq!(backend.calls(), &[BackendCall::BeginExceptionBlock(end)]);
    }
}
