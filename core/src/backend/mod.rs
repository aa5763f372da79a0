//! The execution backend the buffer replays into.
//!
//! A backend accepts primitive instructions one at a time, in emission order.
//! It owns the native handles for labels, locals and exception regions; the
//! buffer only ever sees them as opaque [`NativeLabel`] / [`NativeLocal`]
//! values obtained through a [`DeferredBinder`](crate::binder::DeferredBinder).

mod recording;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::metadata::{CallSite, ConstructorRef, FieldRef, MethodRef, TypeRef};
use crate::opcode::OpCode;

pub use recording::{BackendCall, RecordingBackend};

/// Identity of one backend target.
///
/// Binders compare targets to decide whether a cached native handle is still
/// valid, so two live backends must never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a process-unique target id.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        TargetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A label handle created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeLabel(pub u32);

/// A local variable handle created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeLocal(pub u16);

/// Primitive operations of a code generation target.
///
/// Closing a catch or finally handler has no operation of its own: the
/// backend closes it when the next handler begins or the block ends.
pub trait Backend {
    /// The identity of this target, stable for its whole lifetime.
    fn target(&self) -> TargetId;

    fn emit(&mut self, op: OpCode);
    fn emit_u8(&mut self, op: OpCode, value: u8);
    fn emit_i16(&mut self, op: OpCode, value: i16);
    fn emit_i32(&mut self, op: OpCode, value: i32);
    fn emit_i64(&mut self, op: OpCode, value: i64);
    fn emit_f32(&mut self, op: OpCode, value: f32);
    fn emit_f64(&mut self, op: OpCode, value: f64);

    fn emit_method(&mut self, op: OpCode, method: &MethodRef);
    fn emit_constructor(&mut self, op: OpCode, constructor: &ConstructorRef);
    fn emit_type(&mut self, op: OpCode, ty: &TypeRef);
    fn emit_field(&mut self, op: OpCode, field: &FieldRef);
    fn emit_str(&mut self, op: OpCode, value: &str);
    fn emit_calli(&mut self, op: OpCode, site: &CallSite);

    fn emit_label(&mut self, op: OpCode, label: NativeLabel);
    fn emit_labels(&mut self, op: OpCode, labels: &[NativeLabel]);
    fn emit_local(&mut self, op: OpCode, local: NativeLocal);

    /// Open a protected region; returns the label that ends it.
    fn begin_exception_block(&mut self) -> NativeLabel;
    fn begin_catch_block(&mut self, exception: &TypeRef);
    fn begin_finally_block(&mut self);
    fn end_exception_block(&mut self);

    fn define_label(&mut self) -> NativeLabel;
    fn mark_label(&mut self, label: NativeLabel);
    fn declare_local(&mut self, ty: &TypeRef) -> NativeLocal;
}
