//! A backend that records every call it receives.

use crate::backend::{Backend, NativeLabel, NativeLocal, TargetId};
use crate::metadata::{CallSite, ConstructorRef, FieldRef, MethodRef, TypeRef};
use crate::opcode::{OpCode, SWITCH_TARGET_SIZE, block_size};
use crate::{String, ToString, Vec};

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Emit(OpCode),
    EmitU8(OpCode, u8),
    EmitI16(OpCode, i16),
    EmitI32(OpCode, i32),
    EmitI64(OpCode, i64),
    EmitF32(OpCode, f32),
    EmitF64(OpCode, f64),
    EmitMethod(OpCode, MethodRef),
    EmitConstructor(OpCode, ConstructorRef),
    EmitType(OpCode, TypeRef),
    EmitField(OpCode, FieldRef),
    EmitStr(OpCode, String),
    EmitCalli(OpCode, CallSite),
    EmitLabel(OpCode, NativeLabel),
    EmitLabels(OpCode, Vec<NativeLabel>),
    EmitLocal(OpCode, NativeLocal),
    BeginExceptionBlock(NativeLabel),
    BeginCatchBlock(TypeRef),
    BeginFinallyBlock,
    EndExceptionBlock,
    DefineLabel(NativeLabel),
    MarkLabel(NativeLabel),
    DeclareLocal(TypeRef, NativeLocal),
}

impl BackendCall {
    /// The opcode of instruction calls, `None` for block and declaration calls.
    pub fn opcode(&self) -> Option<OpCode> {
        match self {
            Self::Emit(op)
            | Self::EmitU8(op, _)
            | Self::EmitI16(op, _)
            | Self::EmitI32(op, _)
            | Self::EmitI64(op, _)
            | Self::EmitF32(op, _)
            | Self::EmitF64(op, _)
            | Self::EmitMethod(op, _)
            | Self::EmitConstructor(op, _)
            | Self::EmitType(op, _)
            | Self::EmitField(op, _)
            | Self::EmitStr(op, _)
            | Self::EmitCalli(op, _)
            | Self::EmitLabel(op, _)
            | Self::EmitLabels(op, _)
            | Self::EmitLocal(op, _) => Some(*op),
            _ => None,
        }
    }
}

/// Records calls in order and accounts the bytes a real encoder would write.
///
/// Native handles are numbered sequentially per kind, starting at zero.
/// Closing a block whose last handler is a finally accounts the implicit
/// `endfinally`.
#[derive(Debug)]
pub struct RecordingBackend {
    target: TargetId,
    calls: Vec<BackendCall>,
    code_len: usize,
    next_label: u32,
    next_local: u16,
    in_finally: Vec<bool>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            target: TargetId::fresh(),
            calls: Vec::new(),
            code_len: 0,
            next_label: 0,
            next_local: 0,
            in_finally: Vec::new(),
        }
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Bytes of code written so far.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Mnemonics of the instructions received so far.
    pub fn mnemonics(&self) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter_map(BackendCall::opcode)
            .map(OpCode::name)
            .collect()
    }

    fn record(&mut self, call: BackendCall, size: usize) {
        self.code_len += size;
        self.calls.push(call);
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for RecordingBackend {
    fn target(&self) -> TargetId {
        self.target
    }

    fn emit(&mut self, op: OpCode) {
        self.record(BackendCall::Emit(op), op.size());
    }

    fn emit_u8(&mut self, op: OpCode, value: u8) {
        self.record(BackendCall::EmitU8(op, value), op.size());
    }

    fn emit_i16(&mut self, op: OpCode, value: i16) {
        self.record(BackendCall::EmitI16(op, value), op.size());
    }

    fn emit_i32(&mut self, op: OpCode, value: i32) {
        self.record(BackendCall::EmitI32(op, value), op.size());
    }

    fn emit_i64(&mut self, op: OpCode, value: i64) {
        self.record(BackendCall::EmitI64(op, value), op.size());
    }

    fn emit_f32(&mut self, op: OpCode, value: f32) {
        self.record(BackendCall::EmitF32(op, value), op.size());
    }

    fn emit_f64(&mut self, op: OpCode, value: f64) {
        self.record(BackendCall::EmitF64(op, value), op.size());
    }

    fn emit_method(&mut self, op: OpCode, method: &MethodRef) {
        self.record(BackendCall::EmitMethod(op, method.clone()), op.size());
    }

    fn emit_constructor(&mut self, op: OpCode, constructor: &ConstructorRef) {
        self.record(
            BackendCall::EmitConstructor(op, constructor.clone()),
            op.size(),
        );
    }

    fn emit_type(&mut self, op: OpCode, ty: &TypeRef) {
        self.record(BackendCall::EmitType(op, ty.clone()), op.size());
    }

    fn emit_field(&mut self, op: OpCode, field: &FieldRef) {
        self.record(BackendCall::EmitField(op, field.clone()), op.size());
    }

    fn emit_str(&mut self, op: OpCode, value: &str) {
        self.record(BackendCall::EmitStr(op, value.to_string()), op.size());
    }

    fn emit_calli(&mut self, op: OpCode, site: &CallSite) {
        self.record(BackendCall::EmitCalli(op, site.clone()), op.size());
    }

    fn emit_label(&mut self, op: OpCode, label: NativeLabel) {
        self.record(BackendCall::EmitLabel(op, label), op.size());
    }

    fn emit_labels(&mut self, op: OpCode, labels: &[NativeLabel]) {
        let size = op.size() + SWITCH_TARGET_SIZE * labels.len();
        self.record(BackendCall::EmitLabels(op, labels.to_vec()), size);
    }

    fn emit_local(&mut self, op: OpCode, local: NativeLocal) {
        self.record(BackendCall::EmitLocal(op, local), op.size());
    }

    fn begin_exception_block(&mut self) -> NativeLabel {
        let end = self.define_label_silently();
        self.in_finally.push(false);
        self.record(
            BackendCall::BeginExceptionBlock(end),
            block_size::begin_exception_block(),
        );
        end
    }

    fn begin_catch_block(&mut self, exception: &TypeRef) {
        self.set_in_finally(false);
        self.record(
            BackendCall::BeginCatchBlock(exception.clone()),
            block_size::begin_catch_block(),
        );
    }

    fn begin_finally_block(&mut self) {
        self.set_in_finally(true);
        self.record(
            BackendCall::BeginFinallyBlock,
            block_size::begin_finally_block(),
        );
    }

    fn end_exception_block(&mut self) {
        let mut size = block_size::end_exception_block();
        if self.in_finally.pop().unwrap_or(false) {
            size += block_size::end_finally_block();
        }
        self.record(BackendCall::EndExceptionBlock, size);
    }

    fn define_label(&mut self) -> NativeLabel {
        let label = self.define_label_silently();
        self.record(BackendCall::DefineLabel(label), block_size::define_label());
        label
    }

    fn mark_label(&mut self, label: NativeLabel) {
        self.record(BackendCall::MarkLabel(label), block_size::mark_label());
    }

    fn declare_local(&mut self, ty: &TypeRef) -> NativeLocal {
        let local = NativeLocal(self.next_local);
        self.next_local += 1;
        self.record(
            BackendCall::DeclareLocal(ty.clone(), local),
            block_size::declare_local(),
        );
        local
    }
}

impl RecordingBackend {
    fn set_in_finally(&mut self, value: bool) {
        if let Some(top) = self.in_finally.last_mut() {
            *top = value;
        }
    }

    fn define_label_silently(&mut self) -> NativeLabel {
        let label = NativeLabel(self.next_label);
        self.next_label += 1;
        label
    }
}
