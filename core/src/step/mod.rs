//! Recorded emission steps.
//!
//! A [`Step`] is one action recorded into the instruction buffer: an
//! instruction with its operand, an exception-region marker, or a label/local
//! declaration. Each step knows two things about itself:
//!
//! - its **size**, the number of code bytes it occupies once emitted. Branch
//!   steps read their *current* opcode, so a branch upgraded from `br.s` to
//!   `br` grows from 2 to 5 bytes without the step being replaced;
//! - how to **replay** itself, either into a real backend or as trace text
//!   only (see [`ReplayMode`]).
//!
//! Alongside, every step carries [`StructuralTags`] computed once at
//! construction for flow-analysis consumers.
//!
//! # Mutability
//!
//! The kind and tags of a step never change. The only mutable state is the
//! opcode slot of branch and switch steps, written through an
//! [`OpcodeUpdate`] handed out by the buffer. The update also marks the
//! buffer's offset cache dirty, so the two can never drift apart.

mod replay;


use core::cell::Cell;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::identity::{ExceptionBlock, Label, Local};
use crate::metadata::{CallSite, ConstructorRef, FieldRef, MethodRef, TypeRef};
use crate::opcode::{OpCode, SWITCH_TARGET_SIZE, block_size};
use crate::{Rc, String, Vec};

pub use replay::{ReplayMode, Trace};

/// Switch tables rarely have more than a handful of targets.
pub type LabelList = SmallVec<[Rc<Label>; 4]>;

/// The opcode of a branch or switch step, replaceable after construction.
///
/// Cloning a step shares its slot.
#[derive(Debug, Clone)]
pub struct OpcodeSlot(Rc<Cell<OpCode>>);

impl OpcodeSlot {
    pub(crate) fn new(op: OpCode) -> Self {
        Self(Rc::new(Cell::new(op)))
    }

    /// The opcode currently in effect.
    pub fn get(&self) -> OpCode {
        self.0.get()
    }
}

/// Capability to replace the opcode of one branch or switch step.
///
/// Setting a new opcode also marks the owning buffer's offset cache dirty;
/// the next length query recomputes every prefix.
#[derive(Debug, Clone)]
pub struct OpcodeUpdate {
    slot: OpcodeSlot,
    cache_dirty: Rc<Cell<bool>>,
}

impl OpcodeUpdate {
    pub(crate) fn new(slot: OpcodeSlot, cache_dirty: Rc<Cell<bool>>) -> Self {
        Self { slot, cache_dirty }
    }

    /// Replace the effective opcode, e.g. `br.s` -> `br`.
    pub fn set(&self, op: OpCode) {
        tracing::trace!(from = %self.slot.get(), to = %op, "updating branch opcode");
        self.slot.0.set(op);
        self.cache_dirty.set(true);
    }

    /// The opcode currently in effect.
    pub fn current(&self) -> OpCode {
        self.slot.get()
    }
}

/// What a step records.
///
/// Numeric immediates keep the exact type the caller supplied. Unsigned
/// 32/64-bit immediates are sent to the backend reinterpreted as the signed
/// value of the same width, but render with their unsigned value.
#[derive(Debug, Clone)]
pub enum StepKind {
    Op(OpCode),
    U8(OpCode, u8),
    I16(OpCode, i16),
    I32(OpCode, i32),
    U32(OpCode, u32),
    I64(OpCode, i64),
    U64(OpCode, u64),
    F32(OpCode, f32),
    F64(OpCode, f64),
    Method(OpCode, MethodRef),
    Constructor(OpCode, ConstructorRef),
    Type(OpCode, TypeRef),
    Field(OpCode, FieldRef),
    Str(OpCode, String),
    Branch { opcode: OpcodeSlot, target: Rc<Label> },
    Switch { opcode: OpcodeSlot, targets: LabelList },
    Local(OpCode, Rc<Local>),
    Calli(OpCode, CallSite),
    BeginExceptionBlock(Rc<ExceptionBlock>),
    BeginCatchBlock(TypeRef),
    EndExceptionBlock,
    EndCatchBlock,
    BeginFinallyBlock,
    EndFinallyBlock,
    DefineLabel(Rc<Label>),
    MarkLabel(Rc<Label>),
    DeclareLocal(Rc<Local>),
    /// Buffer-owned entry marker. Describes like a marked label but is never
    /// sent to a backend.
    Anchor(Rc<Label>),
}

bitflags! {
    /// Region and declaration markers of a step.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct StepFlags: u16 {
        const DEFINES_LABEL = 1;
        const STARTS_EXCEPTION_BLOCK = 1 << 1;
        const ENDS_EXCEPTION_BLOCK = 1 << 2;
        const STARTS_CATCH_BLOCK = 1 << 3;
        const ENDS_CATCH_BLOCK = 1 << 4;
        const STARTS_FINALLY_BLOCK = 1 << 5;
        const ENDS_FINALLY_BLOCK = 1 << 6;
        const DECLARES_LOCAL = 1 << 7;
    }
}

/// Stack-facing signature of a call-like instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallShape {
    pub return_type: TypeRef,
    /// Includes the implicit receiver of instance methods.
    pub parameter_types: Vec<TypeRef>,
}

/// Facts about a step for flow analysis, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StructuralTags {
    flags: StepFlags,
    marks_label: Option<Rc<Label>>,
    instruction: Option<OpCode>,
    call: Option<CallShape>,
}

impl StructuralTags {
    pub fn flags(&self) -> StepFlags {
        self.flags
    }

    pub fn defines_label(&self) -> bool {
        self.flags.contains(StepFlags::DEFINES_LABEL)
    }

    pub fn declares_local(&self) -> bool {
        self.flags.contains(StepFlags::DECLARES_LOCAL)
    }

    /// The label placed at this step, if any.
    pub fn marks_label(&self) -> Option<&Rc<Label>> {
        self.marks_label.as_ref()
    }

    /// The opcode recorded when the step was created.
    ///
    /// For branches this is the original opcode even after an upgrade; use
    /// [`Step::opcode`] for the one in effect.
    pub fn instruction(&self) -> Option<OpCode> {
        self.instruction
    }

    pub fn call(&self) -> Option<&CallShape> {
        self.call.as_ref()
    }
}

/// One recorded action.
#[derive(Debug, Clone)]
pub struct Step {
    kind: StepKind,
    tags: StructuralTags,
}

impl Step {
    pub(crate) fn new(kind: StepKind) -> Self {
        let tags = Self::derive_tags(&kind);
        Self { kind, tags }
    }

    fn derive_tags(kind: &StepKind) -> StructuralTags {
        let flags = match kind {
            StepKind::BeginExceptionBlock(_) => StepFlags::STARTS_EXCEPTION_BLOCK,
            StepKind::EndExceptionBlock => StepFlags::ENDS_EXCEPTION_BLOCK,
            StepKind::BeginCatchBlock(_) => StepFlags::STARTS_CATCH_BLOCK,
            StepKind::EndCatchBlock => StepFlags::ENDS_CATCH_BLOCK,
            StepKind::BeginFinallyBlock => StepFlags::STARTS_FINALLY_BLOCK,
            StepKind::EndFinallyBlock => StepFlags::ENDS_FINALLY_BLOCK,
            StepKind::DefineLabel(_) => StepFlags::DEFINES_LABEL,
            StepKind::DeclareLocal(_) => StepFlags::DECLARES_LOCAL,
            _ => StepFlags::empty(),
        };
        let marks_label = match kind {
            StepKind::MarkLabel(label) | StepKind::Anchor(label) => Some(label.clone()),
            _ => None,
        };
        let call = match kind {
            StepKind::Method(_, method) => Some(CallShape {
                return_type: method.return_type.clone(),
                parameter_types: method.stack_parameters(),
            }),
            StepKind::Calli(_, site) => Some(CallShape {
                return_type: site.return_type.clone(),
                parameter_types: site.parameters.to_vec(),
            }),
            _ => None,
        };
        StructuralTags {
            flags,
            marks_label,
            instruction: Self::opcode_of(kind),
            call,
        }
    }

    fn opcode_of(kind: &StepKind) -> Option<OpCode> {
        match kind {
            StepKind::Op(op)
            | StepKind::U8(op, _)
            | StepKind::I16(op, _)
            | StepKind::I32(op, _)
            | StepKind::U32(op, _)
            | StepKind::I64(op, _)
            | StepKind::U64(op, _)
            | StepKind::F32(op, _)
            | StepKind::F64(op, _)
            | StepKind::Method(op, _)
            | StepKind::Constructor(op, _)
            | StepKind::Type(op, _)
            | StepKind::Field(op, _)
            | StepKind::Str(op, _)
            | StepKind::Local(op, _)
            | StepKind::Calli(op, _) => Some(*op),
            StepKind::Branch { opcode, .. } | StepKind::Switch { opcode, .. } => Some(opcode.get()),
            _ => None,
        }
    }

    // === Constructors ===

    pub fn op(op: OpCode) -> Self {
        Self::new(StepKind::Op(op))
    }

    pub fn u8(op: OpCode, value: u8) -> Self {
        Self::new(StepKind::U8(op, value))
    }

    pub fn i16(op: OpCode, value: i16) -> Self {
        Self::new(StepKind::I16(op, value))
    }

    pub fn i32(op: OpCode, value: i32) -> Self {
        Self::new(StepKind::I32(op, value))
    }

    pub fn u32(op: OpCode, value: u32) -> Self {
        Self::new(StepKind::U32(op, value))
    }

    pub fn i64(op: OpCode, value: i64) -> Self {
        Self::new(StepKind::I64(op, value))
    }

    pub fn u64(op: OpCode, value: u64) -> Self {
        Self::new(StepKind::U64(op, value))
    }

    pub fn f32(op: OpCode, value: f32) -> Self {
        Self::new(StepKind::F32(op, value))
    }

    pub fn f64(op: OpCode, value: f64) -> Self {
        Self::new(StepKind::F64(op, value))
    }

    pub fn method(op: OpCode, method: MethodRef) -> Self {
        Self::new(StepKind::Method(op, method))
    }

    pub fn constructor(op: OpCode, constructor: ConstructorRef) -> Self {
        Self::new(StepKind::Constructor(op, constructor))
    }

    pub fn ty(op: OpCode, ty: TypeRef) -> Self {
        Self::new(StepKind::Type(op, ty))
    }

    pub fn field(op: OpCode, field: FieldRef) -> Self {
        Self::new(StepKind::Field(op, field))
    }

    pub fn string(op: OpCode, value: impl Into<String>) -> Self {
        Self::new(StepKind::Str(op, value.into()))
    }

    pub fn branch(op: OpCode, target: Rc<Label>) -> Self {
        Self::new(StepKind::Branch {
            opcode: OpcodeSlot::new(op),
            target,
        })
    }

    pub fn switch(op: OpCode, targets: impl IntoIterator<Item = Rc<Label>>) -> Self {
        Self::new(StepKind::Switch {
            opcode: OpcodeSlot::new(op),
            targets: targets.into_iter().collect(),
        })
    }

    pub fn local(op: OpCode, local: Rc<Local>) -> Self {
        Self::new(StepKind::Local(op, local))
    }

    pub fn calli(op: OpCode, site: CallSite) -> Self {
        Self::new(StepKind::Calli(op, site))
    }

    pub fn begin_exception_block(block: Rc<ExceptionBlock>) -> Self {
        Self::new(StepKind::BeginExceptionBlock(block))
    }

    pub fn begin_catch_block(exception: TypeRef) -> Self {
        Self::new(StepKind::BeginCatchBlock(exception))
    }

    pub fn end_exception_block() -> Self {
        Self::new(StepKind::EndExceptionBlock)
    }

    pub fn end_catch_block() -> Self {
        Self::new(StepKind::EndCatchBlock)
    }

    pub fn begin_finally_block() -> Self {
        Self::new(StepKind::BeginFinallyBlock)
    }

    pub fn end_finally_block() -> Self {
        Self::new(StepKind::EndFinallyBlock)
    }

    pub fn define_label(label: Rc<Label>) -> Self {
        Self::new(StepKind::DefineLabel(label))
    }

    pub fn mark_label(label: Rc<Label>) -> Self {
        Self::new(StepKind::MarkLabel(label))
    }

    pub fn declare_local(local: Rc<Local>) -> Self {
        Self::new(StepKind::DeclareLocal(local))
    }

    pub(crate) fn anchor(label: Rc<Label>) -> Self {
        Self::new(StepKind::Anchor(label))
    }

    // === Introspection ===

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn tags(&self) -> &StructuralTags {
        &self.tags
    }

    /// The opcode currently in effect, `None` for markers and declarations.
    pub fn opcode(&self) -> Option<OpCode> {
        Self::opcode_of(&self.kind)
    }

    /// The replaceable opcode slot of branch and switch steps.
    pub(crate) fn opcode_slot(&self) -> Option<&OpcodeSlot> {
        match &self.kind {
            StepKind::Branch { opcode, .. } | StepKind::Switch { opcode, .. } => Some(opcode),
            _ => None,
        }
    }

    /// Whether this is the buffer's entry anchor.
    pub fn is_anchor(&self) -> bool {
        matches!(self.kind, StepKind::Anchor(_))
    }

    /// Encoded size in bytes, as of the current opcode.
    pub fn size(&self) -> usize {
        match &self.kind {
            StepKind::Op(op)
            | StepKind::U8(op, _)
            | StepKind::I16(op, _)
            | StepKind::I32(op, _)
            | StepKind::U32(op, _)
            | StepKind::I64(op, _)
            | StepKind::U64(op, _)
            | StepKind::F32(op, _)
            | StepKind::F64(op, _)
            | StepKind::Method(op, _)
            | StepKind::Constructor(op, _)
            | StepKind::Type(op, _)
            | StepKind::Field(op, _)
            | StepKind::Str(op, _)
            | StepKind::Local(op, _)
            | StepKind::Calli(op, _) => op.size(),
            StepKind::Branch { opcode, .. } => opcode.get().size(),
            StepKind::Switch { opcode, targets } => {
                opcode.get().size() + SWITCH_TARGET_SIZE * targets.len()
            }
            StepKind::BeginExceptionBlock(_) => block_size::begin_exception_block(),
            StepKind::BeginCatchBlock(_) => block_size::begin_catch_block(),
            StepKind::EndExceptionBlock => block_size::end_exception_block(),
            StepKind::EndCatchBlock => block_size::end_catch_block(),
            StepKind::BeginFinallyBlock => block_size::begin_finally_block(),
            StepKind::EndFinallyBlock => block_size::end_finally_block(),
            StepKind::DefineLabel(_) => block_size::define_label(),
            StepKind::MarkLabel(_) | StepKind::Anchor(_) => block_size::mark_label(),
            StepKind::DeclareLocal(_) => block_size::declare_local(),
        }
    }
}
