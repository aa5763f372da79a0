//! The deferred instruction buffer.
//!
//! Instead of writing instructions straight into a backend, code generation
//! records them here as [`Step`]s. While steps are still buffered they can be
//! inserted and removed at any index, and branch opcodes can be upgraded after
//! the fact. The buffer answers byte-offset questions over the recorded
//! sequence, which is what short/long branch fix-up needs:
//!
//! ```
//! use ilstage_core::buffer::InstructionBuffer;
//! use ilstage_core::opcode::OpCode;
//!
//! let mut buffer = InstructionBuffer::new();
//! let exit = buffer.define_label("exit");
//! let branch = buffer.emit_branch(OpCode::BrS, &exit);
//! buffer.emit(OpCode::Nop);
//! buffer.mark_label(&exit);
//! buffer.emit(OpCode::Ret);
//!
//! // Distance from the end of the branch to the label.
//! assert_eq!(buffer.byte_distance(2, 3).unwrap(), 1);
//!
//! branch.set(OpCode::Br);
//! assert_eq!(buffer.cumulative_length(4).unwrap(), 5 + 1);
//! ```
//!
//! When construction is done, [`flush`](InstructionBuffer::flush) replays the
//! steps into a backend exactly once, in order.

mod offsets;
mod replay;

#[cfg(test)]
mod replay_test;

use core::ops::Index;

use crate::error::{BufferError, IndexedOperation, ValidRange};
use crate::identity::{ExceptionBlock, Label, Local};
use crate::metadata::{CallSite, ConstructorRef, FieldRef, MethodRef, TypeRef};
use crate::opcode::OpCode;
use crate::options::BufferOptions;
use crate::step::{OpcodeSlot, OpcodeUpdate, Step, StepKind};
use crate::{Rc, String, Vec};

use offsets::OffsetCache;

/// An ordered, editable sequence of recorded steps.
#[derive(Debug)]
pub struct InstructionBuffer {
    steps: Vec<Step>,
    offsets: OffsetCache,
}

impl Default for InstructionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionBuffer {
    pub fn new() -> Self {
        Self::with_options(&BufferOptions::default())
    }

    pub fn with_options(options: &BufferOptions) -> Self {
        let mut buffer = Self {
            steps: Vec::with_capacity(options.initial_capacity),
            offsets: OffsetCache::new(),
        };
        if let Some(name) = &options.entry_anchor {
            buffer.append(Step::anchor(Rc::new(Label::new(name.clone()))));
        }
        buffer
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    // === Structural edits ===

    pub fn append(&mut self, step: Step) {
        self.steps.push(step);
        self.offsets.invalidate();
        tracing::trace!(len = self.steps.len(), "appended step");
    }

    /// Insert `step` before index `index`, shifting later steps up by one.
    ///
    /// `index` may equal `len()`, which appends.
    pub fn insert(&mut self, index: usize, step: Step) -> Result<(), BufferError> {
        BufferError::check_index(
            IndexedOperation::Insert,
            index,
            ValidRange::positions(self.steps.len()),
        )?;
        self.steps.insert(index, step);
        self.offsets.invalidate();
        tracing::trace!(index, len = self.steps.len(), "inserted step");
        Ok(())
    }

    /// Insert an instruction without operand.
    pub fn insert_op(&mut self, index: usize, op: OpCode) -> Result<(), BufferError> {
        self.insert(index, Step::op(op))
    }

    /// Remove and return the step at `index`, shifting later steps down by one.
    pub fn remove(&mut self, index: usize) -> Result<Step, BufferError> {
        BufferError::check_index(
            IndexedOperation::Remove,
            index,
            ValidRange::elements(self.steps.len()),
        )?;
        let step = self.steps.remove(index);
        self.offsets.invalidate();
        tracing::trace!(index, len = self.steps.len(), "removed step");
        Ok(step)
    }

    /// Update handle for the branch or switch step at `index`.
    ///
    /// Returns `None` if there is no such step or it is not a branch.
    pub fn opcode_update(&self, index: usize) -> Option<OpcodeUpdate> {
        let slot = self.steps.get(index)?.opcode_slot()?;
        Some(OpcodeUpdate::new(slot.clone(), self.offsets.dirty_flag()))
    }

    // === Offsets ===

    /// Total encoded size of steps `0..end`.
    pub fn cumulative_length(&mut self, end: usize) -> Result<usize, BufferError> {
        BufferError::check_index(
            IndexedOperation::OffsetQuery,
            end,
            ValidRange::positions(self.steps.len()),
        )?;
        Ok(self.offsets.length_to(end, &self.steps))
    }

    /// Signed byte distance from the start of step `start` to the start of
    /// step `stop`. Negative when `stop` comes first.
    pub fn byte_distance(&mut self, start: usize, stop: usize) -> Result<isize, BufferError> {
        let from = self.cumulative_length(start)?;
        let to = self.cumulative_length(stop)?;
        Ok(to as isize - from as isize)
    }

    // === Emission helpers ===

    pub fn emit(&mut self, op: OpCode) {
        self.append(Step::op(op));
    }

    pub fn emit_u8(&mut self, op: OpCode, value: u8) {
        self.append(Step::u8(op, value));
    }

    pub fn emit_i16(&mut self, op: OpCode, value: i16) {
        self.append(Step::i16(op, value));
    }

    pub fn emit_i32(&mut self, op: OpCode, value: i32) {
        self.append(Step::i32(op, value));
    }

    pub fn emit_u32(&mut self, op: OpCode, value: u32) {
        self.append(Step::u32(op, value));
    }

    pub fn emit_i64(&mut self, op: OpCode, value: i64) {
        self.append(Step::i64(op, value));
    }

    pub fn emit_u64(&mut self, op: OpCode, value: u64) {
        self.append(Step::u64(op, value));
    }

    pub fn emit_f32(&mut self, op: OpCode, value: f32) {
        self.append(Step::f32(op, value));
    }

    pub fn emit_f64(&mut self, op: OpCode, value: f64) {
        self.append(Step::f64(op, value));
    }

    pub fn emit_method(&mut self, op: OpCode, method: MethodRef) {
        self.append(Step::method(op, method));
    }

    pub fn emit_constructor(&mut self, op: OpCode, constructor: ConstructorRef) {
        self.append(Step::constructor(op, constructor));
    }

    pub fn emit_type(&mut self, op: OpCode, ty: TypeRef) {
        self.append(Step::ty(op, ty));
    }

    pub fn emit_field(&mut self, op: OpCode, field: FieldRef) {
        self.append(Step::field(op, field));
    }

    pub fn emit_str(&mut self, op: OpCode, value: impl Into<String>) {
        self.append(Step::string(op, value));
    }

    /// Append a branch to `target` and return the handle that can later
    /// replace its opcode.
    pub fn emit_branch(&mut self, op: OpCode, target: &Rc<Label>) -> OpcodeUpdate {
        let opcode = OpcodeSlot::new(op);
        self.append(Step::new(StepKind::Branch {
            opcode: opcode.clone(),
            target: target.clone(),
        }));
        OpcodeUpdate::new(opcode, self.offsets.dirty_flag())
    }

    pub fn emit_switch(&mut self, op: OpCode, targets: &[Rc<Label>]) -> OpcodeUpdate {
        let opcode = OpcodeSlot::new(op);
        self.append(Step::new(StepKind::Switch {
            opcode: opcode.clone(),
            targets: targets.iter().cloned().collect(),
        }));
        OpcodeUpdate::new(opcode, self.offsets.dirty_flag())
    }

    pub fn emit_local(&mut self, op: OpCode, local: &Rc<Local>) {
        self.append(Step::local(op, local.clone()));
    }

    pub fn emit_calli(&mut self, op: OpCode, site: CallSite) {
        self.append(Step::calli(op, site));
    }

    /// Opens a protected region. Branch to its
    /// [`end_label`](ExceptionBlock::end_label) with `leave` to exit it.
    pub fn begin_exception_block(&mut self) -> Rc<ExceptionBlock> {
        let block = Rc::new(ExceptionBlock::new(alloc::format!("block_end_{}", self.steps.len())));
        self.append(Step::begin_exception_block(block.clone()));
        block
    }

    pub fn begin_catch_block(&mut self, exception: TypeRef) {
        self.append(Step::begin_catch_block(exception));
    }

    pub fn end_exception_block(&mut self) {
        self.append(Step::end_exception_block());
    }

    pub fn end_catch_block(&mut self) {
        self.append(Step::end_catch_block());
    }

    pub fn begin_finally_block(&mut self) {
        self.append(Step::begin_finally_block());
    }

    pub fn end_finally_block(&mut self) {
        self.append(Step::end_finally_block());
    }

    pub fn define_label(&mut self, name: impl Into<String>) -> Rc<Label> {
        let label = Rc::new(Label::new(name));
        self.append(Step::define_label(label.clone()));
        label
    }

    pub fn mark_label(&mut self, label: &Rc<Label>) {
        self.append(Step::mark_label(label.clone()));
    }

    pub fn declare_local(
        &mut self,
        name: impl Into<String>,
        slot: u16,
        value_type: TypeRef,
    ) -> Rc<Local> {
        let local = Rc::new(Local::new(name, slot, value_type));
        self.append(Step::declare_local(local.clone()));
        local
    }
}

impl Index<usize> for InstructionBuffer {
    type Output = Step;

    fn index(&self, index: usize) -> &Step {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a InstructionBuffer {
    type Item = &'a Step;
    type IntoIter = core::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
