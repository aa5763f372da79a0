//! ilstage - deferred instruction buffering for IL code generation
//!
//! # Overview
//!
//! Code generators that write straight into an IL generator commit to every
//! instruction the moment they emit it. ilstage records the instructions into
//! an [`InstructionBuffer`] first, so that a generator can:
//!
//! - insert and remove instructions after the fact
//! - measure byte distances between instructions
//! - upgrade short branches (`br.s`) whose target ended up too far away
//! - render the whole method as text, annotated with local variable names
//!
//! and only then replay the finished sequence into a real [`Backend`].
//!
//! # Quick Start
//!
//! ```
//! use ilstage::{InstructionBuffer, OpCode, RecordingBackend};
//!
//! let mut buffer = InstructionBuffer::new();
//! let done = buffer.define_label("done");
//! let jump = buffer.emit_branch(OpCode::BrtrueS, &done);
//! buffer.emit_i32(OpCode::LdcI4, 42);
//! buffer.emit(OpCode::Pop);
//! buffer.mark_label(&done);
//! buffer.emit(OpCode::Ret);
//!
//! // Offsets are measured from the end of the branch.
//! let distance = buffer.byte_distance(2, 4).unwrap();
//! if !(-128..=127).contains(&distance) {
//!     jump.set(OpCode::Brtrue);
//! }
//!
//! let mut backend = RecordingBackend::new();
//! let trace = buffer.flush(&mut backend);
//! assert!(trace.contains("brtrue.s done"));
//! ```
//!
//! # Describing
//!
//! [`InstructionBuffer::describe`] renders one line per step. Local loads and
//! stores are annotated with the name of the local that owns the slot at that
//! point, taken from the [`LocalScope`] records passed in.

// Re-export public API from ilstage_core
pub use ilstage_core::buffer::InstructionBuffer;
pub use ilstage_core::options::{BufferOptions, DescribeOptions};
pub use ilstage_core::step::{self, OpcodeUpdate, ReplayMode, Step, StepKind, Trace};

// Re-export the backend seam and its collaborators
pub use ilstage_core::backend::{
    self, Backend, BackendCall, NativeLabel, NativeLocal, RecordingBackend, TargetId,
};
pub use ilstage_core::identity::{ExceptionBlock, Label, Local, LocalScope};
pub use ilstage_core::metadata::{
    self, CallSite, CallingConventions, ConstructorRef, FieldRef, MethodRef, TypeRef,
};
pub use ilstage_core::opcode::{self, OpCode};

// Re-export errors
pub use ilstage_core::error::BufferError;
