//! Replaying a step into a backend and into trace text.

use core::fmt::{self, Write as _};

use smallvec::SmallVec;

use crate::backend::{Backend, NativeLabel};
use crate::metadata::{escape_single_quoted, write_joined};
use crate::opcode::OpCode;
use crate::step::{Step, StepKind};
use crate::String;

/// Where a replay goes.
///
/// `Real` performs backend calls and resolves labels and locals through
/// their binders. `DescribeOnly` produces trace text and touches nothing
/// else, so describing a buffer never disturbs the bindings of a real
/// flush.
pub enum ReplayMode<'b> {
    Real(&'b mut dyn Backend),
    DescribeOnly,
}

impl<'b> ReplayMode<'b> {
    fn backend(&mut self) -> Option<&mut (dyn Backend + 'b)> {
        match self {
            ReplayMode::Real(backend) => Some(&mut **backend),
            ReplayMode::DescribeOnly => None,
        }
    }
}

/// Accumulated human-readable rendering of replayed steps.
#[derive(Debug, Default, Clone)]
pub struct Trace {
    text: String,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    fn append(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a String cannot fail.
        let _ = self.text.write_fmt(args);
    }

    fn append_line(&mut self, args: fmt::Arguments<'_>) {
        self.append(args);
        self.text.push('\n');
    }

    /// `op value`, or `opvalue.` glued to the next instruction for prefixes.
    fn immediate(&mut self, op: OpCode, value: impl fmt::Display) {
        if op.is_prefix() {
            self.append(format_args!("{op}{value}."));
        } else {
            self.append_line(format_args!("{op} {value}"));
        }
    }
}

impl Step {
    /// Replay this step: render it into `trace` and, in [`ReplayMode::Real`],
    /// perform the matching backend call.
    pub fn replay(&self, mode: &mut ReplayMode<'_>, trace: &mut Trace) {
        match self.kind() {
            StepKind::Op(op) => {
                if let Some(backend) = mode.backend() {
                    backend.emit(*op);
                }
                if op.is_prefix() {
                    trace.append(format_args!("{op}"));
                } else {
                    trace.append_line(format_args!("{op}"));
                }
            }
            StepKind::U8(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_u8(*op, *value);
                }
                trace.immediate(*op, value);
            }
            StepKind::I16(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_i16(*op, *value);
                }
                trace.immediate(*op, value);
            }
            StepKind::I32(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_i32(*op, *value);
                }
                trace.immediate(*op, value);
            }
            StepKind::U32(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_i32(*op, *value as i32);
                }
                trace.append_line(format_args!("{op} {value}"));
            }
            StepKind::I64(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_i64(*op, *value);
                }
                trace.append_line(format_args!("{op} {value}"));
            }
            StepKind::U64(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_i64(*op, *value as i64);
                }
                trace.append_line(format_args!("{op} {value}"));
            }
            StepKind::F32(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_f32(*op, *value);
                }
                trace.append_line(format_args!("{op} {value}"));
            }
            StepKind::F64(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_f64(*op, *value);
                }
                trace.append_line(format_args!("{op} {value}"));
            }
            StepKind::Method(op, method) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_method(*op, method);
                }
                trace.append_line(format_args!("{op} {method}"));
            }
            StepKind::Constructor(op, constructor) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_constructor(*op, constructor);
                }
                trace.append_line(format_args!("{op} {constructor}"));
            }
            StepKind::Type(op, ty) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_type(*op, ty);
                }
                trace.append_line(format_args!("{op} {ty}"));
            }
            StepKind::Field(op, field) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_field(*op, field);
                }
                trace.append_line(format_args!("{op} {field}"));
            }
            StepKind::Str(op, value) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_str(*op, value);
                }
                trace.append_line(format_args!("{op} '{}'", escape_single_quoted(value)));
            }
            StepKind::Branch { opcode, target } => {
                let op = opcode.get();
                if let Some(backend) = mode.backend() {
                    let native = target.resolve(backend);
                    backend.emit_label(op, native);
                }
                trace.append_line(format_args!("{op} {target}"));
            }
            StepKind::Switch { opcode, targets } => {
                let op = opcode.get();
                if let Some(backend) = mode.backend() {
                    let mut natives: SmallVec<[NativeLabel; 4]> = SmallVec::new();
                    for target in targets {
                        natives.push(target.resolve(backend));
                    }
                    backend.emit_labels(op, &natives);
                }
                trace.append(format_args!("{op} "));
                let _ = write_joined(&mut trace.text, ", ", targets);
                trace.text.push('\n');
            }
            StepKind::Local(op, local) => {
                if let Some(backend) = mode.backend() {
                    let native = local.resolve(backend);
                    backend.emit_local(*op, native);
                }
                trace.append_line(format_args!("{op} {local}"));
            }
            StepKind::Calli(op, site) => {
                if let Some(backend) = mode.backend() {
                    backend.emit_calli(*op, site);
                }
                trace.append_line(format_args!("{op} {site}"));
            }
            StepKind::BeginExceptionBlock(block) => {
                // Binds the end label that `leave` steps in the region target.
                if let Some(backend) = mode.backend() {
                    block.resolve(backend);
                }
                trace.append_line(format_args!("--BeginExceptionBlock--"));
            }
            StepKind::BeginCatchBlock(exception) => {
                if let Some(backend) = mode.backend() {
                    backend.begin_catch_block(exception);
                }
                trace.append_line(format_args!("--BeginCatchBlock({exception})--"));
            }
            StepKind::EndExceptionBlock => {
                if let Some(backend) = mode.backend() {
                    backend.end_exception_block();
                }
                trace.append_line(format_args!("--EndExceptionBlock--"));
            }
            // Handlers close implicitly on the backend.
            StepKind::EndCatchBlock => trace.append_line(format_args!("--EndCatchBlock--")),
            StepKind::BeginFinallyBlock => {
                if let Some(backend) = mode.backend() {
                    backend.begin_finally_block();
                }
                trace.append_line(format_args!("--BeginFinallyBlock--"));
            }
            StepKind::EndFinallyBlock => trace.append_line(format_args!("--EndFinallyBlock--")),
            StepKind::DefineLabel(label) => {
                if let Some(backend) = mode.backend() {
                    label.resolve(backend);
                }
            }
            StepKind::MarkLabel(label) => {
                if let Some(backend) = mode.backend() {
                    let native = label.resolve(backend);
                    backend.mark_label(native);
                }
                trace.append_line(format_args!("\n{label}:"));
            }
            StepKind::DeclareLocal(local) => {
                if let Some(backend) = mode.backend() {
                    local.resolve(backend);
                }
            }
            StepKind::Anchor(label) => trace.append_line(format_args!("\n{label}:")),
        }
    }
}
