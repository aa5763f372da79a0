use pretty_assertions::assert_eq;

use crate::Rc;
use crate::backend::{Backend, BackendCall, NativeLabel, RecordingBackend};
use crate::buffer::InstructionBuffer;
use crate::error::BufferError;
use crate::identity::{Local, LocalScope};
use crate::metadata::{MethodRef, TypeRef};
use crate::opcode::OpCode;
use crate::options::{BufferOptions, DescribeOptions};
use crate::test_utils::init_test_logging;
use crate::{String, Vec};

fn int32() -> TypeRef {
    TypeRef::value("System.Int32")
}

fn local(name: &str, slot: u16) -> Rc<Local> {
    Rc::new(Local::new(name, slot, int32()))
}

/// `ldloc.0` at steps 4 and 6, padding elsewhere.
fn slot_zero_loads() -> InstructionBuffer {
    let mut buffer = InstructionBuffer::new();
    for _ in 0..4 {
        buffer.emit(OpCode::Nop);
    }
    buffer.emit(OpCode::Ldloc0);
    buffer.emit(OpCode::Nop);
    buffer.emit(OpCode::Ldloc0);
    buffer
}

fn sum_loop() -> InstructionBuffer {
    let mut buffer = InstructionBuffer::new();
    let top = buffer.define_label("top");
    buffer.mark_label(&top);
    buffer.emit(OpCode::Ldarg0);
    buffer.emit_i32(OpCode::LdcI4, 1);
    buffer.emit(OpCode::Sub);
    buffer.emit(OpCode::Dup);
    buffer.emit_branch(OpCode::BrtrueS, &top);
    buffer.emit_method(
        OpCode::Call,
        MethodRef::new_static(TypeRef::class("Util"), "Log", TypeRef::void(), [int32()]),
    );
    buffer.emit(OpCode::Ret);
    buffer
}

#[test]
fn test_flush_replays_in_order() {
    init_test_logging();
    let buffer = sum_loop();
    let mut backend = RecordingBackend::new();
    let trace = buffer.flush(&mut backend);

    assert_eq!(
        backend.mnemonics(),
        vec!["ldarg.0", "ldc.i4", "sub", "dup", "brtrue.s", "call", "ret"]
    );
    assert_eq!(backend.calls()[0], BackendCall::DefineLabel(NativeLabel(0)));
    assert_eq!(backend.calls()[1], BackendCall::MarkLabel(NativeLabel(0)));
    assert_eq!(
        trace,
        "\ntop:\nldarg.0\nldc.i4 1\nsub\ndup\nbrtrue.s top\ncall System.Void Log(System.Int32)\nret\n"
    );
}

#[test]
fn test_flush_and_describe_agree_on_mnemonics() {
    let buffer = sum_loop();
    let mut backend = RecordingBackend::new();
    buffer.flush(&mut backend);

    let described: Vec<String> = buffer
        .describe(&[])
        .unwrap()
        .into_iter()
        .filter_map(|line| line.split_whitespace().next().map(String::from))
        .filter(|word| OpCode::from_name(word).is_some())
        .collect();

    assert_eq!(described, backend.mnemonics());
}

#[test]
fn test_flushed_bytes_match_cumulative_length() {
    let mut buffer = sum_loop();
    let block = buffer.begin_exception_block();
    buffer.emit(OpCode::Nop);
    buffer.begin_catch_block(TypeRef::class("System.Exception"));
    buffer.emit(OpCode::Pop);
    buffer.end_catch_block();
    buffer.begin_finally_block();
    buffer.end_finally_block();
    buffer.end_exception_block();
    assert!(block.binder().bound_target().is_none());

    let mut backend = RecordingBackend::new();
    buffer.flush(&mut backend);

    let len = buffer.len();
    assert_eq!(backend.code_len(), buffer.cumulative_length(len).unwrap());
}

#[test]
fn test_leave_targets_the_block_end() {
    let mut buffer = InstructionBuffer::new();
    let block = buffer.begin_exception_block();
    buffer.emit(OpCode::Nop);
    buffer.emit_branch(OpCode::LeaveS, block.end_label());
    buffer.begin_catch_block(TypeRef::class("System.Exception"));
    buffer.emit(OpCode::Pop);
    buffer.emit_branch(OpCode::LeaveS, block.end_label());
    buffer.end_catch_block();
    buffer.end_exception_block();

    let mut backend = RecordingBackend::new();
    let trace = buffer.flush(&mut backend);

    assert_eq!(
        backend.calls(),
        &[
            BackendCall::BeginExceptionBlock(NativeLabel(0)),
            BackendCall::Emit(OpCode::Nop),
            BackendCall::EmitLabel(OpCode::LeaveS, NativeLabel(0)),
            BackendCall::BeginCatchBlock(TypeRef::class("System.Exception")),
            BackendCall::Emit(OpCode::Pop),
            BackendCall::EmitLabel(OpCode::LeaveS, NativeLabel(0)),
            BackendCall::EndExceptionBlock,
        ]
    );
    assert!(trace.contains("leave.s block_end_0\n"));
    assert_eq!(block.end_label().binder().bound_target(), Some(backend.target()));
    let len = buffer.len();
    assert_eq!(backend.code_len(), buffer.cumulative_length(len).unwrap());
}

#[test]
fn test_describe_one_line_per_step() {
    let buffer = sum_loop();
    let lines = buffer.describe(&[]).unwrap();

    assert_eq!(lines.len(), buffer.len());
    assert_eq!(lines[0], "", "define label renders nothing");
    assert_eq!(lines[1], "\ntop:");
    assert_eq!(lines[6], "brtrue.s top");
}

#[test]
fn test_scope_annotation_follows_declaration_interval() {
    let buffer = slot_zero_loads();
    let first = LocalScope::new(local("acc", 0), 2).released(5);

    let err = buffer.describe(core::slice::from_ref(&first)).unwrap_err();
    assert_eq!(err, BufferError::MissingScope { slot: 0, index: 6 });

    let second = LocalScope::new(local("next", 0), 5);
    let lines = buffer.describe(&[first, second]).unwrap();
    assert_eq!(lines[4], "ldloc.0 // acc");
    assert_eq!(lines[6], "ldloc.0 // next");
    assert_eq!(lines[5], "nop");
}

#[test]
fn test_conflicting_scopes_fail() {
    let buffer = slot_zero_loads();
    let scopes = [
        LocalScope::new(local("a", 0), 0),
        LocalScope::new(local("b", 0), 3),
    ];

    let err = buffer.describe(&scopes).unwrap_err();
    assert_eq!(
        err,
        BufferError::ConflictingScopes {
            slot: 0,
            index: 4,
            first: "a".into(),
            second: "b".into(),
        }
    );
}

#[test]
fn test_operand_forms_parse_slot() {
    let mut buffer = InstructionBuffer::new();
    buffer.emit_u8(OpCode::LdlocS, 7);
    buffer.emit_i16(OpCode::Stloc, 300);
    let named = local("total", 7);
    buffer.emit_local(OpCode::Ldloc, &named);

    let scopes = [
        LocalScope::new(named, 0),
        LocalScope::new(local("wide", 300), 0),
    ];
    let lines = buffer.describe(&scopes).unwrap();

    assert_eq!(
        lines,
        vec![
            "ldloc.s 7 // total",
            "stloc 300 // wide",
            // Already names its local.
            "ldloc total",
        ]
    );
}

#[test]
fn test_out_of_range_slot_operand_fails() {
    let mut buffer = InstructionBuffer::new();
    buffer.emit(OpCode::Nop);
    buffer.emit_i16(OpCode::Ldloc, -1);

    let err = buffer.describe(&[LocalScope::new(local("any", 0), 0)]).unwrap_err();
    assert_eq!(
        err,
        BufferError::InvalidSlot {
            operand: "-1".into(),
            index: 1,
        }
    );
    assert_eq!(err.to_string(), "operand `-1` at step 1 is not a local slot");

    // Unannotated rendering still works.
    let options = DescribeOptions {
        annotate_locals: false,
    };
    assert_eq!(buffer.describe_with(&[], &options).unwrap()[1], "ldloc -1");
}

#[test]
fn test_annotation_can_be_disabled() {
    let buffer = slot_zero_loads();
    let options = DescribeOptions {
        annotate_locals: false,
    };
    let lines = buffer.describe_with(&[], &options).unwrap();
    assert_eq!(lines[4], "ldloc.0");
}

#[test]
fn test_describe_does_not_touch_backend_bindings() {
    let buffer = sum_loop();
    buffer.describe(&[]).unwrap();

    let crate::step::StepKind::DefineLabel(top) = buffer[0].kind() else {
        panic!("expected a label definition");
    };
    assert_eq!(top.binder().bound_target(), None);
}

#[test]
fn test_flush_into_second_backend_rebinds() {
    let buffer = sum_loop();
    let mut first = RecordingBackend::new();
    let mut second = RecordingBackend::new();
    second.emit(OpCode::Nop);

    buffer.flush(&mut first);
    buffer.flush(&mut second);

    assert_eq!(first.mnemonics(), second.mnemonics()[1..].to_vec());
    let crate::step::StepKind::DefineLabel(top) = buffer[0].kind() else {
        panic!("expected a label definition");
    };
    assert_eq!(top.binder().bound_target(), Some(second.target()));
}

#[test]
fn test_anchor_describes_but_does_not_flush() {
    let options = BufferOptions {
        entry_anchor: Some("entry".into()),
        ..Default::default()
    };
    let mut buffer = InstructionBuffer::with_options(&options);
    buffer.emit(OpCode::Ret);

    let lines = buffer.describe(&[]).unwrap();
    assert_eq!(lines, vec!["\nentry:", "ret"]);

    let mut backend = RecordingBackend::new();
    let trace = buffer.flush(&mut backend);
    assert_eq!(backend.calls(), &[BackendCall::Emit(OpCode::Ret)]);
    assert_eq!(trace, "\nentry:\nret\n");
}
