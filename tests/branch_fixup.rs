use ilstage::{InstructionBuffer, OpCode, RecordingBackend};
use pretty_assertions::assert_eq;

mod cases;

use cases::{fix_up_branches, mark_index, pad};

#[test]
fn test_near_branch_stays_short() {
    let mut buffer = InstructionBuffer::new();
    let skip = buffer.define_label("skip");
    buffer.emit_branch(OpCode::BrS, &skip);
    pad(&mut buffer, 2);
    buffer.mark_label(&skip);
    buffer.emit(OpCode::Ret);

    assert_eq!(fix_up_branches(&mut buffer), 0);
    assert_eq!(buffer[1].opcode(), Some(OpCode::BrS));
    assert_eq!(buffer.cumulative_length(buffer.len()).unwrap(), 2 + 12 + 1);
}

#[test]
fn test_far_forward_branch_is_upgraded() {
    let mut buffer = InstructionBuffer::new();
    let skip = buffer.define_label("skip");
    buffer.emit_branch(OpCode::BeqS, &skip);
    pad(&mut buffer, 30);
    buffer.mark_label(&skip);
    buffer.emit(OpCode::Ret);

    assert_eq!(fix_up_branches(&mut buffer), 1);
    assert_eq!(buffer[1].opcode(), Some(OpCode::Beq));
    // The tag keeps what was originally emitted.
    assert_eq!(buffer[1].tags().instruction(), Some(OpCode::BeqS));

    let target = mark_index(&buffer, "skip").unwrap();
    assert_eq!(buffer.byte_distance(2, target).unwrap(), 180);
    assert_eq!(buffer.cumulative_length(buffer.len()).unwrap(), 5 + 180 + 1);
}

#[test]
fn test_far_backward_branch_is_upgraded() {
    let mut buffer = InstructionBuffer::new();
    let top = buffer.define_label("top");
    buffer.mark_label(&top);
    pad(&mut buffer, 25);
    let back = buffer.emit_branch(OpCode::BrS, &top);
    buffer.emit(OpCode::Ret);

    let branch = buffer.len() - 2;
    assert_eq!(buffer.byte_distance(branch + 1, 1).unwrap(), -152);

    assert_eq!(fix_up_branches(&mut buffer), 1);
    assert_eq!(back.current(), OpCode::Br);
    assert_eq!(buffer.byte_distance(branch + 1, 1).unwrap(), -155);
}

#[test]
fn test_upgrade_can_push_another_branch_out_of_reach() {
    let mut buffer = InstructionBuffer::new();
    let end = buffer.define_label("end");
    let far = buffer.define_label("far");
    let outer = buffer.emit_branch(OpCode::BrS, &end);
    let inner = buffer.emit_branch(OpCode::BrS, &far);
    pad(&mut buffer, 20);
    for _ in 0..4 {
        buffer.emit(OpCode::Nop);
    }
    buffer.mark_label(&end);
    pad(&mut buffer, 1);
    buffer.mark_label(&far);
    buffer.emit(OpCode::Ret);

    // Outer fits until inner grows by three bytes.
    assert_eq!(buffer.byte_distance(3, mark_index(&buffer, "end").unwrap()).unwrap(), 126);

    assert_eq!(fix_up_branches(&mut buffer), 2);
    assert_eq!(outer.current(), OpCode::Br);
    assert_eq!(inner.current(), OpCode::Br);
    assert_eq!(buffer.cumulative_length(buffer.len()).unwrap(), 5 + 5 + 124 + 6 + 1);
}

#[test]
fn test_fixed_up_buffer_flushes_long_forms() {
    let mut buffer = InstructionBuffer::new();
    let skip = buffer.define_label("skip");
    buffer.emit_branch(OpCode::BrfalseS, &skip);
    pad(&mut buffer, 30);
    buffer.mark_label(&skip);
    buffer.emit(OpCode::Ret);
    fix_up_branches(&mut buffer);

    let mut backend = RecordingBackend::new();
    let trace = buffer.flush(&mut backend);

    assert_eq!(backend.mnemonics()[0], "brfalse");
    assert!(trace.starts_with("brfalse skip\n"));
    let len = buffer.len();
    assert_eq!(backend.code_len(), buffer.cumulative_length(len).unwrap());
}
