#![allow(dead_code)]

use ilstage::{InstructionBuffer, OpCode, StepKind};

/// Index of the step that marks `name`.
pub fn mark_index(buffer: &InstructionBuffer, name: &str) -> Option<usize> {
    buffer
        .iter()
        .position(|step| step.tags().marks_label().is_some_and(|label| label.name() == name))
}

/// Upgrade short branches whose target is out of `i8` reach, until no more
/// upgrades are needed. Returns the number of upgraded branches.
pub fn fix_up_branches(buffer: &mut InstructionBuffer) -> usize {
    let mut upgraded = 0;
    loop {
        let mut changed = false;
        for index in 0..buffer.len() {
            let StepKind::Branch { opcode, target } = buffer[index].kind() else {
                continue;
            };
            let Some(long) = opcode.get().long_form() else {
                continue;
            };
            let target = mark_index(buffer, target.name()).expect("branch target is marked");
            let distance = buffer.byte_distance(index + 1, target).unwrap();
            if i8::try_from(distance).is_err() {
                buffer.opcode_update(index).unwrap().set(long);
                upgraded += 1;
                changed = true;
            }
        }
        if !changed {
            return upgraded;
        }
    }
}

/// Append `count` `ldc.i4`/`pop` pairs, six bytes each.
pub fn pad(buffer: &mut InstructionBuffer, count: usize) {
    for i in 0..count {
        buffer.emit_i32(OpCode::LdcI4, i as i32);
        buffer.emit(OpCode::Pop);
    }
}
