use super::assembly::Operand;
use super::Function;
use std::collections::HashMap;

/// Gives each distinct pseudo of the function its own 8-byte slot below rbp,
/// in first-seen order, and records how deep the frame goes.
pub fn allocate(function: &mut Function) {
    let mut slots: HashMap<String, i64> = HashMap::new();
    let mut offset = 0;
    for instruction in function.instructions.iter_mut() {
        instruction.map_operands(|operand| {
            if let Operand::Pseudo(name) = operand {
                let slot = *slots.entry(std::mem::take(name)).or_insert_with(|| {
                    offset -= 8;
                    offset
                });
                *operand = Operand::Stack(slot);
            }
        });
    }
    tracing::trace!(target: "asmgen::stack", "{}: {} slots, offset {}", function.name, slots.len(), offset);
    function.stack_size = offset;
}
