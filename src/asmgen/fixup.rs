//! Rewrites instructions whose operand combination x86-64 can't encode.
//! r10 carries sources, r11 carries destinations and left-hand sides.
//! Running the pass on its own output changes nothing.
use super::assembly::{BinaryOpcode, Instruction, Operand, Register};
use super::{AssemblyOutput, Function};

pub fn legalize(function: &mut Function) {
    let instructions = std::mem::take(&mut function.instructions);
    function.instructions = instructions.into_iter().map(legalize_instruction).collect();
}

/// What an illegal instruction turns into
struct Rewrite {
    reasons: Vec<&'static str>,
    before: Vec<Instruction>,
    after: Vec<Instruction>,
}

impl Rewrite {
    fn new() -> Self {
        Self {
            reasons: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Loads `operand` into `scratch` ahead of the instruction and uses the register instead
    fn load(&mut self, reason: &'static str, scratch: Register, operand: &mut Operand) {
        self.reasons.push(reason);
        let value = std::mem::replace(operand, scratch.into());
        self.before.push(Instruction::Mov {
            dst: scratch.into(),
            src: value,
        });
    }
}

fn check_operands(instruction: &Instruction) {
    let mut instruction = instruction.clone();
    instruction.map_operands(|operand| {
        if let Operand::Pseudo(name) = operand {
            crate::ice!("pseudo operand {:?} survived stack allocation", name);
        }
    });
    match &instruction {
        Instruction::Mov {
            dst: dst @ Operand::Immediate(_),
            ..
        }
        | Instruction::Binary {
            dst: dst @ Operand::Immediate(_),
            ..
        }
        | Instruction::SetCC {
            dst: dst @ Operand::Immediate(_),
            ..
        } => crate::ice!("immediate {} used as a destination in {:?}", dst, instruction),
        _ => (),
    }
}

pub fn legalize_instruction(instruction: Instruction) -> AssemblyOutput {
    check_operands(&instruction);
    let original = instruction.clone();
    let mut instruction = instruction;
    let mut rewrite = Rewrite::new();

    match &mut instruction {
        Instruction::Mov { dst, src } => {
            if dst.is_memory() && src.is_memory() {
                rewrite.load("memory to memory mov", Register::R10, src);
            } else if dst.is_memory() && src.is_wide_immediate() {
                rewrite.load("64-bit immediate stored to memory", Register::R10, src);
            }
        }
        Instruction::Binary { opcode, dst, src } => {
            if src.is_wide_immediate() {
                rewrite.load("64-bit immediate operand", Register::R10, src);
            }
            if *opcode == BinaryOpcode::Imul && dst.is_memory() {
                rewrite.reasons.push("imul destination in memory");
                let target = std::mem::replace(dst, Register::R11.into());
                rewrite.before.push(Instruction::Mov {
                    dst: Register::R11.into(),
                    src: target.clone(),
                });
                rewrite.after.push(Instruction::Mov {
                    dst: target,
                    src: Register::R11.into(),
                });
            } else if dst.is_memory() && src.is_memory() {
                rewrite.load("memory to memory arithmetic", Register::R10, src);
            }
        }
        Instruction::Idiv(divisor @ Operand::Immediate(_)) => {
            rewrite.load("idiv by an immediate", Register::R11, divisor);
        }
        Instruction::Cmp { lhs, rhs } => {
            if rhs.is_wide_immediate() {
                rewrite.load("64-bit immediate operand", Register::R10, rhs);
            }
            if matches!(lhs, Operand::Immediate(_)) {
                rewrite.load("cmp with an immediate first operand", Register::R11, lhs);
            } else if lhs.is_memory() && rhs.is_memory() {
                rewrite.load("memory to memory cmp", Register::R10, rhs);
            }
        }
        Instruction::Push(value) if value.is_wide_immediate() => {
            rewrite.load("64-bit immediate pushed", Register::R10, value);
        }
        _ => (),
    }

    if rewrite.reasons.is_empty() {
        return instruction.into();
    }
    tracing::trace!(target: "asmgen::fixup", "{} ({})", original, rewrite.reasons.join(", "));
    AssemblyOutput::new()
        .chain_one(Instruction::Comment(format!(
            "FIXUP: {}",
            rewrite.reasons.join(", ")
        )))
        .chain_one(Instruction::Comment(original.to_string()))
        .chain(rewrite.before)
        .chain_one(instruction)
        .chain(rewrite.after)
}
