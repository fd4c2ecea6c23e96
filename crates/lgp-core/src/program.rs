//! Program: an ordered instruction list over a register file.

use std::collections::HashSet;

use crate::error::Result;
use crate::operation::Instruction;
use crate::register::{RegisterFile, RegisterKind};
use crate::value::{Numeric, Outputs};

/// Sentinel fitness value for a program that has never been evaluated.
pub const UNDEFINED_FITNESS: f64 = f64::INFINITY;

/// An evolved individual: an instruction list, its own register file, the
/// registers read as output, and the fitness of its last evaluation.
#[derive(Clone)]
pub struct Program<V> {
    pub instructions: Vec<Instruction<V>>,
    pub register_file: RegisterFile<V>,
    pub output_register_indices: Vec<usize>,
    pub fitness: f64,
}

impl<V: Numeric> Program<V> {
    pub fn new(
        instructions: Vec<Instruction<V>>,
        register_file: RegisterFile<V>,
        output_register_indices: Vec<usize>,
    ) -> Self {
        Self {
            instructions,
            register_file,
            output_register_indices,
            fitness: UNDEFINED_FITNESS,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Execute from instruction 0. A branch instruction gates exactly the
    /// instruction that immediately follows it: if its predicate is false,
    /// that instruction is skipped; otherwise execution falls through
    /// normally. Consecutive branches chain, each gating only its own
    /// successor. A branch with no successor (the last instruction) simply
    /// discards its predicate result.
    pub fn execute(&mut self) -> Result<()> {
        let n = self.instructions.len();
        let mut i = 0;
        while i < n {
            let instr = self.instructions[i].clone();
            if instr.is_branch() {
                let args = self.read_operands(&instr.operands)?;
                let taken = instr.opcode.evaluate_predicate(&args)?;
                i += if taken { 1 } else { 2 };
            } else {
                let args = self.read_operands(&instr.operands)?;
                let result = instr.opcode.execute(&args)?;
                self.register_file.write(instr.destination, result)?;
                i += 1;
            }
        }
        Ok(())
    }

    fn read_operands(&self, operands: &[usize]) -> Result<Vec<V>> {
        operands.iter().map(|&r| self.register_file.read(r)).collect()
    }

    pub fn read_outputs(&self) -> Result<Outputs<V>> {
        if self.output_register_indices.len() == 1 {
            Ok(Outputs::Single(
                self.register_file.read(self.output_register_indices[0])?,
            ))
        } else {
            let values = self
                .output_register_indices
                .iter()
                .map(|&r| self.register_file.read(r))
                .collect::<Result<Vec<_>>>()?;
            Ok(Outputs::Multiple(values))
        }
    }

    /// Indices of instructions in the effective set, in original order.
    pub fn effective_indices(&self) -> Vec<usize> {
        let (_, effective) = backward_active_set(
            &self.instructions,
            &self.output_register_indices,
            |i| self.register_file.kind_of(i),
            0..self.instructions.len(),
        );
        let mut indices: Vec<usize> = effective.into_iter().collect();
        indices.sort_unstable();
        indices
    }

    pub fn effective_instructions(&self) -> Vec<&Instruction<V>> {
        self.effective_indices()
            .into_iter()
            .map(|i| &self.instructions[i])
            .collect()
    }

    /// The set of Calculation/Input registers whose value is still needed by
    /// instructions at or after `k`, looking only at the suffix
    /// `instructions[k..]` and the program's outputs. Used by micro-mutation
    /// to pick a replacement register/destination that keeps the mutated
    /// instruction live.
    pub fn effective_registers_before(&self, k: usize) -> HashSet<usize> {
        backward_active_set(
            &self.instructions,
            &self.output_register_indices,
            |i| self.register_file.kind_of(i),
            k..self.instructions.len(),
        )
        .0
    }

    /// Textual form: one instruction per line, non-effective lines prefixed
    /// with `// `.
    pub fn render(&self) -> String {
        let effective = self.effective_indices();
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, instr)| {
                if effective.binary_search(&i).is_ok() {
                    instr.render()
                } else {
                    format!("// {}", instr.render())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Backward sweep over `instructions[range]`: returns the set of registers
/// still "needed" once the sweep reaches the start of `range`, and the set
/// of instruction indices within `range` found effective. Shared by
/// `Program`'s effective-instruction analysis and by macro-mutation's
/// insertion step (generator.rs / mutation.rs), which must run the same
/// analysis over a not-yet-committed instruction list.
///
/// A branch is effective iff the instruction immediately following it is
/// effective — it gates exactly that one instruction. A non-branch
/// instruction is effective iff its destination is in the active set; it
/// then stops contributing that destination (a later write to the same
/// register is intron unless something still needs it) and adds its
/// Calculation/Input operands to the active set.
pub fn backward_active_set<V>(
    instructions: &[Instruction<V>],
    output_register_indices: &[usize],
    kind_of: impl Fn(usize) -> Option<RegisterKind>,
    range: std::ops::Range<usize>,
) -> (HashSet<usize>, HashSet<usize>) {
    let mut active: HashSet<usize> = output_register_indices.iter().copied().collect();
    let mut effective = HashSet::new();
    for i in range.rev() {
        let instr = &instructions[i];
        if instr.is_branch() {
            if effective.contains(&(i + 1)) {
                effective.insert(i);
                activate_operands(instr, &kind_of, &mut active);
            }
        } else if active.contains(&instr.destination) {
            effective.insert(i);
            active.remove(&instr.destination);
            activate_operands(instr, &kind_of, &mut active);
        }
    }
    (active, effective)
}

fn activate_operands<V>(
    instr: &Instruction<V>,
    kind_of: &impl Fn(usize) -> Option<RegisterKind>,
    active: &mut HashSet<usize>,
) {
    for &operand in &instr.operands {
        if matches!(
            kind_of(operand),
            Some(RegisterKind::Calculation) | Some(RegisterKind::Input)
        ) {
            active.insert(operand);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::register::RegisterFile;

    fn ops() -> crate::operation::OperationSet<f64> {
        standard_set::<f64>()
    }

    #[test]
    fn branch_true_executes_both_following_instructions() {
        let set = ops();
        let add = set.get("add").unwrap().clone();
        let sub = set.get("sub").unwrap().clone();
        let gt = set.get("if_greater").unwrap().clone();

        // registers: calc 0, input 1,2 -> indices 0 (calc), 1,2 (input)
        let mut rf = RegisterFile::new(1, 2, vec![], 0.0);
        rf.load_row(&[3.0, 1.0]).unwrap();

        let instrs = vec![
            Instruction::new(0, gt, vec![1, 2]),
            Instruction::new(0, add, vec![1, 2]),
            Instruction::new(0, sub, vec![1, 2]),
        ];
        let mut program = Program::new(instrs, rf, vec![0]);
        program.execute().unwrap();
        assert_eq!(program.register_file.read(0).unwrap(), 2.0);
    }

    #[test]
    fn branch_false_skips_the_next_instruction() {
        let set = ops();
        let add = set.get("add").unwrap().clone();
        let sub = set.get("sub").unwrap().clone();
        let gt = set.get("if_greater").unwrap().clone();

        let mut rf = RegisterFile::new(1, 2, vec![], 0.0);
        rf.load_row(&[1.0, 3.0]).unwrap();

        let instrs = vec![
            Instruction::new(0, gt, vec![1, 2]),
            Instruction::new(0, add, vec![1, 2]),
            Instruction::new(0, sub, vec![1, 2]),
        ];
        let mut program = Program::new(instrs, rf, vec![0]);
        program.execute().unwrap();
        assert_eq!(program.register_file.read(0).unwrap(), -2.0);
    }

    #[test]
    fn non_effective_instruction_is_excluded() {
        let set = ops();
        let add = set.get("add").unwrap().clone();
        let mul = set.get("mul").unwrap().clone();

        // 6 calculation registers, no inputs needed for this structural test
        let rf = RegisterFile::new(6, 0, vec![], 0.0);

        let instrs = vec![
            Instruction::new(2, add.clone(), vec![3, 4]), // r2 = r3 + r4
            Instruction::new(0, add, vec![2, 1]),         // r0 = r2 + r1
            Instruction::new(5, mul, vec![2, 2]),         // r5 = r2 * r2 (dead)
        ];
        let mut program = Program::new(instrs, rf, vec![0]);
        let effective = program.effective_indices();
        assert_eq!(effective, vec![0, 1]);
        program.execute().unwrap();
    }

    #[test]
    fn branch_as_final_instruction_discards_predicate() {
        let set = ops();
        let gt = set.get("if_greater").unwrap().clone();
        let rf = RegisterFile::new(1, 2, vec![], 0.0);
        let instrs = vec![Instruction::new(0, gt, vec![1, 2])];
        let mut program = Program::new(instrs, rf, vec![0]);
        assert!(program.execute().is_ok());
    }

    #[test]
    fn clone_is_independent_and_observationally_equal() {
        let set = ops();
        let add = set.get("add").unwrap().clone();
        let mut rf = RegisterFile::new(1, 2, vec![], 0.0);
        rf.load_row(&[1.0, 2.0]).unwrap();
        let instrs = vec![Instruction::new(0, add, vec![1, 2])];
        let mut original = Program::new(instrs, rf, vec![0]);
        let mut clone = original.clone();

        original.execute().unwrap();
        clone.execute().unwrap();
        assert_eq!(
            original.register_file.read(0).unwrap(),
            clone.register_file.read(0).unwrap()
        );

        clone.register_file.write(0, 999.0).unwrap();
        assert_ne!(
            original.register_file.read(0).unwrap(),
            clone.register_file.read(0).unwrap()
        );
    }
}
