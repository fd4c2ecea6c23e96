//! Random instruction/program synthesis.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use crate::operation::{Instruction, OperationSet};
use crate::register::{RegisterFile, RegisterKind};
use crate::rng::RandomSource;
use crate::value::Numeric;

/// Everything a generator (and, later, macro-mutation's insertion step) needs
/// to synthesize one instruction or program: register layout, the available
/// operations, and the configured generation biases. Bundled into one value
/// so callers don't have to thread half a dozen parameters through.
#[derive(Clone)]
pub struct ProgramBlueprint<V> {
    pub operations: Arc<OperationSet<V>>,
    pub n_calc: usize,
    pub n_input: usize,
    pub n_const: usize,
    /// Probability the last operand of a generated instruction is biased to
    /// a Constant register.
    pub constants_rate: f64,
    /// Probability the generated operator is drawn from the branch subset.
    pub branch_rate: f64,
    pub min_len: usize,
    pub max_len: usize,
    pub initial_min_len: usize,
    pub initial_max_len: usize,
    pub output_register_indices: Vec<usize>,
    /// Attempts before effective-program generation (or macro-mutation's
    /// insertion step) falls back to an unconstrained draw.
    pub max_rejections: usize,
}

impl<V: Numeric> ProgramBlueprint<V> {
    fn total_registers(&self) -> usize {
        self.n_calc + self.n_input + self.n_const
    }

    fn random_register(&self, rng: &mut RandomSource) -> usize {
        rng.gen_range(0..self.total_registers())
    }

    fn random_constant_register(&self, rng: &mut RandomSource) -> usize {
        let start = self.n_calc + self.n_input;
        start + rng.gen_range(0..self.n_const)
    }

    fn random_operand(&self, rng: &mut RandomSource, is_last: bool) -> usize {
        if is_last && self.n_const > 0 && rng.gen::<f64>() < self.constants_rate {
            self.random_constant_register(rng)
        } else {
            self.random_register(rng)
        }
    }

    fn random_operation(&self, rng: &mut RandomSource) -> Arc<crate::operation::Operation<V>> {
        let branches: Vec<_> = self.operations.branches().collect();
        if !branches.is_empty() && rng.gen::<f64>() < self.branch_rate {
            branches[rng.gen_range(0..branches.len())].clone()
        } else {
            let all = self.operations.all();
            all[rng.gen_range(0..all.len())].clone()
        }
    }

    /// Draw one random instruction: destination uniform over Calculation,
    /// operator per `random_operation`, operands per `random_operand`.
    pub fn random_instruction(&self, rng: &mut RandomSource) -> Instruction<V> {
        let destination = rng.gen_range(0..self.n_calc);
        let op = self.random_operation(rng);
        let arity = op.arity.count();
        let operands = (0..arity)
            .map(|i| self.random_operand(rng, i + 1 == arity))
            .collect();
        Instruction::new(destination, op, operands)
    }

    /// `RandomProgramGenerator`: draw a uniform length in `[min_len,
    /// max_len]` (the initial range when seeding a population) and emit that
    /// many random instructions.
    pub fn random_program(&self, rng: &mut RandomSource, min_len: usize, max_len: usize) -> Vec<Instruction<V>> {
        let len = if min_len == max_len {
            min_len
        } else {
            rng.gen_range(min_len..=max_len)
        };
        (0..len).map(|_| self.random_instruction(rng)).collect()
    }

    /// Build backward from the outputs so most emitted instructions are
    /// effective by construction. Each candidate instruction is accepted
    /// immediately if its destination is already needed; otherwise it is
    /// resampled up to `max_rejections` times before falling back to an
    /// unconstrained draw, which is logged rather than silently accepted.
    pub fn effective_program(&self, rng: &mut RandomSource, min_len: usize, max_len: usize) -> Vec<Instruction<V>> {
        let len = if min_len == max_len {
            min_len
        } else {
            rng.gen_range(min_len..=max_len)
        };
        let mut active: HashSet<usize> = self.output_register_indices.iter().copied().collect();
        let mut reversed = Vec::with_capacity(len);
        for _ in 0..len {
            let mut candidate = self.random_instruction(rng);
            let mut attempts = 0;
            while !active.contains(&candidate.destination) && attempts < self.max_rejections {
                candidate = self.random_instruction(rng);
                attempts += 1;
            }
            if attempts == self.max_rejections && !active.contains(&candidate.destination) {
                log::debug!(
                    "effective-program generation fell back to an unconstrained instruction after {attempts} rejections"
                );
            }
            active.remove(&candidate.destination);
            for &operand in &candidate.operands {
                if self.is_calc_or_input(operand) {
                    active.insert(operand);
                }
            }
            reversed.push(candidate);
        }
        reversed.reverse();
        reversed
    }

    fn is_calc_or_input(&self, index: usize) -> bool {
        index < self.n_calc + self.n_input
    }

    pub fn fresh_register_file(&self, constants: Vec<V>, default_value: V) -> RegisterFile<V> {
        RegisterFile::new(self.n_calc, self.n_input, constants, default_value)
    }

    pub fn kind_of(&self, index: usize) -> Option<RegisterKind> {
        if index < self.n_calc {
            Some(RegisterKind::Calculation)
        } else if index < self.n_calc + self.n_input {
            Some(RegisterKind::Input)
        } else if index < self.total_registers() {
            Some(RegisterKind::Constant)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::rng::master_rng;

    fn blueprint() -> ProgramBlueprint<f64> {
        ProgramBlueprint {
            operations: Arc::new(standard_set::<f64>()),
            n_calc: 4,
            n_input: 2,
            n_const: 2,
            constants_rate: 0.5,
            branch_rate: 0.2,
            min_len: 1,
            max_len: 20,
            initial_min_len: 1,
            initial_max_len: 10,
            output_register_indices: vec![0],
            max_rejections: 10,
        }
    }

    #[test]
    fn random_program_respects_length_bounds() {
        let bp = blueprint();
        let mut rng = master_rng(Some(1));
        for _ in 0..50 {
            let prog = bp.random_program(&mut rng, bp.initial_min_len, bp.initial_max_len);
            assert!(prog.len() >= bp.initial_min_len && prog.len() <= bp.initial_max_len);
            for instr in &prog {
                assert!(instr.destination < bp.n_calc);
                assert_eq!(instr.operands.len(), instr.opcode.arity.count());
            }
        }
    }

    #[test]
    fn effective_program_keeps_output_reachable() {
        let bp = blueprint();
        let mut rng = master_rng(Some(7));
        let prog = bp.effective_program(&mut rng, 5, 5);
        assert_eq!(prog.len(), 5);
    }
}
