//! Macro- and micro-mutation: structural edits (insert/delete an
//! instruction) and in-place edits (register/operator/constant) applied to a
//! child's instruction list.

use rand::Rng;

use crate::error::{LgpError, Result};
use crate::generator::ProgramBlueprint;
use crate::operation::Instruction;
use crate::program::backward_active_set;
use crate::register::{RegisterFile, RegisterKind};
use crate::rng::RandomSource;
use crate::value::Numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroOutcome {
    Inserted,
    Deleted,
    NoOp,
}

/// Insert or delete one instruction: insertion is forced at `min_len`,
/// deletion is forced at `max_len`, and a program pinned at
/// `min_len == max_len` is left unchanged. Insertion can fail with
/// `GenerationExhausted` when `prefer_effective` is set and no
/// effectiveness-preserving candidate turns up within `max_rejections`
/// resamples; the caller folds that into its operator tally rather than
/// aborting the run.
pub fn macro_mutate<V: Numeric>(
    rng: &mut RandomSource,
    instructions: &mut Vec<Instruction<V>>,
    blueprint: &ProgramBlueprint<V>,
    p_insertion: f64,
    prefer_effective: bool,
) -> Result<MacroOutcome> {
    let len = instructions.len();
    let prefers_insertion = rng.gen::<f64>() < p_insertion;
    let can_insert = len < blueprint.max_len;
    let can_delete = len > blueprint.min_len;

    let do_insert = (can_insert && (prefers_insertion || len == blueprint.min_len))
        || (can_insert && !can_delete);
    let do_delete = !do_insert
        && ((can_delete && (!prefers_insertion || len == blueprint.max_len)) || (can_delete && !can_insert));

    if do_insert {
        insert_instruction(rng, instructions, blueprint, prefer_effective)?;
        Ok(MacroOutcome::Inserted)
    } else if do_delete {
        let p = rng.gen_range(0..instructions.len());
        instructions.remove(p);
        Ok(MacroOutcome::Deleted)
    } else {
        Ok(MacroOutcome::NoOp)
    }
}

fn insert_instruction<V: Numeric>(
    rng: &mut RandomSource,
    instructions: &mut Vec<Instruction<V>>,
    blueprint: &ProgramBlueprint<V>,
    prefer_effective: bool,
) -> Result<()> {
    let p = rng.gen_range(0..=instructions.len());
    let mut candidate = blueprint.random_instruction(rng);

    if prefer_effective {
        let mut attempts = 0;
        while attempts < blueprint.max_rejections {
            let (active, _) = backward_active_set(
                instructions,
                &blueprint.output_register_indices,
                |i| blueprint.kind_of(i),
                p..instructions.len(),
            );
            if active.contains(&candidate.destination) {
                break;
            }
            candidate = blueprint.random_instruction(rng);
            attempts += 1;
        }
        if attempts == blueprint.max_rejections {
            log::debug!(
                "macro-mutation insertion gave up finding an effectiveness-preserving candidate after {attempts} rejections"
            );
            return Err(LgpError::GenerationExhausted { attempts });
        }
    }

    instructions.insert(p, candidate);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroField {
    Register,
    Operator,
    Constant,
}

#[derive(Clone, Copy, Debug)]
pub struct MicroMutationRates {
    pub register: f64,
    pub operator: f64,
    pub constant: f64,
}

impl MicroMutationRates {
    fn pick(&self, rng: &mut RandomSource) -> MicroField {
        let total = self.register + self.operator + self.constant;
        let mut roll = rng.gen::<f64>() * total;
        if roll < self.register {
            return MicroField::Register;
        }
        roll -= self.register;
        if roll < self.operator {
            return MicroField::Operator;
        }
        MicroField::Constant
    }
}

/// In-place change of one field of one randomly chosen effective
/// instruction. Returns the field that was touched, or `None` if the
/// program has no effective instructions to mutate. A `Constant` field
/// perturbs the constant register the instruction reads from directly in
/// `register_file`, so the change survives into evaluation.
pub fn micro_mutate<V: Numeric>(
    rng: &mut RandomSource,
    instructions: &mut [Instruction<V>],
    blueprint: &ProgramBlueprint<V>,
    rates: &MicroMutationRates,
    register_file: &mut RegisterFile<V>,
    constant_noise_std: f64,
) -> Option<MicroField> {
    let effective = {
        let (_, eff) = backward_active_set(
            instructions,
            &blueprint.output_register_indices,
            |i| blueprint.kind_of(i),
            0..instructions.len(),
        );
        let mut v: Vec<usize> = eff.into_iter().collect();
        v.sort_unstable();
        v
    };
    if effective.is_empty() {
        return None;
    }
    let idx = effective[rng.gen_range(0..effective.len())];
    let field = rates.pick(rng);

    match field {
        MicroField::Register => mutate_register(rng, instructions, blueprint, idx),
        MicroField::Operator => mutate_operator(rng, instructions, blueprint, idx),
        MicroField::Constant => mutate_constant(
            rng,
            &instructions[idx],
            register_file,
            blueprint,
            constant_noise_std,
        ),
    }
    Some(field)
}

fn mutate_register<V: Numeric>(
    rng: &mut RandomSource,
    instructions: &mut [Instruction<V>],
    blueprint: &ProgramBlueprint<V>,
    idx: usize,
) {
    // Coin flip between the destination and one operand; when replacing the
    // destination, prefer a register from the effective-calculation set so
    // the instruction stays live.
    let mutate_destination = instructions[idx].operands.is_empty() || rng.gen_bool(0.5);

    if mutate_destination {
        let (active, _) = backward_active_set(
            instructions,
            &blueprint.output_register_indices,
            |i| blueprint.kind_of(i),
            (idx + 1)..instructions.len(),
        );
        let calc_active: Vec<usize> = active
            .iter()
            .copied()
            .filter(|&r| matches!(blueprint.kind_of(r), Some(RegisterKind::Calculation)))
            .collect();
        let new_dest = if !calc_active.is_empty() {
            calc_active[rng.gen_range(0..calc_active.len())]
        } else {
            rng.gen_range(0..blueprint.n_calc)
        };
        instructions[idx].destination = new_dest;
    } else {
        let operand_count = instructions[idx].operands.len();
        let which = rng.gen_range(0..operand_count);
        let total = blueprint.n_calc + blueprint.n_input + blueprint.n_const;
        instructions[idx].operands[which] = rng.gen_range(0..total);
    }
}

fn mutate_operator<V: Numeric>(
    rng: &mut RandomSource,
    instructions: &mut [Instruction<V>],
    blueprint: &ProgramBlueprint<V>,
    idx: usize,
) {
    let current_arity = instructions[idx].opcode.arity;
    let candidates: Vec<_> = blueprint
        .operations
        .all()
        .iter()
        .filter(|op| op.arity == current_arity)
        .cloned()
        .collect();
    let replacement = if candidates.is_empty() {
        blueprint.operations.all()[rng.gen_range(0..blueprint.operations.all().len())].clone()
    } else {
        candidates[rng.gen_range(0..candidates.len())].clone()
    };

    let needed_arity = replacement.arity.count();
    if needed_arity != instructions[idx].operands.len() {
        let total = blueprint.n_calc + blueprint.n_input + blueprint.n_const;
        instructions[idx].operands = (0..needed_arity).map(|_| rng.gen_range(0..total)).collect();
    }
    instructions[idx].opcode = replacement;
}

fn mutate_constant<V: Numeric>(
    rng: &mut RandomSource,
    instr: &Instruction<V>,
    register_file: &mut RegisterFile<V>,
    blueprint: &ProgramBlueprint<V>,
    std_dev: f64,
) {
    let const_start = blueprint.n_calc + blueprint.n_input;
    let Some(&reg) = instr.operands.iter().find(|&&r| r >= const_start) else {
        return;
    };
    let Ok(current) = register_file.read(reg) else {
        return;
    };
    let noise = gaussian_noise(rng, std_dev);
    let _ = register_file.set_constant(reg, V::from_f64(current.to_f64() + noise));
}

/// Box-Muller transform; `rand_distr` is not part of this crate's
/// dependency set, so the transform is inlined rather than pulling in a
/// whole extra crate for one call site.
fn gaussian_noise(rng: &mut RandomSource, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::rng::master_rng;
    use std::sync::Arc;

    fn blueprint(min_len: usize, max_len: usize) -> ProgramBlueprint<f64> {
        ProgramBlueprint {
            operations: Arc::new(standard_set::<f64>()),
            n_calc: 4,
            n_input: 2,
            n_const: 2,
            constants_rate: 0.3,
            branch_rate: 0.2,
            min_len,
            max_len,
            initial_min_len: min_len,
            initial_max_len: max_len,
            output_register_indices: vec![0],
            max_rejections: 10,
        }
    }

    #[test]
    fn macro_mutation_never_deletes_at_min_len() {
        let bp = blueprint(3, 10);
        let mut rng = master_rng(Some(5));
        let mut instrs = bp.random_program(&mut rng, 3, 3);
        let before = instrs.len();
        let outcome = macro_mutate(&mut rng, &mut instrs, &bp, 0.0, false).unwrap(); // prefers deletion
        assert_ne!(outcome, MacroOutcome::Deleted);
        assert!(instrs.len() >= before);
    }

    #[test]
    fn macro_mutation_never_inserts_at_max_len() {
        let bp = blueprint(1, 4);
        let mut rng = master_rng(Some(6));
        let mut instrs = bp.random_program(&mut rng, 4, 4);
        let outcome = macro_mutate(&mut rng, &mut instrs, &bp, 1.0, false).unwrap(); // prefers insertion
        assert_ne!(outcome, MacroOutcome::Inserted);
        assert!(instrs.len() <= 4);
    }

    #[test]
    fn macro_mutation_is_noop_when_min_equals_max() {
        let bp = blueprint(4, 4);
        let mut rng = master_rng(Some(9));
        let mut instrs = bp.random_program(&mut rng, 4, 4);
        let outcome = macro_mutate(&mut rng, &mut instrs, &bp, 0.5, false).unwrap();
        assert_eq!(outcome, MacroOutcome::NoOp);
        assert_eq!(instrs.len(), 4);
    }

    #[test]
    fn micro_mutation_preserves_length_and_arity_invariants() {
        let bp = blueprint(2, 10);
        let mut rng = master_rng(Some(12));
        let mut instrs = bp.random_program(&mut rng, 6, 6);
        let mut rf = bp.fresh_register_file(vec![1.0, 2.0], 0.0);
        let rates = MicroMutationRates {
            register: 1.0,
            operator: 1.0,
            constant: 1.0,
        };
        for _ in 0..20 {
            micro_mutate(&mut rng, &mut instrs, &bp, &rates, &mut rf, 0.1);
            for instr in &instrs {
                assert_eq!(instr.operands.len(), instr.opcode.arity.count());
                assert!(instr.destination < bp.n_calc);
            }
        }
    }

    #[test]
    fn constant_micro_mutation_writes_back_into_the_register_file() {
        let bp = blueprint(2, 10);
        let mut rng = master_rng(Some(21));
        let const_start = bp.n_calc + bp.n_input;
        let instrs = vec![crate::operation::Instruction::new(
            0,
            bp.operations.get("add").unwrap().clone(),
            vec![const_start, const_start + 1],
        )];
        let mut rf = bp.fresh_register_file(vec![1.0, 2.0], 0.0);
        let before: Vec<f64> = (0..2).map(|i| rf.read(const_start + i).unwrap()).collect();
        let rates = MicroMutationRates {
            register: 0.0,
            operator: 0.0,
            constant: 1.0,
        };
        let mut instrs = instrs;
        let mut changed = false;
        for _ in 0..50 {
            micro_mutate(&mut rng, &mut instrs, &bp, &rates, &mut rf, 1.0);
            let after: Vec<f64> = (0..2).map(|i| rf.read(const_start + i).unwrap()).collect();
            if after != before {
                changed = true;
                break;
            }
        }
        assert!(changed, "constant mutation never perturbed the register file");
    }
}
