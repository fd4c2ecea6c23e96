//! Fitness evaluation.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::program::Program;
use crate::value::{Numeric, Outputs};

/// A pluggable scoring function over a program's outputs across every row of
/// a dataset. Lower is better, matching tournament selection's `<` ordering.
pub trait FitnessFunction<V>: Send + Sync {
    fn score(&self, predictions: &[Outputs<V>], targets: &[Vec<V>]) -> f64;
}

/// Mean squared error, summed across output registers when a program is
/// multi-output. The built-in default; anything more exotic is left to a
/// caller-supplied `FitnessFunction`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl<V: Numeric> FitnessFunction<V> for Mse {
    fn score(&self, predictions: &[Outputs<V>], targets: &[Vec<V>]) -> f64 {
        if predictions.is_empty() {
            return f64::INFINITY;
        }
        let mut sum = 0.0;
        let mut count = 0usize;
        for (pred, target) in predictions.iter().zip(targets) {
            for (p, t) in pred.as_slice().iter().zip(target) {
                let diff = p.to_f64() - t.to_f64();
                sum += diff * diff;
                count += 1;
            }
        }
        if count == 0 {
            f64::INFINITY
        } else {
            sum / count as f64
        }
    }
}

/// Binds a dataset and a scoring function together so evaluation call sites
/// (selection, trainers, drivers) don't each have to thread both through.
pub struct FitnessContext<V> {
    dataset: Dataset<V>,
    function: Box<dyn FitnessFunction<V>>,
}

impl<V: Numeric> FitnessContext<V> {
    pub fn new(dataset: Dataset<V>, function: Box<dyn FitnessFunction<V>>) -> Self {
        Self { dataset, function }
    }

    pub fn dataset(&self) -> &Dataset<V> {
        &self.dataset
    }

    /// Run `program` over every fitness case, resetting the register file and
    /// reloading the input row before each execution. A row that fails to
    /// execute (an `Arity`/`RegisterAccess`/`RegisterOutOfRange` bug in a
    /// malformed program) is a fatal `Evaluation` error — it should not have
    /// been constructible by a correct generator/mutation operator, so it is
    /// propagated rather than folded into statistics.
    pub fn evaluate(&self, program: &mut Program<V>) -> Result<f64> {
        let mut predictions = Vec::with_capacity(self.dataset.len());
        let mut targets = Vec::with_capacity(self.dataset.len());
        for case in self.dataset.cases() {
            program.register_file.reset();
            program.register_file.load_row(&case.features)?;
            program.execute()?;
            predictions.push(program.read_outputs()?);
            targets.push(case.targets.clone());
        }
        let score = self.function.score(&predictions, &targets);
        program.fitness = score;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::dataset::{Dataset, FitnessCase};
    use crate::operation::Instruction;
    use crate::register::RegisterFile;

    fn identity_program() -> Program<f64> {
        let set = standard_set::<f64>();
        let add = set.get("add").unwrap().clone();
        let rf = RegisterFile::new(1, 1, vec![0.0], 0.0);
        Program::new(
            vec![Instruction::new(0, add, vec![1, 2])],
            rf,
            vec![0],
        )
    }

    #[test]
    fn mse_scores_exact_fit_as_zero() {
        let mut program = identity_program();
        let dataset = Dataset::new(vec![
            FitnessCase {
                features: vec![1.0],
                targets: vec![1.0],
            },
            FitnessCase {
                features: vec![2.0],
                targets: vec![2.0],
            },
        ]);
        let ctx = FitnessContext::new(dataset, Box::new(Mse));
        let score = ctx.evaluate(&mut program).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(program.fitness, 0.0);
    }

    #[test]
    fn mse_penalizes_deviation() {
        let mut program = identity_program();
        let dataset = Dataset::new(vec![FitnessCase {
            features: vec![1.0],
            targets: vec![3.0],
        }]);
        let ctx = FitnessContext::new(dataset, Box::new(Mse));
        let score = ctx.evaluate(&mut program).unwrap();
        assert_eq!(score, 4.0);
    }
}
