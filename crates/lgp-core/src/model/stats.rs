//! Per-generation statistics.

use crate::program::Program;
use crate::value::Numeric;

/// Snapshot taken once per generation: fitness and length distributions plus
/// operator success/failure counters accumulated since the previous
/// snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub generation: usize,
    pub min_fitness: f64,
    pub mean_fitness: f64,
    pub std_fitness: f64,
    pub length_min: f64,
    pub length_mean: f64,
    pub length_max: f64,
    pub length_std: f64,
    pub macro_mutation_successes: u64,
    pub macro_mutation_failures: u64,
    pub micro_mutation_successes: u64,
    pub crossover_successes: u64,
    pub crossover_failures: u64,
}

impl Statistics {
    pub fn capture<V: Numeric>(generation: usize, population: &[Program<V>]) -> Self {
        let fitnesses: Vec<f64> = population.iter().map(|p| p.fitness).collect();
        let lengths: Vec<f64> = population.iter().map(|p| p.len() as f64).collect();
        let (min_fitness, mean_fitness, std_fitness) = moments(&fitnesses);
        let (length_min, length_mean, length_std) = moments(&lengths);
        let length_max = lengths.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            generation,
            min_fitness,
            mean_fitness,
            std_fitness,
            length_min,
            length_mean,
            length_max,
            length_std,
            ..Default::default()
        }
    }
}

/// `(min, mean, population standard deviation)` of a non-empty slice. An
/// empty slice yields `(UNDEFINED_FITNESS, 0.0, 0.0)` rather than panicking,
/// matching the sentinel used for an unevaluated program.
fn moments(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (crate::program::UNDEFINED_FITNESS, 0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (min, mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_uniform_values_have_zero_std() {
        let (min, mean, std) = moments(&[2.0, 2.0, 2.0]);
        assert_eq!(min, 2.0);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 0.0);
    }

    #[test]
    fn moments_of_empty_slice_use_undefined_fitness_sentinel() {
        let (min, mean, std) = moments(&[]);
        assert_eq!(min, crate::program::UNDEFINED_FITNESS);
        assert_eq!(mean, 0.0);
        assert_eq!(std, 0.0);
    }
}
