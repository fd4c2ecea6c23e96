//! MasterSlave driver: SteadyState's control flow with evaluation batched
//! over a `rayon` worker pool. Selection, crossover, mutation, and
//! replacement stay on the coordinator thread; only evaluation — the one
//! CPU-bound, side-effect-free stage — fans out.

use rayon::prelude::*;

use crate::error::Result;
use crate::event::{CancelToken, Event, EventSink};
use crate::fitness::FitnessContext;
use crate::program::Program;
use crate::rng::RandomSource;
use crate::value::Numeric;

use super::{best_index, make_offspring, replace_worst, EvolutionResult, ModelParams, Statistics};

/// Evaluate `population` in parallel across `worker_count` threads. Each
/// program is independent — no shared mutable state crosses the batch.
fn evaluate_batch<V: Numeric>(
    population: &mut [Program<V>],
    fitness_ctx: &FitnessContext<V>,
    pool: &rayon::ThreadPool,
) -> Result<()> {
    pool.install(|| {
        population
            .par_iter_mut()
            .try_for_each(|p| fitness_ctx.evaluate(p).map(|_| ()))
    })
}

/// Run MasterSlave evolution. `worker_count` sizes the `rayon` pool used for
/// every batch evaluation (the initial population and every generation's
/// children). Evaluation itself draws no randomness, so unlike
/// `island_migration`'s per-island RNGs or the `Trainer`'s per-run RNGs,
/// there is no worker-indexed seed to split here — the only
/// `(seed, worker_count)`-sensitive step is the coordinator's own
/// selection/crossover/mutation sequence, which always runs on `rng` alone
/// regardless of `worker_count`.
pub fn run<V: Numeric>(
    rng: &mut RandomSource,
    mut population: Vec<Program<V>>,
    params: &ModelParams<V>,
    fitness_ctx: &FitnessContext<V>,
    sink: &dyn EventSink,
    cancel: &CancelToken,
    worker_count: usize,
) -> Result<EvolutionResult<V>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count.max(1))
        .build()
        .map_err(|e| crate::error::LgpError::Configuration(format!("failed to build worker pool: {e}")))?;

    evaluate_batch(&mut population, fitness_ctx, &pool)?;

    let mut statistics = Vec::with_capacity(params.generations);
    let mut best_fitness = population[best_index(&population)].fitness;
    let mut cancelled = false;

    for generation in 0..params.generations {
        if cancel.is_cancelled() {
            sink.notify(Event::Cancelled { generation });
            cancelled = true;
            break;
        }
        sink.notify(Event::GenerationStarted { generation });

        let (mut children, tally) = make_offspring(rng, &population, params);
        pool.install(|| {
            children
                .par_iter_mut()
                .try_for_each(|p| fitness_ctx.evaluate(p).map(|_| ()))
        })?;

        replace_worst(rng, &mut population, params.tournament_size, children);

        let mut stats = Statistics::capture(generation, &population);
        tally.merge_into(&mut stats);

        let current_best = population[best_index(&population)].fitness;
        if current_best < best_fitness {
            best_fitness = current_best;
            sink.notify(Event::BestFitnessImproved {
                generation,
                fitness: best_fitness,
            });
        }
        statistics.push(stats);

        if best_fitness <= params.stopping_criterion {
            break;
        }
    }

    let best = population[best_index(&population)].clone();
    Ok(EvolutionResult {
        best,
        final_population: population,
        statistics,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::dataset::{Dataset, FitnessCase};
    use crate::event::NullSink;
    use crate::fitness::Mse;
    use crate::generator::ProgramBlueprint;
    use crate::mutation::MicroMutationRates;
    use crate::recombination::CrossoverParams;
    use crate::rng::master_rng;
    use std::sync::Arc;

    fn toy_params() -> ModelParams<f64> {
        ModelParams {
            blueprint: ProgramBlueprint {
                operations: Arc::new(standard_set::<f64>()),
                n_calc: 3,
                n_input: 1,
                n_const: 1,
                constants_rate: 0.3,
                branch_rate: 0.0,
                min_len: 1,
                max_len: 20,
                initial_min_len: 2,
                initial_max_len: 6,
                output_register_indices: vec![0],
                max_rejections: 10,
            },
            crossover: CrossoverParams::default(),
            crossover_rate: 0.7,
            macro_mutation_rate: 0.3,
            macro_insertion_rate: 0.5,
            micro_mutation_rate: 0.5,
            micro_rates: MicroMutationRates {
                register: 1.0,
                operator: 1.0,
                constant: 1.0,
            },
            constant_values: vec![1.0],
            constant_noise_std: 0.1,
            tournament_size: 3,
            offspring_per_generation: 2,
            generations: 10,
            stopping_criterion: 1e-9,
        }
    }

    fn toy_fitness_ctx() -> FitnessContext<f64> {
        let cases = (0..10)
            .map(|x| FitnessCase {
                features: vec![x as f64],
                targets: vec![x as f64],
            })
            .collect();
        FitnessContext::new(Dataset::new(cases), Box::new(Mse))
    }

    #[test]
    fn parallel_evaluation_matches_population_size() {
        let params = toy_params();
        let ctx = toy_fitness_ctx();
        let mut rng = master_rng(Some(77));
        let population: Vec<Program<f64>> = (0..8)
            .map(|_| {
                let instructions = params.blueprint.random_program(&mut rng, 2, 6);
                let rf = params
                    .blueprint
                    .fresh_register_file(params.constant_values.clone(), 0.0);
                Program::new(instructions, rf, vec![0])
            })
            .collect();

        let result = run(
            &mut rng,
            population,
            &params,
            &ctx,
            &NullSink,
            &CancelToken::new(),
            2,
        )
        .unwrap();

        assert_eq!(result.final_population.len(), 8);
        assert!(result
            .final_population
            .iter()
            .all(|p| p.fitness.is_finite() || p.fitness == crate::program::UNDEFINED_FITNESS));
    }
}
