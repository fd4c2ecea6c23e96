//! Trainer: repeats an `EvolutionModel` run `R` times to produce an ensemble.

use rayon::prelude::*;

use crate::config::{Configuration, DriverKind};
use crate::dataset::Dataset;
use crate::error::{LgpError, Result};
use crate::event::{CancelToken, EventSink};
use crate::fitness::{FitnessContext, FitnessFunction, Mse};
use crate::generator::ProgramBlueprint;
use crate::model::{island_migration, master_slave, steady_state, EvolutionResult, ModelParams};
use crate::mutation::MicroMutationRates;
use crate::operation::OperationSet;
use crate::program::Program;
use crate::recombination::CrossoverParams;
use crate::rng::child_rng;
use crate::value::Numeric;

/// The ensemble a `Trainer` produces: one `EvolutionResult` per run.
pub struct TrainingResult<V> {
    pub evaluations: Vec<EvolutionResult<V>>,
}

/// Everything a single run needs, built once from `Configuration` and shared
/// read-only across runs. Runs are independent — nothing here is mutated
/// once a `Trainer` starts.
pub struct RunContext<V> {
    pub params: ModelParams<V>,
    pub fitness_ctx: FitnessContext<V>,
    pub population_size: usize,
    pub driver: DriverKind,
    pub island_count: usize,
    pub migration_interval: usize,
    pub migration_count: usize,
    pub master_seed: u64,
}

impl RunContext<f64> {
    /// Assemble a `RunContext` from a validated `Configuration`, the
    /// operation registry it selects from, and an already-loaded dataset.
    pub fn from_config(
        config: &Configuration,
        all_operations: &OperationSet<f64>,
        dataset: Dataset<f64>,
    ) -> Result<Self> {
        let operations = all_operations.select(&config.operations)?;
        let blueprint = ProgramBlueprint {
            operations: std::sync::Arc::new(operations),
            n_calc: config.registers.n_calculation,
            n_input: config.registers.n_input,
            n_const: config.registers.constants.len(),
            constants_rate: config.generation.constants_rate,
            branch_rate: config.generation.branch_initialization_rate,
            min_len: config.program.min_len,
            max_len: config.program.max_len,
            initial_min_len: config.program.initial_min_len,
            initial_max_len: config.program.initial_max_len,
            output_register_indices: config.program.output_register_indices.clone(),
            max_rejections: config.program.max_rejections,
        };

        let params = ModelParams {
            blueprint,
            crossover: CrossoverParams {
                max_segment_length: config.crossover.max_segment_length,
                max_crossover_distance: config.crossover.max_crossover_distance,
                max_segment_length_difference: config.crossover.max_segment_length_difference,
                min_len: config.program.min_len,
                max_len: config.program.max_len,
                max_attempts: config.crossover.max_attempts,
            },
            crossover_rate: config.crossover.rate,
            macro_mutation_rate: config.mutation.macro_rate,
            macro_insertion_rate: config.mutation.insertion_rate,
            micro_mutation_rate: config.mutation.micro_rate,
            micro_rates: MicroMutationRates {
                register: config.mutation.register_rate,
                operator: config.mutation.operator_rate,
                constant: config.mutation.constant_rate,
            },
            constant_values: config.registers.constants.iter().map(|&c| f64::from_f64(c)).collect(),
            constant_noise_std: config.mutation.constant_noise_std,
            tournament_size: config.selection.tournament_size,
            offspring_per_generation: config.selection.offspring_per_generation,
            generations: config.generations,
            stopping_criterion: config.stopping_criterion,
        };

        let fitness_ctx = FitnessContext::new(dataset, Box::new(Mse) as Box<dyn FitnessFunction<f64>>);

        Ok(Self {
            params,
            fitness_ctx,
            population_size: config.selection.population_size,
            driver: config.driver,
            island_count: config.islands.islands,
            migration_interval: config.islands.migration_interval,
            migration_count: config.islands.migration_count,
            master_seed: config.seed.unwrap_or(0),
        })
    }
}

fn seed_population<V: Numeric>(
    rng: &mut crate::rng::RandomSource,
    blueprint: &ProgramBlueprint<V>,
    population_size: usize,
    constant_values: &[V],
    default_value: V,
) -> Vec<Program<V>> {
    (0..population_size)
        .map(|_| {
            let instructions =
                blueprint.random_program(rng, blueprint.initial_min_len, blueprint.initial_max_len);
            let rf = blueprint.fresh_register_file(constant_values.to_vec(), default_value);
            Program::new(instructions, rf, blueprint.output_register_indices.clone())
        })
        .collect()
}

/// `rayon`'s global pool already sizes itself to the available parallelism;
/// `MasterSlave`'s dedicated pool mirrors that default when no explicit
/// worker count is configured.
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn run_one<V: Numeric>(
    run_index: u64,
    ctx: &RunContext<V>,
    sink: &(dyn EventSink + Sync),
    cancel: &CancelToken,
) -> Result<EvolutionResult<V>> {
    let mut rng = child_rng(ctx.master_seed, run_index);
    let default_value = V::default();
    let mut population = seed_population(
        &mut rng,
        &ctx.params.blueprint,
        ctx.population_size,
        &ctx.params.constant_values,
        default_value,
    );
    for p in &mut population {
        ctx.fitness_ctx.evaluate(p)?;
    }

    match ctx.driver {
        DriverKind::SteadyState => {
            steady_state::run(&mut rng, population, &ctx.params, &ctx.fitness_ctx, sink, cancel)
        }
        DriverKind::MasterSlave => master_slave::run(
            &mut rng,
            population,
            &ctx.params,
            &ctx.fitness_ctx,
            sink,
            cancel,
            default_worker_count(),
        ),
        DriverKind::IslandMigration => island_migration::run(
            ctx.master_seed.wrapping_add(run_index),
            population,
            &ctx.params,
            &ctx.fitness_ctx,
            sink,
            cancel,
            ctx.island_count,
            ctx.migration_interval,
            ctx.migration_count,
        ),
    }
}

/// Runs every repetition in order, in-process.
pub struct SequentialTrainer;

impl SequentialTrainer {
    pub fn train<V: Numeric>(
        runs: usize,
        ctx: &RunContext<V>,
        sink: &(dyn EventSink + Sync),
        cancel: &CancelToken,
    ) -> Result<TrainingResult<V>> {
        let mut evaluations = Vec::with_capacity(runs);
        for run_index in 0..runs as u64 {
            evaluations.push(run_one(run_index, ctx, sink, cancel)?);
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(TrainingResult { evaluations })
    }
}

/// Runs every repetition on a dedicated `rayon::ThreadPool`.
pub struct DistributedTrainer;

impl DistributedTrainer {
    pub fn train<V: Numeric>(
        runs: usize,
        ctx: &RunContext<V>,
        sink: &(dyn EventSink + Sync),
        cancel: &CancelToken,
        worker_count: usize,
    ) -> Result<TrainingResult<V>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .build()
            .map_err(|e| LgpError::Configuration(format!("failed to build trainer pool: {e}")))?;

        let evaluations: Vec<Result<EvolutionResult<V>>> = pool.install(|| {
            (0..runs as u64)
                .into_par_iter()
                .map(|run_index| run_one(run_index, ctx, sink, cancel))
                .collect()
        });

        let evaluations = evaluations.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(TrainingResult { evaluations })
    }
}
