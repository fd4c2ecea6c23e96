//! Evolution drivers: SteadyState, MasterSlave, IslandMigration.

pub mod island_migration;
pub mod master_slave;
pub mod stats;
pub mod steady_state;

use rand::Rng;

use crate::error::Result;
use crate::fitness::FitnessContext;
use crate::generator::ProgramBlueprint;
use crate::mutation::{self, MacroOutcome, MicroMutationRates};
use crate::program::Program;
use crate::recombination::{self, CrossoverParams};
use crate::rng::RandomSource;
use crate::selection::tournament_select;
use crate::value::Numeric;

pub use stats::Statistics;

/// Everything a single generation step needs, shared by every driver so the
/// reproduction rules are implemented exactly once.
#[derive(Clone)]
pub struct ModelParams<V> {
    pub blueprint: ProgramBlueprint<V>,
    pub crossover: CrossoverParams,
    pub crossover_rate: f64,
    pub macro_mutation_rate: f64,
    /// Probability macro-mutation prefers insertion over deletion, before the
    /// length-bound guards force one or the other.
    pub macro_insertion_rate: f64,
    pub micro_mutation_rate: f64,
    pub micro_rates: MicroMutationRates,
    pub constant_values: Vec<V>,
    pub constant_noise_std: f64,
    pub tournament_size: usize,
    /// Children produced (and, after evaluation, considered for replacement)
    /// each generation.
    pub offspring_per_generation: usize,
    pub generations: usize,
    pub stopping_criterion: f64,
}

/// Result of one model run.
pub struct EvolutionResult<V> {
    pub best: Program<V>,
    pub final_population: Vec<Program<V>>,
    pub statistics: Vec<Statistics>,
    pub cancelled: bool,
}

/// Tallies operator outcomes across one generation's breeding step, folded
/// into that generation's `Statistics` rather than propagated as failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorTally {
    pub macro_successes: u64,
    pub macro_failures: u64,
    pub micro_successes: u64,
    pub crossover_successes: u64,
    pub crossover_failures: u64,
}

impl OperatorTally {
    fn merge_into(self, stats: &mut Statistics) {
        stats.macro_mutation_successes += self.macro_successes;
        stats.macro_mutation_failures += self.macro_failures;
        stats.micro_mutation_successes += self.micro_successes;
        stats.crossover_successes += self.crossover_successes;
        stats.crossover_failures += self.crossover_failures;
    }
}

/// Selection, crossover, and mutation for one breeding pair — everything
/// sequential-on-the-coordinator, stopping short of evaluation so
/// `master_slave` can batch evaluation across a worker pool while
/// `steady_state`/`island_migration` can run it inline via
/// [`breed_offspring`].
fn breed_pair<V: Numeric>(
    rng: &mut RandomSource,
    population: &[Program<V>],
    params: &ModelParams<V>,
) -> (Program<V>, Program<V>, OperatorTally) {
    let mut tally = OperatorTally::default();

    let parent_indices = tournament_select(rng, population, params.tournament_size, 2, false);
    let mut child_a = population[parent_indices[0]].clone();
    let mut child_b = population[parent_indices[1]].clone();

    if rng.gen::<f64>() < params.crossover_rate {
        match recombination::linear_crossover(
            rng,
            &child_a.instructions,
            &child_b.instructions,
            &params.crossover,
        ) {
            Ok((a, b)) => {
                child_a.instructions = a;
                child_b.instructions = b;
                tally.crossover_successes += 1;
            }
            Err(e) => {
                log::debug!("crossover skipped for this pair: {e}");
                tally.crossover_failures += 1;
            }
        }
    }

    for child in [&mut child_a, &mut child_b] {
        if rng.gen::<f64>() < params.macro_mutation_rate {
            let before = child.instructions.len();
            let outcome = mutation::macro_mutate(
                rng,
                &mut child.instructions,
                &params.blueprint,
                params.macro_insertion_rate,
                true,
            );
            match outcome {
                Ok(MacroOutcome::NoOp) if before == child.instructions.len() => {
                    tally.macro_failures += 1
                }
                Ok(_) => tally.macro_successes += 1,
                Err(e) => {
                    log::debug!("macro-mutation skipped for this child: {e}");
                    tally.macro_failures += 1;
                }
            }
        }
        if rng.gen::<f64>() < params.micro_mutation_rate
            && mutation::micro_mutate(
                rng,
                &mut child.instructions,
                &params.blueprint,
                &params.micro_rates,
                &mut child.register_file,
                params.constant_noise_std,
            )
            .is_some()
        {
            tally.micro_successes += 1;
        }
    }

    (child_a, child_b, tally)
}

/// Produce `params.offspring_per_generation` children by repeatedly breeding
/// pairs and trimming the last pair down when the configured count is odd.
pub fn make_offspring<V: Numeric>(
    rng: &mut RandomSource,
    population: &[Program<V>],
    params: &ModelParams<V>,
) -> (Vec<Program<V>>, OperatorTally) {
    let mut tally = OperatorTally::default();
    let mut children = Vec::with_capacity(params.offspring_per_generation);

    while children.len() < params.offspring_per_generation {
        let (a, b, pair_tally) = breed_pair(rng, population, params);
        tally.macro_successes += pair_tally.macro_successes;
        tally.macro_failures += pair_tally.macro_failures;
        tally.micro_successes += pair_tally.micro_successes;
        tally.crossover_successes += pair_tally.crossover_successes;
        tally.crossover_failures += pair_tally.crossover_failures;
        children.push(a);
        if children.len() < params.offspring_per_generation {
            children.push(b);
        }
    }

    (children, tally)
}

/// One SteadyState reproduction step: [`make_offspring`] followed by
/// evaluating every child inline. Used by `steady_state` and each island
/// worker in `island_migration`, where evaluation is not batched.
pub fn breed_offspring<V: Numeric>(
    rng: &mut RandomSource,
    population: &[Program<V>],
    params: &ModelParams<V>,
    fitness_ctx: &FitnessContext<V>,
) -> Result<(Vec<Program<V>>, OperatorTally)> {
    let (mut children, tally) = make_offspring(rng, population, params);
    for child in &mut children {
        fitness_ctx.evaluate(child)?;
    }
    Ok((children, tally))
}

/// Steady-state replacement: the `children.len()` worst individuals (by
/// inverse tournament) are evicted in favor of the new children.
pub fn replace_worst<V: Numeric>(
    rng: &mut RandomSource,
    population: &mut [Program<V>],
    tournament_size: usize,
    children: Vec<Program<V>>,
) {
    let victims = tournament_select(rng, population, tournament_size, children.len(), true);
    for (slot, child) in victims.into_iter().zip(children) {
        population[slot] = child;
    }
}

/// Index of the fittest (lowest-fitness) program in a population. Panics
/// only on an empty slice, which no driver ever passes — every population is
/// seeded before the first generation runs.
pub fn best_index<V: Numeric>(population: &[Program<V>]) -> usize {
    population
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.fitness.partial_cmp(&b.1.fitness).unwrap())
        .map(|(i, _)| i)
        .expect("population must not be empty")
}
