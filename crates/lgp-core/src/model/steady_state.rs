//! SteadyState driver: one coordinator thread, every generation breeds and
//! evaluates its children before replacing the weakest individuals.

use crate::error::Result;
use crate::event::{CancelToken, Event, EventSink};
use crate::fitness::FitnessContext;
use crate::program::Program;
use crate::rng::RandomSource;
use crate::value::Numeric;

use super::{best_index, breed_offspring, replace_worst, EvolutionResult, ModelParams, Statistics};

/// Run SteadyState evolution to completion over a pre-seeded population.
/// Terminates at `params.generations` or once the best fitness falls at or
/// below `params.stopping_criterion`, whichever comes first; cooperative
/// cancellation is checked once per generation.
pub fn run<V: Numeric>(
    rng: &mut RandomSource,
    mut population: Vec<Program<V>>,
    params: &ModelParams<V>,
    fitness_ctx: &FitnessContext<V>,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> Result<EvolutionResult<V>> {
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

        let (children, tally) = breed_offspring(rng, &population, params, fitness_ctx)?;
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
