//! Tournament selection.

use crate::program::Program;
use crate::rng::{sample_indices, RandomSource};
use crate::value::Numeric;

/// Run `n` independent tournaments of size `t` over `population`, returning
/// the index of the winner of each. `invert` flips the comparison so the
/// *worst* individual wins — used for steady-state replacement selection
/// ("inverse tournament").
///
/// Ties are broken by first encountered, matching the draw order.
pub fn tournament_select<V: Numeric>(
    rng: &mut RandomSource,
    population: &[Program<V>],
    tournament_size: usize,
    n: usize,
    invert: bool,
) -> Vec<usize> {
    (0..n)
        .map(|_| tournament_once(rng, population, tournament_size, invert))
        .collect()
}

fn tournament_once<V: Numeric>(
    rng: &mut RandomSource,
    population: &[Program<V>],
    tournament_size: usize,
    invert: bool,
) -> usize {
    let contenders = sample_indices(rng, population.len(), tournament_size);
    let mut best = contenders[0];
    for &candidate in &contenders[1..] {
        let better = if invert {
            population[candidate].fitness > population[best].fitness
        } else {
            population[candidate].fitness < population[best].fitness
        };
        if better {
            best = candidate;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::register::RegisterFile;
    use crate::rng::master_rng;

    fn toy_population(fitnesses: &[f64]) -> Vec<Program<f64>> {
        let set = standard_set::<f64>();
        let add = set.get("add").unwrap().clone();
        fitnesses
            .iter()
            .map(|&f| {
                let rf = RegisterFile::new(1, 1, vec![], 0.0);
                let mut p = Program::new(
                    vec![crate::operation::Instruction::new(0, add.clone(), vec![0, 0])],
                    rf,
                    vec![0],
                );
                p.fitness = f;
                p
            })
            .collect()
    }

    #[test]
    fn full_tournament_returns_global_best() {
        let pop = toy_population(&[5.0, 1.0, 3.0, 9.0, 0.5]);
        let mut rng = master_rng(Some(42));
        let winners = tournament_select(&mut rng, &pop, pop.len(), 20, false);
        assert!(winners.iter().all(|&w| w == 4));
    }

    #[test]
    fn size_one_tournament_can_return_any_individual() {
        let pop = toy_population(&[5.0, 1.0, 3.0, 9.0, 0.5]);
        let mut rng = master_rng(Some(1));
        let winners = tournament_select(&mut rng, &pop, 1, 500, false);
        let distinct: std::collections::HashSet<_> = winners.into_iter().collect();
        assert!(distinct.len() > 1, "size-1 tournament should sample uniformly, not collapse to one index");
    }

    #[test]
    fn inverse_tournament_returns_global_worst() {
        let pop = toy_population(&[5.0, 1.0, 3.0, 9.0, 0.5]);
        let mut rng = master_rng(Some(3));
        let losers = tournament_select(&mut rng, &pop, pop.len(), 20, true);
        assert!(losers.iter().all(|&w| w == 3));
    }
}
