//! Linear crossover between two programs' instruction lists.

use rand::Rng;

use crate::error::{LgpError, Result};
use crate::operation::Instruction;
use crate::rng::RandomSource;
use crate::value::Numeric;

#[derive(Clone, Copy, Debug)]
pub struct CrossoverParams {
    pub max_segment_length: usize,
    pub max_crossover_distance: usize,
    pub max_segment_length_difference: usize,
    pub min_len: usize,
    pub max_len: usize,
    /// Resample attempts before giving up on this pair.
    pub max_attempts: usize,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        Self {
            max_segment_length: 5,
            max_crossover_distance: 10,
            max_segment_length_difference: 3,
            min_len: 1,
            max_len: 256,
            max_attempts: 20,
        }
    }
}

/// Swap one segment between `p1` and `p2`, choosing parents' roles so the
/// shorter program is always treated as the reference length. Returns the
/// two new instruction lists on success. On repeated failure to find a
/// length-respecting cut, returns `OperatorFailure` — the caller should pass
/// the parents through unchanged, log the failure, and record it in that
/// generation's statistics.
pub fn linear_crossover<V: Numeric>(
    rng: &mut RandomSource,
    a: &[Instruction<V>],
    b: &[Instruction<V>],
    params: &CrossoverParams,
) -> Result<(Vec<Instruction<V>>, Vec<Instruction<V>>)> {
    let (shorter, longer, swapped) = if a.len() <= b.len() {
        (a, b, false)
    } else {
        (b, a, true)
    };

    for _ in 0..params.max_attempts {
        let i1 = rng.gen_range(0..shorter.len().max(1));
        let lo = i1.saturating_sub(params.max_crossover_distance);
        let hi = (i1 + params.max_crossover_distance).min(longer.len().saturating_sub(1));
        if lo > hi {
            continue;
        }
        let i2 = rng.gen_range(lo..=hi);

        let max_l1 = params.max_segment_length.min(shorter.len() - i1);
        let max_l2 = params.max_segment_length.min(longer.len() - i2);
        if max_l1 == 0 || max_l2 == 0 {
            continue;
        }
        let l1 = rng.gen_range(1..=max_l1);
        let l2_lo = l1;
        let l2_hi = max_l2.min(l1 + params.max_segment_length_difference);
        if l2_lo > l2_hi {
            continue;
        }
        let l2 = rng.gen_range(l2_lo..=l2_hi);

        let new_shorter_len = shorter.len() - l1 + l2;
        let new_longer_len = longer.len() - l2 + l1;
        if new_shorter_len < params.min_len
            || new_shorter_len > params.max_len
            || new_longer_len < params.min_len
            || new_longer_len > params.max_len
        {
            continue;
        }

        let mut child_short = shorter.to_vec();
        let mut child_long = longer.to_vec();
        child_short.splice(i1..i1 + l1, longer[i2..i2 + l2].to_vec());
        child_long.splice(i2..i2 + l2, shorter[i1..i1 + l1].to_vec());

        return Ok(if swapped {
            (child_long, child_short)
        } else {
            (child_short, child_long)
        });
    }

    Err(LgpError::OperatorFailure {
        operator: "linear_crossover",
        attempts: params.max_attempts,
        reason: "no cut point satisfied length/distance bounds".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::standard_set;
    use crate::rng::master_rng;

    fn instrs(n: usize) -> Vec<Instruction<f64>> {
        let set = standard_set::<f64>();
        let add = set.get("add").unwrap().clone();
        (0..n)
            .map(|i| Instruction::new(i % 2, add.clone(), vec![0, 1]))
            .collect()
    }

    #[test]
    fn children_respect_length_bounds() {
        let params = CrossoverParams {
            max_segment_length: 3,
            max_crossover_distance: 4,
            max_segment_length_difference: 2,
            min_len: 2,
            max_len: 12,
            max_attempts: 50,
        };
        let mut rng = master_rng(Some(11));
        let p1 = instrs(6);
        let p2 = instrs(8);
        let (c1, c2) = linear_crossover(&mut rng, &p1, &p2, &params).unwrap();
        assert!(c1.len() >= params.min_len && c1.len() <= params.max_len);
        assert!(c2.len() >= params.min_len && c2.len() <= params.max_len);
    }

    #[test]
    fn impossible_bounds_fail_cleanly() {
        let params = CrossoverParams {
            max_segment_length: 5,
            max_crossover_distance: 10,
            max_segment_length_difference: 5,
            min_len: 100,
            max_len: 100,
            max_attempts: 5,
        };
        let mut rng = master_rng(Some(2));
        let p1 = instrs(4);
        let p2 = instrs(5);
        assert!(linear_crossover(&mut rng, &p1, &p2, &params).is_err());
    }
}
