//! Concrete built-in operations.
//!
//! A flat, named table of arithmetic/bitwise/conditional/transcendental
//! operations the evolution core can select from by name, rather than the
//! core itself knowing what `sin` or `if_greater` mean.

use crate::operation::{Arity, Operation, OperationKind, OperationSet};
use crate::value::Numeric;

/// Division and bitwise ops are protected: a program that divides by zero or
/// shifts past the case set must not panic evaluation, so they fall back to
/// the default value instead.
pub fn standard_set<V: Numeric>() -> OperationSet<V> {
    let mut set = OperationSet::new();

    set.register(Operation::function("add", Arity::Binary, OperationKind::Arithmetic, "+", |a| {
        a[0] + a[1]
    }));
    set.register(Operation::function("sub", Arity::Binary, OperationKind::Arithmetic, "-", |a| {
        a[0] - a[1]
    }));
    set.register(Operation::function("mul", Arity::Binary, OperationKind::Arithmetic, "*", |a| {
        a[0] * a[1]
    }));
    set.register(Operation::function("div", Arity::Binary, OperationKind::Arithmetic, "/", |a| {
        if a[1].to_f64() == 0.0 {
            V::default()
        } else {
            a[0] / a[1]
        }
    }));

    set.register(Operation::function("and", Arity::Binary, OperationKind::Bitwise, "&", |a| {
        V::from_f64(((a[0].to_f64() as i64) & (a[1].to_f64() as i64)) as f64)
    }));
    set.register(Operation::function("or", Arity::Binary, OperationKind::Bitwise, "|", |a| {
        V::from_f64(((a[0].to_f64() as i64) | (a[1].to_f64() as i64)) as f64)
    }));
    set.register(Operation::function("xor", Arity::Binary, OperationKind::Bitwise, "^", |a| {
        V::from_f64(((a[0].to_f64() as i64) ^ (a[1].to_f64() as i64)) as f64)
    }));

    set.register(Operation::branch("if_greater", ">", |a: &[V]| {
        a[0].to_f64() > a[1].to_f64()
    }));
    set.register(Operation::branch("if_lte", "<=", |a: &[V]| {
        a[0].to_f64() <= a[1].to_f64()
    }));

    set.register(Operation::function(
        "sin",
        Arity::Unary,
        OperationKind::Transcendental,
        "sin",
        |a| V::from_f64(a[0].to_f64().sin()),
    ));

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_by_zero_yields_default_instead_of_panicking() {
        let set = standard_set::<f64>();
        let div = set.get("div").unwrap();
        assert_eq!(div.execute(&[4.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn branch_predicates_do_not_execute_as_functions() {
        let set = standard_set::<f64>();
        let gt = set.get("if_greater").unwrap();
        assert!(gt.evaluate_predicate(&[3.0, 1.0]).unwrap());
        assert!(gt.execute(&[3.0, 1.0]).is_err());
    }
}
