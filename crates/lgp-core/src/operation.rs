//! Operation & Instruction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{LgpError, Result};
use crate::value::Numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    Binary,
}

impl Arity {
    pub fn count(self) -> usize {
        match self {
            Arity::Unary => 1,
            Arity::Binary => 2,
        }
    }
}

/// Tag distinguishing the kinds of built-in operation, used to pick branch
/// candidates and to categorize operations without a deep class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Arithmetic,
    Bitwise,
    Conditional,
    Transcendental,
}

type ComputeFn<V> = Arc<dyn Fn(&[V]) -> V + Send + Sync>;
type PredicateFn<V> = Arc<dyn Fn(&[V]) -> bool + Send + Sync>;

/// The evaluation behavior of an operation. Conditional operations never
/// produce a register value; they produce a predicate consulted directly by
/// `Program::execute`'s branch contract.
#[derive(Clone)]
enum Eval<V> {
    Function(ComputeFn<V>),
    Predicate(PredicateFn<V>),
}

/// An immutable function object: arity, a pure function, a representation
/// string, and a textual renderer. Operations are shared and read-only
/// across the whole population.
#[derive(Clone)]
pub struct Operation<V> {
    pub name: String,
    pub arity: Arity,
    pub kind: OperationKind,
    pub repr: &'static str,
    eval: Eval<V>,
}

impl<V: Numeric> Operation<V> {
    pub fn function(
        name: impl Into<String>,
        arity: Arity,
        kind: OperationKind,
        repr: &'static str,
        f: impl Fn(&[V]) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            kind,
            repr,
            eval: Eval::Function(Arc::new(f)),
        }
    }

    pub fn branch(
        name: impl Into<String>,
        repr: &'static str,
        predicate: impl Fn(&[V]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity: Arity::Binary,
            kind: OperationKind::Conditional,
            repr,
            eval: Eval::Predicate(Arc::new(predicate)),
        }
    }

    pub fn is_branch(&self) -> bool {
        self.kind == OperationKind::Conditional
    }

    /// Apply the operation's function. Fails with `ArityError` if `args` does
    /// not match the declared arity, or if called on a branch operation
    /// (branches are dispatched through `evaluate_predicate`, never
    /// `execute`).
    pub fn execute(&self, args: &[V]) -> Result<V> {
        self.check_arity(args)?;
        match &self.eval {
            Eval::Function(f) => Ok(f(args)),
            Eval::Predicate(_) => Err(LgpError::Evaluation(format!(
                "operation {} is a branch predicate, not a value function",
                self.name
            ))),
        }
    }

    pub fn evaluate_predicate(&self, args: &[V]) -> Result<bool> {
        self.check_arity(args)?;
        match &self.eval {
            Eval::Predicate(p) => Ok(p(args)),
            Eval::Function(_) => Err(LgpError::Evaluation(format!(
                "operation {} is not a branch",
                self.name
            ))),
        }
    }

    fn check_arity(&self, args: &[V]) -> Result<()> {
        if args.len() != self.arity.count() {
            return Err(LgpError::Arity {
                op: self.name.clone(),
                expected: self.arity.count(),
                actual: args.len(),
            });
        }
        Ok(())
    }
}

impl<V> fmt::Debug for Operation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Immutable, name-indexed registry of operations, built once at
/// configuration time rather than through a dynamic module-registry/class
/// loader.
#[derive(Clone, Debug, Default)]
pub struct OperationSet<V> {
    by_name: HashMap<String, Arc<Operation<V>>>,
    ordered: Vec<Arc<Operation<V>>>,
}

impl<V: Numeric> OperationSet<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, op: Operation<V>) {
        let op = Arc::new(op);
        self.by_name.insert(op.name.clone(), op.clone());
        self.ordered.push(op);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Operation<V>>> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn all(&self) -> &[Arc<Operation<V>>] {
        &self.ordered
    }

    pub fn branches(&self) -> impl Iterator<Item = &Arc<Operation<V>>> {
        self.ordered.iter().filter(|op| op.is_branch())
    }

    /// Build a set containing only the named operations, in configuration
    /// order. Fails fast with `ConfigurationError` on an unknown name.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut out = Self::new();
        for name in names {
            let op = self.get(name).ok_or_else(|| {
                LgpError::Configuration(format!("unknown operation: {name}"))
            })?;
            out.by_name.insert(name.clone(), op.clone());
            out.ordered.push(op.clone());
        }
        Ok(out)
    }
}

/// `(destination, opcode, operands)`. `destination` always refers to a
/// Calculation register; `operands.len() == opcode.arity.count()`.
#[derive(Clone)]
pub struct Instruction<V> {
    pub destination: usize,
    pub opcode: Arc<Operation<V>>,
    pub operands: Vec<usize>,
}

impl<V: Numeric> Instruction<V> {
    pub fn new(destination: usize, opcode: Arc<Operation<V>>, operands: Vec<usize>) -> Self {
        debug_assert_eq!(operands.len(), opcode.arity.count());
        Self {
            destination,
            opcode,
            operands,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.opcode.is_branch()
    }

    pub fn render(&self) -> String {
        let ops: Vec<String> = self.operands.iter().map(|i| format!("r[{i}]")).collect();
        if self.is_branch() {
            format!("if ({})", ops.join(&format!(" {} ", self.opcode.repr)))
        } else {
            format!(
                "r[{}] = {}",
                self.destination,
                match self.opcode.arity {
                    Arity::Unary => format!("{}({})", self.opcode.repr, ops[0]),
                    Arity::Binary => format!("{} {} {}", ops[0], self.opcode.repr, ops[1]),
                }
            )
        }
    }
}

impl<V> fmt::Debug for Instruction<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("destination", &self.destination)
            .field("opcode", &self.opcode.name)
            .field("operands", &self.operands)
            .finish()
    }
}
