//! Linear Genetic Programming engine: program representation, evolutionary
//! operators, and the three evolution drivers (SteadyState, MasterSlave,
//! IslandMigration) built on top of them.

pub mod builtins;
pub mod config;
pub mod dataset;
pub mod error;
pub mod event;
pub mod fitness;
pub mod generator;
pub mod model;
pub mod mutation;
pub mod operation;
pub mod program;
pub mod recombination;
pub mod register;
pub mod rng;
pub mod selection;
pub mod trainer;
pub mod value;

pub use error::{LgpError, Result};
pub use program::Program;
pub use value::{Numeric, Outputs};
