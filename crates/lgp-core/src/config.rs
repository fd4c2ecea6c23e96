//! Run configuration: deserialized from YAML or JSON, validated fail-fast
//! before any randomness is drawn or any registry is built.

use std::path::Path;

use serde::Deserialize;

use crate::error::{LgpError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterLayout {
    pub n_calculation: usize,
    pub n_input: usize,
    pub constants: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramShape {
    pub min_len: usize,
    pub max_len: usize,
    pub initial_min_len: usize,
    pub initial_max_len: usize,
    pub output_register_indices: Vec<usize>,
    #[serde(default = "default_max_rejections")]
    pub max_rejections: usize,
}

fn default_max_rejections() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRates {
    #[serde(default = "default_constants_rate")]
    pub constants_rate: f64,
    #[serde(default = "default_branch_rate")]
    pub branch_initialization_rate: f64,
}

fn default_constants_rate() -> f64 {
    0.25
}
fn default_branch_rate() -> f64 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    pub tournament_size: usize,
    #[serde(default)]
    pub population_size: usize,
    /// Children produced per generation before replacement. SteadyState and
    /// MasterSlave read this directly; IslandMigration applies it per island.
    #[serde(default = "default_offspring")]
    pub offspring_per_generation: usize,
}

fn default_offspring() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrossoverConfig {
    pub max_segment_length: usize,
    pub max_crossover_distance: usize,
    pub max_segment_length_difference: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_crossover_rate")]
    pub rate: f64,
}

fn default_max_attempts() -> usize {
    20
}
fn default_crossover_rate() -> f64 {
    0.7
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationConfig {
    #[serde(default = "default_macro_rate")]
    pub macro_rate: f64,
    #[serde(default = "default_micro_rate")]
    pub micro_rate: f64,
    #[serde(default = "default_insertion_rate")]
    pub insertion_rate: f64,
    #[serde(default = "default_register_rate")]
    pub register_rate: f64,
    #[serde(default = "default_operator_rate")]
    pub operator_rate: f64,
    #[serde(default = "default_constant_rate")]
    pub constant_rate: f64,
    #[serde(default = "default_constant_noise_std")]
    pub constant_noise_std: f64,
}

fn default_macro_rate() -> f64 {
    0.3
}
fn default_micro_rate() -> f64 {
    0.5
}
fn default_insertion_rate() -> f64 {
    0.5
}
fn default_register_rate() -> f64 {
    1.0
}
fn default_operator_rate() -> f64 {
    1.0
}
fn default_constant_rate() -> f64 {
    1.0
}
fn default_constant_noise_std() -> f64 {
    0.1
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    SteadyState,
    MasterSlave,
    IslandMigration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IslandConfig {
    #[serde(default = "default_island_count")]
    pub islands: usize,
    #[serde(default = "default_migration_interval")]
    pub migration_interval: usize,
    #[serde(default = "default_migration_count")]
    pub migration_count: usize,
}

fn default_island_count() -> usize {
    4
}
fn default_migration_interval() -> usize {
    10
}
fn default_migration_count() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub seed: Option<u64>,
    pub operations: Vec<String>,
    pub registers: RegisterLayout,
    pub program: ProgramShape,
    #[serde(default)]
    pub generation: GenerationRates,
    pub selection: SelectionConfig,
    pub crossover: CrossoverConfig,
    pub mutation: MutationConfig,
    pub generations: usize,
    pub driver: DriverKind,
    #[serde(default)]
    pub islands: IslandConfig,
    pub dataset_path: String,
    pub target_columns: usize,
    pub runs: usize,
    /// Stop a run early once the population's best fitness falls at or
    /// below this value.
    #[serde(default = "default_stopping_criterion")]
    pub stopping_criterion: f64,
}

fn default_stopping_criterion() -> f64 {
    0.0
}

impl Default for GenerationRates {
    fn default() -> Self {
        Self {
            constants_rate: default_constants_rate(),
            branch_initialization_rate: default_branch_rate(),
        }
    }
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            islands: default_island_count(),
            migration_interval: default_migration_interval(),
            migration_count: default_migration_count(),
        }
    }
}

impl Configuration {
    /// Parse a YAML or JSON file based on its extension. Any other extension
    /// is a fatal `Configuration` error.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LgpError::Configuration(format!("failed to read {}: {e}", path.display())))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
                .map_err(|e| LgpError::Configuration(format!("invalid YAML config: {e}")))?,
            Some("json") => serde_json::from_str(&raw)
                .map_err(|e| LgpError::Configuration(format!("invalid JSON config: {e}")))?,
            other => {
                return Err(LgpError::Configuration(format!(
                    "unsupported config extension: {other:?} (expected .yaml, .yml, or .json)"
                )))
            }
        };
        let config: Configuration = config;
        config.validate()?;
        Ok(config)
    }

    /// Every invariant that must hold before a single random number is
    /// drawn. Configuration errors are fatal and fail fast.
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(LgpError::Configuration("operations list must not be empty".into()));
        }
        if self.registers.n_calculation == 0 {
            return Err(LgpError::Configuration(
                "n_calculation must be at least 1".into(),
            ));
        }
        if self.program.min_len == 0 {
            return Err(LgpError::Configuration("program.min_len must be at least 1".into()));
        }
        if self.program.min_len > self.program.max_len {
            return Err(LgpError::Configuration(
                "program.min_len must not exceed program.max_len".into(),
            ));
        }
        if self.program.initial_min_len > self.program.initial_max_len
            || self.program.initial_min_len < self.program.min_len
            || self.program.initial_max_len > self.program.max_len
        {
            return Err(LgpError::Configuration(
                "program.initial_min_len/initial_max_len must fall within [min_len, max_len]".into(),
            ));
        }
        if self.program.output_register_indices.is_empty() {
            return Err(LgpError::Configuration(
                "program.output_register_indices must not be empty".into(),
            ));
        }
        for &idx in &self.program.output_register_indices {
            if idx >= self.registers.n_calculation {
                return Err(LgpError::Configuration(format!(
                    "output register index {idx} is outside the Calculation range [0, {})",
                    self.registers.n_calculation
                )));
            }
        }
        if self.selection.tournament_size == 0 {
            return Err(LgpError::Configuration(
                "selection.tournament_size must be at least 1".into(),
            ));
        }
        if self.selection.population_size < self.selection.tournament_size {
            return Err(LgpError::Configuration(
                "selection.population_size must be at least tournament_size".into(),
            ));
        }
        if self.selection.offspring_per_generation == 0 {
            return Err(LgpError::Configuration(
                "selection.offspring_per_generation must be at least 1".into(),
            ));
        }
        if self.stopping_criterion < 0.0 {
            return Err(LgpError::Configuration(
                "stopping_criterion must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover.rate) {
            return Err(LgpError::Configuration("crossover.rate must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation.macro_rate)
            || !(0.0..=1.0).contains(&self.mutation.micro_rate)
        {
            return Err(LgpError::Configuration(
                "mutation.macro_rate and micro_rate must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.constants_rate) {
            return Err(LgpError::Configuration(
                "generation.constants_rate must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.branch_initialization_rate) {
            return Err(LgpError::Configuration(
                "generation.branch_initialization_rate must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation.register_rate)
            || !(0.0..=1.0).contains(&self.mutation.operator_rate)
            || !(0.0..=1.0).contains(&self.mutation.constant_rate)
        {
            return Err(LgpError::Configuration(
                "mutation.register_rate, operator_rate, and constant_rate must be in [0, 1]".into(),
            ));
        }
        if self.generations == 0 {
            return Err(LgpError::Configuration("generations must be at least 1".into()));
        }
        if self.runs == 0 {
            return Err(LgpError::Configuration("runs must be at least 1".into()));
        }
        if self.driver == DriverKind::IslandMigration {
            if self.islands.islands < 2 {
                return Err(LgpError::Configuration(
                    "islands.islands must be at least 2 for the IslandMigration driver".into(),
                ));
            }
            if self.islands.migration_interval == 0 {
                return Err(LgpError::Configuration(
                    "islands.migration_interval must be at least 1 (0 never advances the driver's generation count)".into(),
                ));
            }
            let per_island = self.selection.population_size / self.islands.islands;
            if self.islands.migration_count > per_island {
                return Err(LgpError::Configuration(format!(
                    "islands.migration_count ({}) must not exceed the per-island population size ({per_island})",
                    self.islands.migration_count
                )));
            }
        }
        if self.target_columns == 0 {
            return Err(LgpError::Configuration("target_columns must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Configuration {
        Configuration {
            seed: Some(1),
            operations: vec!["add".into(), "sub".into()],
            registers: RegisterLayout {
                n_calculation: 4,
                n_input: 2,
                constants: vec![1.0],
            },
            program: ProgramShape {
                min_len: 1,
                max_len: 64,
                initial_min_len: 1,
                initial_max_len: 10,
                output_register_indices: vec![0],
                max_rejections: 20,
            },
            generation: GenerationRates::default(),
            selection: SelectionConfig {
                tournament_size: 4,
                population_size: 100,
                offspring_per_generation: 2,
            },
            crossover: CrossoverConfig {
                max_segment_length: 5,
                max_crossover_distance: 10,
                max_segment_length_difference: 3,
                max_attempts: 20,
                rate: 0.7,
            },
            mutation: MutationConfig {
                macro_rate: 0.3,
                micro_rate: 0.5,
                insertion_rate: 0.5,
                register_rate: 1.0,
                operator_rate: 1.0,
                constant_rate: 1.0,
                constant_noise_std: 0.1,
            },
            generations: 50,
            driver: DriverKind::SteadyState,
            islands: IslandConfig::default(),
            dataset_path: "data.csv".into(),
            target_columns: 1,
            runs: 1,
            stopping_criterion: 1e-9,
        }
    }

    #[test]
    fn valid_configuration_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn output_register_outside_calculation_range_is_rejected() {
        let mut config = valid_config();
        config.program.output_register_indices = vec![99];
        assert!(config.validate().is_err());
    }

    #[test]
    fn island_driver_requires_at_least_two_islands() {
        let mut config = valid_config();
        config.driver = DriverKind::IslandMigration;
        config.islands.islands = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn population_smaller_than_tournament_is_rejected() {
        let mut config = valid_config();
        config.selection.population_size = 2;
        config.selection.tournament_size = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn island_driver_rejects_zero_migration_interval() {
        let mut config = valid_config();
        config.driver = DriverKind::IslandMigration;
        config.islands.islands = 4;
        config.islands.migration_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn island_driver_rejects_migration_count_exceeding_per_island_population() {
        let mut config = valid_config();
        config.driver = DriverKind::IslandMigration;
        config.islands.islands = 4;
        config.selection.population_size = 8;
        config.islands.migration_count = 3; // per-island population is 2
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_generation_and_mutation_field_rates_are_rejected() {
        let mut config = valid_config();
        config.generation.constants_rate = 5.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.generation.branch_initialization_rate = -0.1;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.mutation.register_rate = -1.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.mutation.operator_rate = 2.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.mutation.constant_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
