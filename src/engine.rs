//! Engine facade: top-level API for a grounded document.
//!
//! The `Engine` owns a weighted [`LogicStructure`] together with its compiled
//! clause form and the solver/query configuration, and answers queries
//! against it. The structure is compiled once at construction; the joint
//! satisfiability of its hard constraints is established lazily by the first
//! query (through the decision table), not checked up front.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cnf::{self, CompiledClauses};
use crate::error::{MaatResult, QueryError};
use crate::logic::LogicStructure;
use crate::query::{QueryAnswerer, QueryConfig, QueryResult};
use crate::solver::{MaxSatSolver, SolverConfig};
use crate::weights::WeightConfig;

/// Configuration for the maat engine.
///
/// Aggregates the per-subsystem configs; loadable from TOML so deployments
/// can pin budgets and retrieval parameters without code changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub solver: SolverConfig,
    pub query: QueryConfig,
    pub weights: WeightConfig,
}

impl EngineConfig {
    /// Parse a TOML configuration document. Missing sections and fields fall
    /// back to their defaults; unknown keys are rejected.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load a TOML configuration file.
    pub fn from_path(path: &Path) -> MaatResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| crate::error::StructureError::Io { source })?;
        Self::from_toml_str(&source).map_err(|e| {
            crate::error::StructureError::Serialization {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// A compiled, queryable grounded document.
pub struct Engine {
    config: EngineConfig,
    structure: LogicStructure,
    clauses: CompiledClauses,
}

impl Engine {
    /// Validate and compile `structure` for querying.
    ///
    /// Every soft constraint must already carry a weight; run
    /// [`crate::weights::WeightAssigner::assign_all`] first on a freshly
    /// extracted structure.
    pub fn new(structure: LogicStructure, config: EngineConfig) -> MaatResult<Self> {
        structure.validate()?;
        let clauses = cnf::compile(&structure)?;

        tracing::info!(
            propositions = structure.propositions.len(),
            hard = structure.hard_constraints.len(),
            soft = structure.soft_constraints.len(),
            variables = clauses.num_vars,
            clauses = clauses.hard.len() + clauses.soft.len(),
            "compiled logic structure"
        );

        Ok(Self {
            config,
            structure,
            clauses,
        })
    }

    /// Load a persisted weighted structure from a JSON file and compile it.
    pub fn load(path: &Path, config: EngineConfig) -> MaatResult<Self> {
        let structure = LogicStructure::load(path)?;
        Self::new(structure, config)
    }

    /// Answer a query formula (same grammar as constraint expressions).
    pub fn answer(&self, formula: &str) -> Result<QueryResult, QueryError> {
        let answerer = QueryAnswerer::new(
            &self.structure,
            &self.clauses,
            MaxSatSolver::new(self.config.solver.clone()),
            self.config.query.clone(),
        );
        answerer.answer(formula)
    }

    pub fn structure(&self) -> &LogicStructure {
        &self.structure
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clauses(&self) -> &CompiledClauses {
        &self.clauses
    }
}
