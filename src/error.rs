//! Rich diagnostic error types for the maat engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong.
//! The core never downgrades an error into a default or guessed answer: every
//! failure crosses the API boundary with its structured kind intact.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::ModelError;

/// Top-level error type for the maat engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MaatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Weight(#[from] WeightError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

// ---------------------------------------------------------------------------
// Structure errors
// ---------------------------------------------------------------------------

/// Errors in the logic data model: identifier clashes, invalid weights,
/// and persistence failures.
#[derive(Debug, Error, Diagnostic)]
pub enum StructureError {
    #[error("duplicate proposition id: {id}")]
    #[diagnostic(
        code(maat::structure::duplicate_proposition),
        help("Proposition ids must be unique within a structure. Rename one of the duplicates.")
    )]
    DuplicateProposition { id: String },

    #[error("duplicate constraint id: {id}")]
    #[diagnostic(
        code(maat::structure::duplicate_constraint),
        help("Constraint ids must be unique across both the hard and soft lists.")
    )]
    DuplicateConstraint { id: String },

    #[error("invalid proposition id: \"{id}\"")]
    #[diagnostic(
        code(maat::structure::invalid_id),
        help(
            "Proposition ids must start with a letter or underscore and contain \
             only letters, digits, and underscores, so they can appear as atoms \
             in constraint expressions."
        )
    )]
    InvalidId { id: String },

    #[error("invalid weight {weight} on constraint {constraint_id}")]
    #[diagnostic(
        code(maat::structure::invalid_weight),
        help("Soft-constraint weights must be finite and non-negative.")
    )]
    InvalidWeight { constraint_id: String, weight: f64 },

    #[error("hard constraint {constraint_id} carries a weight")]
    #[diagnostic(
        code(maat::structure::weighted_hard),
        help(
            "Only soft constraints are weighted. Move the constraint to the \
             soft list, or remove its weight."
        )
    )]
    WeightedHard { constraint_id: String },

    #[error("no soft constraint with id {id}")]
    #[diagnostic(
        code(maat::structure::unknown_constraint),
        help("Check the constraint id against the structure's soft_constraints list.")
    )]
    UnknownConstraint { id: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(maat::structure::serde),
        help(
            "The structure document is malformed or missing required fields. \
             The expected shape is {{propositions, hard_constraints, soft_constraints}}."
        )
    )]
    Serialization { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(maat::structure::io),
        help("Check that the file path exists and has correct permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Compile errors
// ---------------------------------------------------------------------------

/// Errors from constraint compilation to clause-normal form.
///
/// Every variant carries the id of the offending constraint; query formulas
/// compile under the pseudo-id `"query"`.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error("constraint {constraint_id} references undeclared proposition \"{atom}\"")]
    #[diagnostic(
        code(maat::compile::undeclared_atom),
        help(
            "Every atom in a constraint expression must name a declared \
             proposition. Declare the proposition, or fix the atom's spelling."
        )
    )]
    UndeclaredAtom { constraint_id: String, atom: String },

    #[error("constraint {constraint_id} failed to parse at position {position}: {message}")]
    #[diagnostic(
        code(maat::compile::parse),
        help(
            "Expressions use NOT/AND/OR/IMPLIES/IFF (or ~ & | -> <->) over \
             proposition ids, with parentheses for grouping. Check for \
             unbalanced parentheses and dangling operators."
        )
    )]
    Parse {
        constraint_id: String,
        message: String,
        position: usize,
    },

    #[error("soft constraint {constraint_id} has no weight")]
    #[diagnostic(
        code(maat::compile::missing_weight),
        help(
            "Weight assignment must run before a structure is compiled for \
             querying. Run WeightAssigner::assign_all on the structure first."
        )
    )]
    MissingWeight { constraint_id: String },
}

// ---------------------------------------------------------------------------
// Solve errors
// ---------------------------------------------------------------------------

/// Terminal outcomes of a MaxSAT solve that carry no model.
#[derive(Debug, Error, Diagnostic)]
pub enum SolveError {
    #[error("hard clauses and assumptions are unsatisfiable")]
    #[diagnostic(
        code(maat::solve::unsatisfiable),
        help(
            "No assignment satisfies the hard clauses together with the \
             assumptions. This is a definite answer, not a failure to search."
        )
    )]
    Unsatisfiable,

    #[error("solver budget exhausted after {steps} steps ({elapsed_ms} ms)")]
    #[diagnostic(
        code(maat::solve::timeout),
        help(
            "The branch-and-bound search did not prove an optimum within the \
             configured step or wall-clock budget. Raise SolverConfig::max_steps \
             or max_millis and retry; a partial result is never returned."
        )
    )]
    Timeout { steps: u64, elapsed_ms: u64 },

    #[error(
        "problem too large: {propositions} propositions / {clauses} clauses \
         (limits: {max_propositions} / {max_clauses})"
    )]
    #[diagnostic(
        code(maat::solve::too_large),
        help(
            "Exact search is exponential in the proposition count; the engine \
             refuses inputs above its tractable ceiling rather than silently \
             approximating. Split the structure, or raise the ceiling knowingly."
        )
    )]
    TooLarge {
        propositions: usize,
        clauses: usize,
        max_propositions: usize,
        max_clauses: usize,
    },
}

// ---------------------------------------------------------------------------
// Weight-assignment errors
// ---------------------------------------------------------------------------

/// Errors from retrieval-grounded weight assignment.
#[derive(Debug, Error, Diagnostic)]
pub enum WeightError {
    #[error("document produced zero chunks")]
    #[diagnostic(
        code(maat::weights::empty_document),
        help("The document text is empty. Weight assignment needs at least one chunk to retrieve from.")
    )]
    EmptyDocument,

    #[error("invalid chunking parameters: size {size}, overlap {overlap}")]
    #[diagnostic(
        code(maat::weights::invalid_chunking),
        help("Chunk size must be positive and strictly greater than the overlap.")
    )]
    InvalidChunking { size: usize, overlap: usize },

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    #[diagnostic(
        code(maat::weights::embedding_count),
        help("The embedding backend must return exactly one vector per input text, in order.")
    )]
    EmbeddingCount { expected: usize, actual: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

/// Errors from the two-solve query answering path.
#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("hard constraints are jointly unsatisfiable")]
    #[diagnostic(
        code(maat::query::unsat_hard),
        help(
            "Both solves failed: no assignment satisfies the hard constraints \
             regardless of the query formula. The structure itself is \
             inconsistent; review its hard constraints. This error is fatal \
             and is never retried."
        )
    )]
    UnsatisfiableHardConstraints,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Solve(#[from] SolveError),
}

/// Convenience alias for functions returning maat results.
pub type MaatResult<T> = std::result::Result<T, MaatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_converts_to_maat_error() {
        let err = CompileError::UndeclaredAtom {
            constraint_id: "h1".into(),
            atom: "ghost".into(),
        };
        let maat: MaatError = err.into();
        assert!(matches!(
            maat,
            MaatError::Compile(CompileError::UndeclaredAtom { .. })
        ));
    }

    #[test]
    fn solve_error_display_is_descriptive() {
        let err = SolveError::TooLarge {
            propositions: 40,
            clauses: 100,
            max_propositions: 22,
            max_clauses: 4096,
        };
        let msg = format!("{err}");
        assert!(msg.contains("40"));
        assert!(msg.contains("22"));
    }

    #[test]
    fn weight_error_wraps_model_error() {
        let model_err = ModelError::Timeout { timeout_secs: 30 };
        let weight_err: WeightError = model_err.into();
        assert!(matches!(
            weight_err,
            WeightError::Model(ModelError::Timeout { .. })
        ));
    }

    #[test]
    fn query_error_wraps_solve_timeout() {
        let err = SolveError::Timeout {
            steps: 1000,
            elapsed_ms: 50,
        };
        let query: QueryError = err.into();
        assert!(matches!(query, QueryError::Solve(SolveError::Timeout { .. })));
    }
}
