//! Optimization-based query answering.
//!
//! A query formula is compiled with the same grammar as the constraints and
//! pinned true and false in two independent MaxSAT solves (run concurrently).
//! The costs of the two optima decide the answer: if forcing the formula
//! false is more expensive than forcing it true, the document's constraint
//! set favors the formula, and the cost gap sets the confidence. Soft
//! constraints whose satisfaction differs between the two optimal models form
//! the evidentiary trace reported in the explanation.
//!
//! Solver budget and size failures (`Timeout`, `TooLarge`) propagate verbatim;
//! an error is never converted into an answer.

use serde::{Deserialize, Serialize};

use crate::cnf::CompiledClauses;
use crate::error::{QueryError, SolveError};
use crate::logic::LogicStructure;
use crate::solver::{MaxSatSolver, Solution};

/// Tuning for the gap-to-confidence mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Scale of the saturating sigmoid mapping the cost gap to confidence.
    /// Larger values mean a given gap yields a more cautious confidence.
    pub gap_scale: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { gap_scale: 1.0 }
    }
}

/// The verdict of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    Uncertain,
    /// Terminal failure, for callers serializing a [`QueryResult`] built via
    /// [`QueryResult::from_error`]. The engine API itself reports failures as
    /// structured errors, never as this variant.
    Error,
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Yes => write!(f, "Yes"),
            Answer::No => write!(f, "No"),
            Answer::Uncertain => write!(f, "Uncertain"),
            Answer::Error => write!(f, "Error"),
        }
    }
}

/// Answer, confidence, and the evidence behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: Answer,
    /// In `[0, 1]`; 0.5 means the constraint set is indifferent.
    pub confidence: f64,
    pub explanation: String,
    /// The compiled formula, echoed for display.
    pub formula: String,
}

impl QueryResult {
    /// Render a terminal error as a serializable result, preserving the
    /// diagnostic text. For callers that must persist an outcome per query;
    /// the structured error itself remains the API's source of truth.
    pub fn from_error(err: &QueryError, formula: &str) -> Self {
        Self {
            answer: Answer::Error,
            confidence: 0.0,
            explanation: err.to_string(),
            formula: formula.to_string(),
        }
    }
}

/// Answers queries against one compiled structure.
///
/// Read-only over the structure and its clauses; safe to share across
/// concurrent queries.
pub struct QueryAnswerer<'a> {
    structure: &'a LogicStructure,
    clauses: &'a CompiledClauses,
    solver: MaxSatSolver,
    config: QueryConfig,
}

impl<'a> QueryAnswerer<'a> {
    pub fn new(
        structure: &'a LogicStructure,
        clauses: &'a CompiledClauses,
        solver: MaxSatSolver,
        config: QueryConfig,
    ) -> Self {
        Self {
            structure,
            clauses,
            solver,
            config,
        }
    }

    /// Answer `formula` against the structure.
    ///
    /// The joint satisfiability of the hard constraints is established here,
    /// on first use: if both pinned solves are unsatisfiable the structure
    /// itself is inconsistent and
    /// [`QueryError::UnsatisfiableHardConstraints`] is returned.
    pub fn answer(&self, formula: &str) -> Result<QueryResult, QueryError> {
        let (extended, root) = self.clauses.extend_with_formula(formula)?;

        let (res_true, res_false) = rayon::join(
            || self.solver.solve(&extended, &[root]),
            || self.solver.solve(&extended, &[root.negated()]),
        );
        let sol_true = admit(res_true)?;
        let sol_false = admit(res_false)?;

        let result = match (sol_true, sol_false) {
            (None, None) => return Err(QueryError::UnsatisfiableHardConstraints),
            (Some(sol_true), None) => QueryResult {
                answer: Answer::Yes,
                confidence: 1.0,
                explanation: format!(
                    "The hard constraints entail the formula: no assignment \
                     satisfies them with the formula false. The optimal model \
                     with the formula true violates soft constraints costing \
                     {:.3}.",
                    sol_true.cost
                ),
                formula: formula.to_string(),
            },
            (None, Some(sol_false)) => QueryResult {
                answer: Answer::No,
                confidence: 1.0,
                explanation: format!(
                    "The hard constraints refute the formula: no assignment \
                     satisfies them with the formula true. The optimal model \
                     with the formula false violates soft constraints costing \
                     {:.3}.",
                    sol_false.cost
                ),
                formula: formula.to_string(),
            },
            (Some(sol_true), Some(sol_false)) => {
                let gap = sol_false.cost - sol_true.cost;
                let explanation = self.explain(&sol_true, &sol_false, gap);
                let (answer, confidence) = if gap > 0.0 {
                    (Answer::Yes, self.gap_confidence(gap))
                } else if gap < 0.0 {
                    (Answer::No, self.gap_confidence(-gap))
                } else {
                    (Answer::Uncertain, 0.5)
                };
                QueryResult {
                    answer,
                    confidence,
                    explanation,
                    formula: formula.to_string(),
                }
            }
        };

        tracing::debug!(
            formula,
            answer = %result.answer,
            confidence = result.confidence,
            "query answered"
        );
        Ok(result)
    }

    /// Saturating sigmoid of the (positive) cost gap into `(0.5, 1.0]`.
    fn gap_confidence(&self, gap: f64) -> f64 {
        1.0 / (1.0 + (-gap / self.config.gap_scale).exp())
    }

    /// The evidentiary trace: soft constraints whose satisfaction differs
    /// between the two optimal models, heaviest first.
    fn explain(&self, sol_true: &Solution, sol_false: &Solution, gap: f64) -> String {
        let mut differing: Vec<(&str, f64, bool)> = self
            .clauses
            .soft
            .iter()
            .filter_map(|sc| {
                let in_true = sol_true.lit_true(sc.lit);
                let in_false = sol_false.lit_true(sc.lit);
                (in_true != in_false).then_some((sc.constraint_id.as_str(), sc.weight, in_true))
            })
            .collect();
        // Stable: equal weights keep declaration order.
        differing.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut lines = vec![format!(
            "Optimal violation cost {:.3} with the formula true vs {:.3} with it false (gap {:.3}).",
            sol_true.cost, sol_false.cost, gap
        )];
        if differing.is_empty() {
            lines.push(
                "Both optima satisfy exactly the same soft constraints.".to_string(),
            );
        } else {
            lines.push("Soft constraints deciding the outcome, by weight:".to_string());
            for (id, weight, in_true) in differing {
                let statement = self
                    .structure
                    .soft_constraints
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| if c.gloss.is_empty() { c.expr.as_str() } else { c.gloss.as_str() })
                    .unwrap_or(id);
                let direction = if in_true {
                    "holds when the formula is true, violated when false"
                } else {
                    "violated when the formula is true, holds when false"
                };
                lines.push(format!("- [{weight:.3}] {statement} ({id}): {direction}"));
            }
        }
        lines.join("\n")
    }
}

/// Admit `Unsatisfiable` as an infinite-cost outcome (`None`); let every
/// other failure propagate with its kind intact.
fn admit(result: Result<Solution, SolveError>) -> Result<Option<Solution>, QueryError> {
    match result {
        Ok(solution) => Ok(Some(solution)),
        Err(SolveError::Unsatisfiable) => Ok(None),
        Err(e) => Err(QueryError::Solve(e)),
    }
}
