//! Exact weighted partial MaxSAT engine.
//!
//! Branch-and-bound over a fixed variable order: unit propagation on the hard
//! clauses and assumptions fixes forced literals at every node, the running
//! weight of already-falsified soft roots is an admissible lower bound, and
//! subtrees whose bound reaches the incumbent cost are pruned. Branches try
//! `false` before `true` and the incumbent is replaced only on strict
//! improvement, so the solution returned is the lexicographically smallest
//! optimal assignment over the proposition ordering. Identical inputs always
//! yield identical output.
//!
//! The search is exhaustive and worst-case exponential. Structures above the
//! configured proposition or clause ceiling are rejected up front with
//! `TooLarge`; a step or wall-clock budget exhausted mid-search yields
//! `Timeout`, never a silently non-optimal cost.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cnf::{CompiledClauses, Lit, Var};
use crate::error::SolveError;

/// Budgets and ceilings for the branch-and-bound search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Tractable ceiling on proposition count. Exact search is exponential;
    /// inputs above this return `TooLarge` (an explicit non-goal, not a
    /// hidden limitation).
    pub max_propositions: usize,
    /// Ceiling on total (hard + soft) clause count.
    pub max_clauses: usize,
    /// Search-step budget (node visits); deterministic across runs.
    pub max_steps: u64,
    /// Wall-clock budget in milliseconds.
    pub max_millis: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_propositions: 22,
            max_clauses: 4096,
            max_steps: 5_000_000,
            max_millis: 10_000,
        }
    }
}

/// An optimal solve result: the minimum violated-soft weight and the
/// assignment achieving it.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Total weight of violated soft clauses.
    pub cost: f64,
    assignment: Vec<bool>,
    num_props: usize,
}

impl Solution {
    /// The assignment restricted to propositions, in declaration order.
    pub fn model(&self) -> &[bool] {
        &self.assignment[..self.num_props]
    }

    /// Truth value of a literal (proposition or auxiliary) in this solution.
    pub fn lit_true(&self, lit: Lit) -> bool {
        lit.eval(self.assignment[lit.var() as usize])
    }
}

/// Exact MaxSAT solver. Stateless between calls; solves are read-only over
/// the compiled clauses and safe to run concurrently.
#[derive(Debug, Clone, Default)]
pub struct MaxSatSolver {
    config: SolverConfig,
}

impl MaxSatSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find the minimum-cost assignment satisfying all hard clauses and
    /// `assumptions` (unit literals forced true).
    pub fn solve(
        &self,
        clauses: &CompiledClauses,
        assumptions: &[Lit],
    ) -> Result<Solution, SolveError> {
        let total_clauses = clauses.hard.len() + clauses.soft.len();
        if clauses.num_props > self.config.max_propositions
            || total_clauses > self.config.max_clauses
        {
            return Err(SolveError::TooLarge {
                propositions: clauses.num_props,
                clauses: total_clauses,
                max_propositions: self.config.max_propositions,
                max_clauses: self.config.max_clauses,
            });
        }

        let mut search = Search {
            clauses,
            config: &self.config,
            assign: vec![None; clauses.num_vars],
            trail: Vec::with_capacity(clauses.num_vars),
            steps: 0,
            started: Instant::now(),
            best: None,
        };

        for &lit in assumptions {
            if !search.set_lit(lit) {
                return Err(SolveError::Unsatisfiable);
            }
        }

        search.run()?;

        match search.best {
            Some((cost, assignment)) => Ok(Solution {
                cost,
                assignment,
                num_props: clauses.num_props,
            }),
            None => Err(SolveError::Unsatisfiable),
        }
    }
}

struct Search<'a> {
    clauses: &'a CompiledClauses,
    config: &'a SolverConfig,
    assign: Vec<Option<bool>>,
    trail: Vec<Var>,
    steps: u64,
    started: Instant,
    best: Option<(f64, Vec<bool>)>,
}

impl Search<'_> {
    /// Assign `lit` true. Returns false on conflict with an existing value.
    fn set_lit(&mut self, lit: Lit) -> bool {
        let var = lit.var() as usize;
        match self.assign[var] {
            Some(value) => lit.eval(value),
            None => {
                self.assign[var] = Some(lit.is_pos());
                self.trail.push(lit.var());
                true
            }
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let var = self.trail.pop().expect("trail underflow");
            self.assign[var as usize] = None;
        }
    }

    /// Unit propagation over hard clauses to fixpoint.
    /// Returns false if some hard clause is falsified.
    fn propagate(&mut self) -> bool {
        loop {
            let mut changed = false;
            for clause in &self.clauses.hard {
                let mut satisfied = false;
                let mut unassigned: Option<Lit> = None;
                let mut unassigned_count = 0;
                for &lit in clause {
                    match self.assign[lit.var() as usize] {
                        Some(value) if lit.eval(value) => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            unassigned = Some(lit);
                            unassigned_count += 1;
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match unassigned_count {
                    0 => return false,
                    1 => {
                        let lit = unassigned.expect("counted one unassigned literal");
                        self.set_lit(lit);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    /// Total weight of soft roots currently assigned false. Admissible:
    /// unassigned roots contribute nothing.
    fn violated_weight(&self) -> f64 {
        self.clauses
            .soft
            .iter()
            .filter(|sc| {
                matches!(self.assign[sc.lit.var() as usize], Some(value) if !sc.lit.eval(value))
            })
            .map(|sc| sc.weight)
            .sum()
    }

    fn next_unassigned(&self) -> Option<Var> {
        self.assign
            .iter()
            .position(Option::is_none)
            .map(|i| i as Var)
    }

    fn check_budget(&mut self) -> Result<(), SolveError> {
        self.steps += 1;
        let timed_out = self.steps > self.config.max_steps
            || (self.steps % 1024 == 0
                && self.started.elapsed().as_millis() as u64 > self.config.max_millis);
        if timed_out {
            Err(SolveError::Timeout {
                steps: self.steps,
                elapsed_ms: self.started.elapsed().as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }

    fn run(&mut self) -> Result<(), SolveError> {
        self.check_budget()?;

        let mark = self.trail.len();
        if !self.propagate() {
            self.undo_to(mark);
            return Ok(());
        }

        let bound = self.violated_weight();
        if let Some((best_cost, _)) = &self.best {
            if bound >= *best_cost {
                self.undo_to(mark);
                return Ok(());
            }
        }

        let Some(var) = self.next_unassigned() else {
            // Complete assignment; strict improvement keeps the first
            // (lexicographically smallest) optimum found.
            let improved = self.best.as_ref().is_none_or(|(best_cost, _)| bound < *best_cost);
            if improved {
                let model = self
                    .assign
                    .iter()
                    .map(|v| v.expect("complete assignment"))
                    .collect();
                self.best = Some((bound, model));
            }
            self.undo_to(mark);
            return Ok(());
        };

        for value in [false, true] {
            let branch_mark = self.trail.len();
            self.assign[var as usize] = Some(value);
            self.trail.push(var);
            let result = self.run();
            self.undo_to(branch_mark);
            result?;
        }

        self.undo_to(mark);
        Ok(())
    }
}
