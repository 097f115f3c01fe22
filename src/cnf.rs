//! Constraint compiler: expressions to clause-normal form.
//!
//! Every constraint (and every query formula) compiles to a set of *defining*
//! hard clauses plus a single root literal, via Tseytin gate encoding:
//!
//! - an atom's root is the proposition's own variable, no gate needed;
//! - `NOT e` roots at the negation of `e`'s root;
//! - each binary operator allocates one auxiliary variable `x` and emits the
//!   clauses of the biconditional `x ⟺ op(a, b)` (`a IMPLIES b` encodes as
//!   `¬a ∨ b`, `a IFF b` as both implications, per the usual rewriting).
//!
//! A hard constraint then asserts its root as a hard unit clause; a soft
//! constraint asserts it as a soft unit clause carrying the constraint's
//! weight, so violating the constraint costs its weight exactly once no matter
//! how many defining clauses it expanded into. Query formulas contribute only
//! their defining clauses; the root literal is handed back for use as a solver
//! assumption in either polarity (the gates encode full biconditionals, so
//! assuming `¬root` is sound).
//!
//! Variables are numbered propositions-first in declaration order, auxiliaries
//! after in allocation (DFS) order, which makes compilation deterministic and
//! clause-identical across runs.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::logic::expr::{self, Expr};
use crate::logic::LogicStructure;

/// A variable index. Variables `0..num_props` are propositions in declaration
/// order; the rest are Tseytin auxiliaries.
pub type Var = u32;

/// A signed literal over a [`Var`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    code: i32,
}

impl Lit {
    /// Positive literal of `var`.
    pub fn pos(var: Var) -> Self {
        Lit {
            code: var as i32 + 1,
        }
    }

    /// Negative literal of `var`.
    pub fn neg(var: Var) -> Self {
        Lit {
            code: -(var as i32 + 1),
        }
    }

    /// The underlying variable.
    pub fn var(self) -> Var {
        (self.code.unsigned_abs() - 1) as Var
    }

    /// Whether this is the positive polarity.
    pub fn is_pos(self) -> bool {
        self.code > 0
    }

    /// The opposite-polarity literal.
    pub fn negated(self) -> Self {
        Lit { code: -self.code }
    }

    /// Truth value of this literal under `value` for its variable.
    pub fn eval(self, value: bool) -> bool {
        value == self.is_pos()
    }
}

/// A disjunction of literals.
pub type Clause = Vec<Lit>;

/// A soft unit clause: the root literal of a soft constraint with its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftClause {
    pub lit: Lit,
    pub weight: f64,
    /// Id of the originating soft constraint.
    pub constraint_id: String,
}

/// The compiled form of a [`LogicStructure`]: hard clauses, weighted soft unit
/// clauses, and the proposition/variable correspondence.
#[derive(Debug, Clone, Default)]
pub struct CompiledClauses {
    /// Total variable count (propositions + auxiliaries).
    pub num_vars: usize,
    /// Number of proposition variables; these occupy indices `0..num_props`.
    pub num_props: usize,
    /// Proposition ids by variable index, declaration order.
    pub prop_ids: Vec<String>,
    pub hard: Vec<Clause>,
    pub soft: Vec<SoftClause>,
}

impl CompiledClauses {
    /// Variable index of a proposition id, if declared.
    pub fn var_of(&self, prop_id: &str) -> Option<Var> {
        self.prop_ids
            .iter()
            .position(|id| id == prop_id)
            .map(|i| i as Var)
    }

    /// Clone this compilation and extend it with a query formula's defining
    /// clauses. Returns the extended clause set and the formula's root
    /// literal, ready to be assumed in either polarity.
    pub fn extend_with_formula(&self, formula: &str) -> Result<(CompiledClauses, Lit), CompileError> {
        let mut extended = self.clone();
        let tree = parse_for(QUERY_ID, formula)?;
        let mut ctx = GateCtx {
            var_of: extended
                .prop_ids
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), i as Var))
                .collect(),
            next_var: extended.num_vars as Var,
            clauses: Vec::new(),
        };
        let root = ctx.encode(QUERY_ID, &tree)?;
        extended.num_vars = ctx.next_var as usize;
        extended.hard.extend(ctx.clauses);
        Ok((extended, root))
    }
}

/// Pseudo constraint id used in errors for query formulas.
const QUERY_ID: &str = "query";

fn parse_for(constraint_id: &str, src: &str) -> Result<Expr, CompileError> {
    expr::parse(src).map_err(|e| CompileError::Parse {
        constraint_id: constraint_id.to_string(),
        message: e.message,
        position: e.position,
    })
}

/// Tseytin encoding context: the atom table, the aux allocator, and the
/// defining clauses produced so far.
struct GateCtx {
    var_of: HashMap<String, Var>,
    next_var: Var,
    clauses: Vec<Clause>,
}

impl GateCtx {
    fn fresh(&mut self) -> Var {
        let v = self.next_var;
        self.next_var += 1;
        v
    }

    /// Encode `tree`, pushing defining clauses, and return its root literal.
    fn encode(&mut self, constraint_id: &str, tree: &Expr) -> Result<Lit, CompileError> {
        match tree {
            Expr::Atom(id) => match self.var_of.get(id) {
                Some(&v) => Ok(Lit::pos(v)),
                None => Err(CompileError::UndeclaredAtom {
                    constraint_id: constraint_id.to_string(),
                    atom: id.clone(),
                }),
            },
            Expr::Not(e) => Ok(self.encode(constraint_id, e)?.negated()),
            Expr::And(a, b) => {
                let a = self.encode(constraint_id, a)?;
                let b = self.encode(constraint_id, b)?;
                let x = Lit::pos(self.fresh());
                // x ⟺ a ∧ b
                self.clauses.push(vec![x.negated(), a]);
                self.clauses.push(vec![x.negated(), b]);
                self.clauses.push(vec![x, a.negated(), b.negated()]);
                Ok(x)
            }
            Expr::Or(a, b) => {
                let a = self.encode(constraint_id, a)?;
                let b = self.encode(constraint_id, b)?;
                let x = Lit::pos(self.fresh());
                // x ⟺ a ∨ b
                self.clauses.push(vec![x.negated(), a, b]);
                self.clauses.push(vec![x, a.negated()]);
                self.clauses.push(vec![x, b.negated()]);
                Ok(x)
            }
            Expr::Implies(a, b) => {
                let a = self.encode(constraint_id, a)?;
                let b = self.encode(constraint_id, b)?;
                let x = Lit::pos(self.fresh());
                // x ⟺ (¬a ∨ b)
                self.clauses.push(vec![x.negated(), a.negated(), b]);
                self.clauses.push(vec![x, a]);
                self.clauses.push(vec![x, b.negated()]);
                Ok(x)
            }
            Expr::Iff(a, b) => {
                let a = self.encode(constraint_id, a)?;
                let b = self.encode(constraint_id, b)?;
                let x = Lit::pos(self.fresh());
                // x ⟺ ((¬a ∨ b) ∧ (¬b ∨ a))
                self.clauses.push(vec![x.negated(), a.negated(), b]);
                self.clauses.push(vec![x.negated(), b.negated(), a]);
                self.clauses.push(vec![x, a, b]);
                self.clauses.push(vec![x, a.negated(), b.negated()]);
                Ok(x)
            }
        }
    }
}

/// Compile a structure's constraints into [`CompiledClauses`].
///
/// Pure and deterministic: the same structure always produces the identical
/// clause list. Fails on undeclared atoms, malformed expressions, and soft
/// constraints that have not been weighted yet.
pub fn compile(structure: &LogicStructure) -> Result<CompiledClauses, CompileError> {
    let prop_ids: Vec<String> = structure.propositions.iter().map(|p| p.id.clone()).collect();
    let mut ctx = GateCtx {
        var_of: prop_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i as Var))
            .collect(),
        next_var: prop_ids.len() as Var,
        clauses: Vec::new(),
    };

    let mut hard_roots = Vec::new();
    for c in &structure.hard_constraints {
        let tree = parse_for(&c.id, &c.expr)?;
        hard_roots.push(ctx.encode(&c.id, &tree)?);
    }

    let mut soft = Vec::new();
    for c in &structure.soft_constraints {
        let weight = c.weight.ok_or_else(|| CompileError::MissingWeight {
            constraint_id: c.id.clone(),
        })?;
        let tree = parse_for(&c.id, &c.expr)?;
        let root = ctx.encode(&c.id, &tree)?;
        soft.push(SoftClause {
            lit: root,
            weight,
            constraint_id: c.id.clone(),
        });
    }

    let mut hard = ctx.clauses;
    hard.extend(hard_roots.into_iter().map(|root| vec![root]));

    Ok(CompiledClauses {
        num_vars: ctx.next_var as usize,
        num_props: prop_ids.len(),
        prop_ids,
        hard,
        soft,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Constraint, LogicStructure, Proposition};

    fn prop(id: &str) -> Proposition {
        Proposition {
            id: id.into(),
            gloss: id.into(),
        }
    }

    fn hard(id: &str, expr: &str) -> Constraint {
        Constraint {
            id: id.into(),
            expr: expr.into(),
            gloss: String::new(),
            weight: None,
        }
    }

    fn soft(id: &str, expr: &str, weight: f64) -> Constraint {
        Constraint {
            id: id.into(),
            expr: expr.into(),
            gloss: String::new(),
            weight: Some(weight),
        }
    }

    #[test]
    fn lit_codes_round_trip() {
        let l = Lit::pos(3);
        assert_eq!(l.var(), 3);
        assert!(l.is_pos());
        assert_eq!(l.negated().var(), 3);
        assert!(!l.negated().is_pos());
        assert!(l.eval(true));
        assert!(!l.negated().eval(true));
    }

    #[test]
    fn atom_constraint_needs_no_aux() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![hard("h1", "a")],
            soft_constraints: vec![],
        };
        let compiled = compile(&s).unwrap();
        assert_eq!(compiled.num_vars, 1);
        assert_eq!(compiled.hard, vec![vec![Lit::pos(0)]]);
    }

    #[test]
    fn negated_atom_roots_at_negative_literal() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![hard("h1", "NOT a")],
            soft_constraints: vec![],
        };
        let compiled = compile(&s).unwrap();
        assert_eq!(compiled.hard, vec![vec![Lit::neg(0)]]);
    }

    #[test]
    fn disjunction_gets_one_gate() {
        let s = LogicStructure {
            propositions: vec![prop("a"), prop("b")],
            hard_constraints: vec![hard("h1", "a OR b")],
            soft_constraints: vec![],
        };
        let compiled = compile(&s).unwrap();
        assert_eq!(compiled.num_props, 2);
        assert_eq!(compiled.num_vars, 3);
        // Three gate clauses plus the root unit.
        assert_eq!(compiled.hard.len(), 4);
        assert_eq!(*compiled.hard.last().unwrap(), vec![Lit::pos(2)]);
    }

    #[test]
    fn soft_constraint_compiles_to_weighted_unit() {
        let s = LogicStructure {
            propositions: vec![prop("a"), prop("b")],
            hard_constraints: vec![],
            soft_constraints: vec![soft("s1", "a AND b", 2.5)],
        };
        let compiled = compile(&s).unwrap();
        assert_eq!(compiled.soft.len(), 1);
        let sc = &compiled.soft[0];
        assert_eq!(sc.weight, 2.5);
        assert_eq!(sc.constraint_id, "s1");
        // Root of the AND gate is the auxiliary variable.
        assert_eq!(sc.lit, Lit::pos(2));
        // The gate's defining clauses are hard; no hard unit asserts the root.
        assert_eq!(compiled.hard.len(), 3);
    }

    #[test]
    fn unweighted_soft_fails() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![],
            soft_constraints: vec![Constraint {
                id: "s1".into(),
                expr: "a".into(),
                gloss: String::new(),
                weight: None,
            }],
        };
        assert!(matches!(
            compile(&s),
            Err(CompileError::MissingWeight { .. })
        ));
    }

    #[test]
    fn undeclared_atom_fails_with_constraint_id() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![hard("h9", "a AND ghost")],
            soft_constraints: vec![],
        };
        match compile(&s) {
            Err(CompileError::UndeclaredAtom {
                constraint_id,
                atom,
            }) => {
                assert_eq!(constraint_id, "h9");
                assert_eq!(atom, "ghost");
            }
            other => panic!("expected UndeclaredAtom, got {other:?}"),
        }
    }

    #[test]
    fn malformed_expression_fails_with_position() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![hard("h1", "(a OR")],
            soft_constraints: vec![],
        };
        assert!(matches!(compile(&s), Err(CompileError::Parse { .. })));
    }

    #[test]
    fn compilation_is_idempotent() {
        let s = LogicStructure {
            propositions: vec![prop("a"), prop("b"), prop("c")],
            hard_constraints: vec![hard("h1", "(a IMPLIES b) IFF (NOT c OR a)")],
            soft_constraints: vec![soft("s1", "a OR (b AND c)", 1.5)],
        };
        let first = compile(&s).unwrap();
        let second = compile(&s).unwrap();
        assert_eq!(first.hard, second.hard);
        assert_eq!(first.soft, second.soft);
        assert_eq!(first.num_vars, second.num_vars);
    }

    #[test]
    fn extend_with_formula_allocates_past_existing_vars() {
        let s = LogicStructure {
            propositions: vec![prop("a"), prop("b")],
            hard_constraints: vec![hard("h1", "a OR b")],
            soft_constraints: vec![],
        };
        let compiled = compile(&s).unwrap();
        let (extended, root) = compiled.extend_with_formula("a AND b").unwrap();
        assert_eq!(extended.num_vars, compiled.num_vars + 1);
        assert_eq!(root.var() as usize, compiled.num_vars);
        // Base compilation is untouched.
        assert_eq!(compiled.num_vars, 3);
        // An atomic formula needs no new variables.
        let (same, atom_root) = compiled.extend_with_formula("b").unwrap();
        assert_eq!(same.num_vars, compiled.num_vars);
        assert_eq!(atom_root, Lit::pos(1));
    }

    #[test]
    fn extend_with_formula_rejects_undeclared() {
        let s = LogicStructure {
            propositions: vec![prop("a")],
            hard_constraints: vec![],
            soft_constraints: vec![],
        };
        let compiled = compile(&s).unwrap();
        match compiled.extend_with_formula("ghost") {
            Err(CompileError::UndeclaredAtom { constraint_id, .. }) => {
                assert_eq!(constraint_id, "query");
            }
            other => panic!("expected UndeclaredAtom, got {other:?}"),
        }
    }
}
