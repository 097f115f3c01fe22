//! Weighted propositional logic data model.
//!
//! A [`LogicStructure`] is the persistent aggregate this crate reasons over:
//! an ordered, id-unique set of [`Proposition`]s plus hard and soft
//! [`Constraint`] lists. The extraction collaborator produces it unweighted;
//! weight assignment attaches a weight to each soft constraint exactly once;
//! from then on the structure is read-only and every query compiles it afresh.
//!
//! Persistence is field-ordered JSON (propositions, hard_constraints,
//! soft_constraints) with the round-trip law `from_json(to_json(s)) == s`.

pub mod expr;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StructureError;

/// A named atomic statement with its natural-language reading.
///
/// Immutable after creation; owned by the enclosing [`LogicStructure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proposition {
    /// Unique id, usable as an atom in constraint expressions.
    pub id: String,
    /// Natural-language gloss of the proposition.
    pub gloss: String,
}

/// A rule over propositions, hard or soft depending on which list holds it.
///
/// `expr` is the source string in the NOT/AND/OR/IMPLIES/IFF grammar over
/// proposition ids. `weight` is absent until weight assignment runs and is
/// only ever present on soft constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraint {
    pub id: String,
    pub expr: String,
    /// Natural-language statement of the rule, used as the retrieval query
    /// during weight assignment. Synthesized from proposition glosses when the
    /// extraction collaborator omits it.
    #[serde(default)]
    pub gloss: String,
    /// Violation cost. `None` until assigned; `Some(w)` with `w` finite, ≥ 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// The aggregate: propositions plus hard and soft constraint lists.
///
/// Field order here is the persisted field order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicStructure {
    pub propositions: Vec<Proposition>,
    pub hard_constraints: Vec<Constraint>,
    pub soft_constraints: Vec<Constraint>,
}

fn valid_atom_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl LogicStructure {
    /// Build a structure from the extraction collaborator's JSON document:
    /// `{propositions: [{id, gloss}], hard_constraints: [{id, expr}],
    /// soft_constraints: [{id, expr}]}`.
    ///
    /// The document is validated strictly: unknown fields, duplicate ids,
    /// invalid atom ids, and pre-set weights on hard constraints are all
    /// rejected rather than silently repaired. Missing constraint glosses are
    /// synthesized from the proposition glosses.
    pub fn from_extraction_json(json: &str) -> Result<Self, StructureError> {
        let mut structure: LogicStructure =
            serde_json::from_str(json).map_err(|e| StructureError::Serialization {
                message: e.to_string(),
            })?;
        structure.validate()?;
        structure.fill_glosses();
        Ok(structure)
    }

    /// Validate id uniqueness, atom-id shape, and weight invariants.
    pub fn validate(&self) -> Result<(), StructureError> {
        let mut prop_ids = HashSet::new();
        for p in &self.propositions {
            if !valid_atom_id(&p.id) {
                return Err(StructureError::InvalidId { id: p.id.clone() });
            }
            if !prop_ids.insert(p.id.as_str()) {
                return Err(StructureError::DuplicateProposition { id: p.id.clone() });
            }
        }

        let mut constraint_ids = HashSet::new();
        for c in self.hard_constraints.iter().chain(&self.soft_constraints) {
            if !constraint_ids.insert(c.id.as_str()) {
                return Err(StructureError::DuplicateConstraint { id: c.id.clone() });
            }
        }

        for c in &self.hard_constraints {
            if c.weight.is_some() {
                return Err(StructureError::WeightedHard {
                    constraint_id: c.id.clone(),
                });
            }
        }
        for c in &self.soft_constraints {
            if let Some(w) = c.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(StructureError::InvalidWeight {
                        constraint_id: c.id.clone(),
                        weight: w,
                    });
                }
            }
        }
        Ok(())
    }

    /// Synthesize missing constraint glosses by rendering the expression with
    /// proposition glosses substituted for atoms. Leaves present glosses alone.
    pub fn fill_glosses(&mut self) {
        fn render(tree: &expr::Expr, props: &[Proposition]) -> String {
            match tree {
                expr::Expr::Atom(id) => props
                    .iter()
                    .find(|p| &p.id == id)
                    .map(|p| p.gloss.clone())
                    .unwrap_or_else(|| id.clone()),
                expr::Expr::Not(e) => format!("not ({})", render(e, props)),
                expr::Expr::And(a, b) => {
                    format!("({}) and ({})", render(a, props), render(b, props))
                }
                expr::Expr::Or(a, b) => {
                    format!("({}) or ({})", render(a, props), render(b, props))
                }
                expr::Expr::Implies(a, b) => {
                    format!("if ({}) then ({})", render(a, props), render(b, props))
                }
                expr::Expr::Iff(a, b) => {
                    format!("({}) exactly when ({})", render(a, props), render(b, props))
                }
            }
        }

        let props = self.propositions.clone();
        for c in self
            .hard_constraints
            .iter_mut()
            .chain(self.soft_constraints.iter_mut())
        {
            if c.gloss.is_empty() {
                c.gloss = match expr::parse(&c.expr) {
                    Ok(tree) => render(&tree, &props),
                    // Unparseable expressions surface at compile; keep the raw
                    // string as the retrieval query in the meantime.
                    Err(_) => c.expr.clone(),
                };
            }
        }
    }

    /// Look up a proposition by id.
    pub fn proposition(&self, id: &str) -> Option<&Proposition> {
        self.propositions.iter().find(|p| p.id == id)
    }

    /// Soft constraints still awaiting a weight.
    pub fn unweighted_soft(&self) -> impl Iterator<Item = &Constraint> {
        self.soft_constraints.iter().filter(|c| c.weight.is_none())
    }

    /// Attach a weight to the named soft constraint.
    ///
    /// This is the single mutation the lifecycle permits after extraction;
    /// callers serialize writes per constraint slot.
    pub fn set_soft_weight(&mut self, id: &str, weight: f64) -> Result<(), StructureError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(StructureError::InvalidWeight {
                constraint_id: id.to_string(),
                weight,
            });
        }
        match self.soft_constraints.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.weight = Some(weight);
                Ok(())
            }
            None => Err(StructureError::UnknownConstraint { id: id.to_string() }),
        }
    }

    /// Whether every soft constraint carries a weight.
    pub fn fully_weighted(&self) -> bool {
        self.soft_constraints.iter().all(|c| c.weight.is_some())
    }

    // -- Persistence --------------------------------------------------------

    /// Serialize to the field-ordered JSON document.
    pub fn to_json_string(&self) -> Result<String, StructureError> {
        serde_json::to_string_pretty(self).map_err(|e| StructureError::Serialization {
            message: e.to_string(),
        })
    }

    /// Deserialize from the persisted JSON document, re-validating invariants.
    pub fn from_json_str(json: &str) -> Result<Self, StructureError> {
        let structure: LogicStructure =
            serde_json::from_str(json).map_err(|e| StructureError::Serialization {
                message: e.to_string(),
            })?;
        structure.validate()?;
        Ok(structure)
    }

    /// Write the structure to a file.
    pub fn save(&self, path: &Path) -> Result<(), StructureError> {
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|source| StructureError::Io { source })
    }

    /// Read a structure from a file.
    pub fn load(path: &Path) -> Result<Self, StructureError> {
        let json = std::fs::read_to_string(path).map_err(|source| StructureError::Io { source })?;
        Self::from_json_str(&json)
    }
}
