// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # maat
//!
//! Grounds a document in weighted propositional-logic constraints and answers
//! queries by optimization-based entailment checking.
//!
//! ## Architecture
//!
//! - **Data model** (`logic`): propositions, hard/soft constraints, the
//!   NOT/AND/OR/IMPLIES/IFF expression grammar, JSON persistence
//! - **Compiler** (`cnf`): Tseytin clause-normal-form compilation with
//!   reference validation and weighted clause tagging
//! - **Solver** (`solver`): exact branch-and-bound weighted partial MaxSAT
//!   with budgets and a documented tractable ceiling
//! - **Weights** (`weights`): sliding-window chunking, embedding retrieval,
//!   YES/NO logprob verification, probability-to-weight transform
//! - **Queries** (`query`): two assumption-pinned solves, cost-gap
//!   confidence, soft-constraint-diff explanations
//! - **Clients** (`model`): injected completion/embedding backends over
//!   OpenAI-compatible endpoints
//!
//! ## Library usage
//!
//! ```no_run
//! use maat::engine::{Engine, EngineConfig};
//! use maat::logic::LogicStructure;
//! use maat::model::{HttpModelClient, ModelConfig};
//! use maat::weights::WeightAssigner;
//!
//! let extraction = std::fs::read_to_string("contract.json").unwrap();
//! let mut structure = LogicStructure::from_extraction_json(&extraction).unwrap();
//!
//! let client = HttpModelClient::new(ModelConfig::default());
//! let config = EngineConfig::default();
//! let assigner = WeightAssigner::new(&client, &client, config.weights.clone());
//! let document = std::fs::read_to_string("contract.txt").unwrap();
//! assigner.assign_all(&document, &mut structure).unwrap();
//!
//! let engine = Engine::new(structure, config).unwrap();
//! let result = engine.answer("subcontracting IMPLIES written_consent").unwrap();
//! println!("{}: {:.2} | {}", result.answer, result.confidence, result.explanation);
//! ```

pub mod cnf;
pub mod engine;
pub mod error;
pub mod logic;
pub mod model;
pub mod query;
pub mod solver;
pub mod weights;
