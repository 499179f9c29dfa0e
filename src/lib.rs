//! A weighted constraint satisfaction problem (WCSP) model and a frontend
//! for an external branch-and-bound solver.
//!
//! The crate represents discrete variables with finite domains and cost
//! functions ("constraints") over subsets of those variables. Costs are
//! real-valued non-negative weights, with a distinguished sentinel
//! ([`Cost::Top`]) meaning "globally forbidden". The combinatorial search
//! itself is delegated to an external solver process (toulbar2-compatible);
//! this crate owns everything around it:
//!
//! - **[`Constraint`]**: a cost function over an ordered tuple of variables,
//!   with explicit tuples and a default cost.
//! - **[`Wcsp`]**: the problem instance. Inserting a constraint over a scope
//!   that already has one *merges* the two — independent cost factors
//!   combine by summing, `Top` absorbs.
//! - **Normalization**: an exact, overflow-checked conversion of real costs
//!   to bounded integers the solver can work with.
//! - **Serialization**: the bit-exact WCSP text format shared with the
//!   solver binary.
//! - **[`SolverClient`]**: spawns the solver on a scratch file and parses
//!   its solution stream.
//!
//! # Example: modelling and serializing a tiny problem
//!
//! ```
//! use wcsp::model::{Constraint, Cost, Wcsp};
//!
//! // Two variables, both with domain {0, 1}.
//! let mut problem = Wcsp::new("tiny", vec![2, 2]);
//!
//! // Prefer the variables to disagree, forbid (0, 0) outright.
//! let mut favour = Constraint::new(vec![0, 1], Cost::Real(0.0));
//! favour.tuple(vec![0, 1], Cost::Real(0.5)).unwrap();
//! favour.tuple(vec![1, 0], Cost::Real(0.5)).unwrap();
//! problem.insert(favour).unwrap();
//!
//! let mut forbid = Constraint::new(vec![0, 1], Cost::Real(0.0));
//! forbid.tuple(vec![0, 0], Cost::Top).unwrap();
//! problem.insert(forbid).unwrap();
//!
//! // Both constraints share the scope {0, 1}, so they were merged.
//! assert_eq!(problem.constraints.len(), 1);
//!
//! // Serializing integerizes the costs first.
//! let mut encoded = Vec::new();
//! problem.write(&mut encoded).unwrap();
//! assert!(String::from_utf8(encoded).unwrap().starts_with("tiny 2 2 1"));
//! ```
//!
//! Solving requires the external binary and goes through
//! [`SolverClient::solve`] (best solution) or [`SolverClient::solutions`]
//! (every intermediate solution, as an iterator).
//!
//! [`Cost::Top`]: model::Cost::Top
//! [`Constraint`]: model::Constraint
//! [`Wcsp`]: model::Wcsp
//! [`SolverClient`]: solver::SolverClient
//! [`SolverClient::solve`]: solver::SolverClient::solve
//! [`SolverClient::solutions`]: solver::SolverClient::solutions

pub mod error;
pub mod format;
pub mod model;
pub mod solver;
