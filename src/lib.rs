//! # Microprove
//!
//! A minimal tabled SLD-resolution engine in Rust.
//!
//! Given a database of Horn clauses, the engine enumerates every distinct
//! proof of a query goal. Subgoal results are memoized ("tabled") per query,
//! so mutually recursive clause definitions terminate instead of looping and
//! identical subgoals are never recomputed.
//!
//! ## Features
//!
//! - Complete, deterministic proof enumeration in declaration order
//! - Tabling with cycle detection for recursive clause definitions
//! - Structural unification (occurs-check omitted)
//!
//! ## Example
//!
//! ```rust
//! use microprove::{TablingEngine, Term};
//!
//! let mut engine = TablingEngine::new();
//! engine
//!     .add_fact(Term::app("edge", [Term::atom("a"), Term::atom("b")]))
//!     .unwrap();
//! engine
//!     .add_rule(
//!         Term::app("path", [Term::var("X"), Term::var("Y")]),
//!         Term::app("edge", [Term::var("X"), Term::var("Y")]),
//!     )
//!     .unwrap();
//!
//! let solutions = engine.prove(&Term::app("path", [Term::atom("a"), Term::var("Y")]));
//! assert_eq!(solutions.len(), 1);
//! assert_eq!(solutions[0].bindings["Y"], Term::atom("b"));
//! ```

/// Clause storage, tabled resolution, and proof enumeration.
pub mod engine;
/// First-order terms, substitutions, and unification.
pub mod term;

pub use engine::{Clause, ClauseStore, EngineError, Proof, Solution, TablingEngine};
pub use term::{Substitution, Term};
