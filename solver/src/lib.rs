//! An incremental satisfiability engine for difference logic over the integer
//! or real domain.
//!
//! Atoms constrain two variables as `x - y <= c`, `x - y < c` or `x - y = c`.
//! The engine decides whether a growing, backtrackable conjunction of such
//! atoms is satisfiable, maintains a witness as a potential function over the
//! constraint graph, and on contradiction produces an unsat core built from
//! the literals of a negative cycle. Entailed literals and equalities between
//! shared terms are reported for exchange with sibling theories.

pub mod errors;
pub mod lang;
mod params;
pub mod theory;

pub use errors::DlError;
pub use lang::{cst, var, Atom, Rel, Term};
pub use theory::{DlConfig, DlTheory, Domain, Justification, Provenance, UnsatCore};
