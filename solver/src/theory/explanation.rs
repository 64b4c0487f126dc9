//! Explanations exchanged with the host framework: equalities between shared
//! terms for the Nelson-Oppen combination, per-literal justifications and
//! unsat cores built from negative cycle witnesses.

use crate::errors::DlError;
use crate::lang::Atom;
use crate::theory::edges::{Lit, Status, Vertex};
use crate::theory::{DlTheory, SolverStatus};
use diffsat_collections::ref_store::RefVec;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Provenance tag of facts produced by this engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    Dl,
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DL")
    }
}

/// Why a literal holds: the asserted literals it follows from, and the
/// intermediate consequences met while unrolling its witness chain.
#[derive(Clone, Debug)]
pub struct Justification {
    pub givens: Vec<Atom>,
    pub literal: Atom,
    pub tag: Provenance,
    pub deductions: Vec<Atom>,
}

impl Display for Justification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} => {}",
            self.tag,
            self.givens.iter().format(" & "),
            self.literal
        )
    }
}

/// An unsatisfiable conjunction of previously asserted literals, with the
/// literal whose assertion exposed it.
#[derive(Clone, Debug)]
pub struct UnsatCore {
    pub conjunction: Vec<Atom>,
    pub trigger: Atom,
    pub tag: Provenance,
    pub deductions: Vec<Atom>,
}

impl Display for UnsatCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] unsat: {}", self.tag, self.conjunction.iter().format(" & "))
    }
}

impl DlTheory {
    /// Equalities between shared terms entailed by the recorded edges: each
    /// zero-length edge `a -> b` whose reverse zero-length edge is also active
    /// proves `a = b`. Pairs are ordered by vertex id and deduplicated. Must
    /// not be called in the unsatisfiable state.
    pub fn propagations(&self, shared: &[&str]) -> Result<Vec<(String, String)>, DlError> {
        if !self.is_sat() {
            return Err(DlError::StateMisuse {
                operation: "propagations",
                reason: "no equalities are exchanged in an unsatisfiable state",
            });
        }
        let mut is_shared: RefVec<Vertex, bool> = RefVec::with_values(self.graph.num_vertices(), false);
        for name in shared {
            let v = self.vars.get_ref(*name).ok_or_else(|| DlError::UnknownVariable {
                name: name.to_string(),
            })?;
            is_shared[v] = true;
        }

        let mut pairs: Vec<(Vertex, Vertex)> = Vec::new();
        for ev in self.trail.events() {
            let (a, b) = (ev.src, ev.tgt);
            if !is_shared[a] || !is_shared[b] {
                continue;
            }
            let e = self.edge(a, b, ev.lit);
            if !e.is_active() || e.weight != 0.0 {
                continue;
            }
            if self
                .graph
                .cell(b, a)
                .iter()
                .any(|r| r.is_active() && r.weight == 0.0)
            {
                pairs.push(if a < b { (a, b) } else { (b, a) });
            }
        }
        Ok(pairs
            .into_iter()
            .unique()
            .map(|(a, b)| (self.vars[a].clone(), self.vars[b].clone()))
            .collect())
    }

    /// Explains how the literal of `atom` came to hold.
    pub fn justify(&self, atom: &Atom) -> Result<Justification, DlError> {
        let lit = self.resolve(atom)?;
        let mut givens = Vec::new();
        let mut deductions = Vec::new();
        self.unroll(lit, true, &mut givens, &mut deductions)?;
        Ok(Justification {
            givens: givens.iter().map(|&l| self.external_form(l)).collect(),
            literal: self.external_form(lit),
            tag: Provenance::Dl,
            deductions: deductions.iter().map(|&l| self.external_form(l)).collect(),
        })
    }

    /// The conjunction of asserted literals proven inconsistent by the last
    /// `push`. Callable only in the unsatisfiable state.
    pub fn unsat_core(&self) -> Result<Vec<Atom>, DlError> {
        Ok(self.unsat_core_with_info()?.conjunction)
    }

    pub fn unsat_core_with_info(&self) -> Result<UnsatCore, DlError> {
        let SolverStatus::UnSat { trigger, cycle } = &self.status else {
            return Err(DlError::StateMisuse {
                operation: "unsat_core",
                reason: "the asserted conjunction is satisfiable",
            });
        };
        let mut givens = vec![*trigger];
        let mut deductions = Vec::new();
        for &l in cycle {
            self.unroll(l, false, &mut givens, &mut deductions)?;
        }
        Ok(UnsatCore {
            conjunction: givens.iter().map(|&l| self.external_form(l)).collect(),
            trigger: self.external_form(*trigger),
            tag: Provenance::Dl,
            deductions: deductions.iter().map(|&l| self.external_form(l)).collect(),
        })
    }

    /// Walks the witness chain of `lit`. Asserted ancestors accumulate in
    /// `givens`, intermediate consequences in `deductions`; the root literal
    /// itself only counts when it is asserted.
    fn unroll(&self, lit: Lit, root: bool, givens: &mut Vec<Lit>, deductions: &mut Vec<Lit>) -> Result<(), DlError> {
        if givens.contains(&lit) || deductions.contains(&lit) {
            return Ok(());
        }
        let cells = self.lit_cells(lit);
        if cells.iter().any(|&(a, b)| self.edge(a, b, lit).status == Status::Assigned) {
            givens.push(lit);
            return Ok(());
        }
        let mut witnesses: Vec<Lit> = Vec::new();
        for &(a, b) in cells {
            match &self.edge(a, b, lit).status {
                Status::Consequence(ws) => witnesses.extend_from_slice(ws),
                Status::Unassigned => {
                    return Err(DlError::Inconsistent {
                        reason: format!("witness chain reached the unassigned literal {}", self.external_form(lit)),
                    })
                }
                Status::Assigned => unreachable!(),
            }
        }
        if !root {
            deductions.push(lit);
        }
        for w in witnesses {
            self.unroll(w, false, givens, deductions)?;
        }
        Ok(())
    }
}
