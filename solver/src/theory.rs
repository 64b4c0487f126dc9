mod distances;
mod edges;
mod explanation;
mod graph;
mod normalize;

use crate::errors::DlError;
use crate::lang::{Atom, Rel};
use crate::params::EnvParam;
use crate::theory::distances::{shortest_paths, Direction};
use crate::theory::edges::*;
use crate::theory::graph::EdgeMatrix;
use crate::theory::normalize::{normalize, normalize_new};
use diffsat_backtrack::Trail;
use diffsat_collections::heap::IdxHeap;
use diffsat_collections::ref_store::{RefPool, RefVec};
use hashbrown::HashMap;
use smallvec::{smallvec, SmallVec};
use tracing::trace;

pub use crate::theory::edges::Domain;
pub use crate::theory::explanation::{Justification, Provenance, UnsatCore};

pub static DL_THEORY_PROPAGATION: EnvParam<bool> = EnvParam::new("DIFFSAT_THEORY_PROPAGATION", "true");
pub static DL_EXTENSIVE_TESTS: EnvParam<bool> = EnvParam::new("DIFFSAT_EXTENSIVE_TESTS", "false");

/// Options of the engine. The default value of all parameters can be set
/// through environment variables.
#[derive(Clone, Debug)]
pub struct DlConfig {
    /// If true, each successful assertion also marks the dormant edges it
    /// entails as consequences, so that the host solver can skip them.
    pub theory_propagation: bool,
    /// If true, expensive invariant checks run after every assertion (debug
    /// builds only).
    pub extensive_tests: bool,
}

impl Default for DlConfig {
    fn default() -> Self {
        DlConfig {
            theory_propagation: DL_THEORY_PROPAGATION.get(),
            extensive_tests: DL_EXTENSIVE_TESTS.get(),
        }
    }
}

#[derive(Default, Clone)]
struct Stats {
    num_pushes: u64,
    num_potential_updates: u64,
    num_theory_propagations: u64,
    num_consequences: u64,
    num_conflicts: u64,
}

/// Name under which the zero vertex is interned.
const ZERO_NAME: &str = "0";

enum SolverStatus {
    Sat,
    UnSat {
        /// The literal whose assertion closed the negative cycle.
        trigger: Lit,
        /// Literals of the rest of the cycle, on the pre-assertion graph.
        cycle: Vec<Lit>,
    },
}

/// One backtrackable assertion: the literal, and the potential as it was
/// before the assertion. Status mutations are recorded on the trail.
struct Frame {
    lit: Lit,
    saved_potential: RefVec<Vertex, Weight>,
}

/// Incremental difference-logic engine.
///
/// The full dormant edge graph is materialized at construction from the atom
/// set; afterwards the engine only flips edge statuses and maintains a
/// potential function certifying satisfiability, following @Cotton06. Once a
/// push reports unsatisfiability the only permitted operations are queries of
/// the unsat core and `pop`, which returns to the consistent state.
pub struct DlTheory {
    pub config: DlConfig,
    domain: Domain,
    /// Variable interner; entry 0 is the synthetic zero vertex.
    vars: RefPool<Vertex, String>,
    /// Construction-time atoms, identifying literals.
    atoms: RefVec<AtomId, Atom>,
    /// Canonical form of every literal, for resolution at push time.
    canon: HashMap<(u8, u32, u32, u64), Lit>,
    /// Cells of the matrix hosting the edge(s) of each literal.
    cells: HashMap<Lit, SmallVec<[(Vertex, Vertex); 2]>>,
    graph: EdgeMatrix,
    potential: RefVec<Vertex, Weight>,
    /// History of edge status flips, one save point per assertion.
    trail: Trail<StatusChange>,
    frames: Vec<Frame>,
    status: SolverStatus,
    stats: Stats,
}

impl DlTheory {
    pub fn new(domain: Domain, atoms: impl IntoIterator<Item = Atom>) -> Result<DlTheory, DlError> {
        Self::with_config(domain, atoms, DlConfig::default())
    }

    pub fn with_config(
        domain: Domain,
        atoms: impl IntoIterator<Item = Atom>,
        config: DlConfig,
    ) -> Result<DlTheory, DlError> {
        let mut vars: RefPool<Vertex, String> = Default::default();
        vars.push(ZERO_NAME.to_string());
        let mut parsed: Vec<(Atom, Canonical)> = Vec::new();
        for atom in atoms {
            let c = normalize_new(&atom, domain, &mut vars)?;
            parsed.push((atom, c));
        }
        let n = vars.len();

        let mut store: RefVec<AtomId, Atom> = Default::default();
        let mut graph = EdgeMatrix::new(n);
        let mut canon: HashMap<(u8, u32, u32, u64), Lit> = Default::default();
        let mut cells: HashMap<Lit, SmallVec<[(Vertex, Vertex); 2]>> = Default::default();

        let add = |graph: &mut EdgeMatrix,
                       canon: &mut HashMap<(u8, u32, u32, u64), Lit>,
                       cells: &mut HashMap<Lit, SmallVec<[(Vertex, Vertex); 2]>>,
                       c: Canonical,
                       strictness: Strictness,
                       lit: Lit| {
            graph.add_edge(c.src, c.tgt, DiffEdge::dormant(c.bound, strictness, lit));
            canon.insert(c.key(), lit);
            cells.entry(lit).or_default().push((c.src, c.tgt));
        };

        for (atom, c) in parsed {
            if canon.contains_key(&c.key()) {
                // a repeated constraint aliases the first literal carrying it
                continue;
            }
            let id: AtomId = store.push(atom);
            let pos = Lit::new(id, false);
            match c.rel {
                Rel::Leq | Rel::Lt => {
                    let strictness = match c.rel {
                        Rel::Lt => Strictness::Strict,
                        _ => Strictness::NonStrict,
                    };
                    add(&mut graph, &mut canon, &mut cells, c, strictness, pos);
                    // the negation `tgt - src < -bound`, strict-rewritten on integers
                    let (neg_rel, neg_strictness, neg_bound) = match (c.rel, domain) {
                        (Rel::Leq, Domain::Integer) => (Rel::Leq, Strictness::NonStrict, -c.bound - 1.0),
                        (Rel::Leq, Domain::Real) => (Rel::Lt, Strictness::Strict, -c.bound),
                        (_, _) => (Rel::Leq, Strictness::NonStrict, -c.bound),
                    };
                    let nc = Canonical {
                        rel: neg_rel,
                        src: c.tgt,
                        tgt: c.src,
                        bound: neg_bound,
                    };
                    if !canon.contains_key(&nc.key()) {
                        add(&mut graph, &mut canon, &mut cells, nc, neg_strictness, !pos);
                    }
                }
                Rel::Eq if c.src == c.tgt => {
                    // a degenerate `0 = c` is the single self-loop bound
                    // `0 <= -|c|`, false exactly when `c` is not zero
                    graph.add_edge(
                        c.src,
                        c.tgt,
                        DiffEdge::dormant(-c.bound.abs(), Strictness::NonStrict, pos),
                    );
                    canon.insert(c.key(), pos);
                    cells.entry(pos).or_default().push((c.src, c.tgt));
                }
                Rel::Eq => {
                    // both directions, non-strict; an equality has no negation edge
                    add(&mut graph, &mut canon, &mut cells, c, Strictness::NonStrict, pos);
                    let rc = Canonical {
                        rel: Rel::Eq,
                        src: c.tgt,
                        tgt: c.src,
                        bound: -c.bound,
                    };
                    if !canon.contains_key(&rc.key()) {
                        graph.add_edge(rc.src, rc.tgt, DiffEdge::dormant(rc.bound, Strictness::NonStrict, pos));
                        canon.insert(rc.key(), pos);
                        cells.entry(pos).or_default().push((rc.src, rc.tgt));
                    }
                }
            }
        }

        Ok(DlTheory {
            config,
            domain,
            vars,
            atoms: store,
            canon,
            cells,
            graph,
            potential: RefVec::with_values(n, Weight::ZERO),
            trail: Trail::new(),
            frames: Vec::new(),
            status: SolverStatus::Sat,
            stats: Stats::default(),
        })
    }

    pub fn is_sat(&self) -> bool {
        matches!(self.status, SolverStatus::Sat)
    }

    /// Number of assertions that can be undone.
    pub fn level(&self) -> usize {
        self.frames.len()
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Witness value of a variable, relative to the zero vertex. Only
    /// meaningful while satisfiable.
    pub fn value_of(&self, name: &str) -> Result<f64, DlError> {
        if !self.is_sat() {
            return Err(DlError::StateMisuse {
                operation: "value_of",
                reason: "no witness in an unsatisfiable state",
            });
        }
        let v = self.vars.get_ref(name).ok_or_else(|| DlError::UnknownVariable {
            name: name.to_string(),
        })?;
        Ok(self.potential[ZERO_VERTEX].value - self.potential[v].value)
    }

    /// True iff the atom's literal is currently enforced, either asserted or
    /// as a recorded consequence of asserted literals.
    pub fn entails(&self, atom: &Atom) -> Result<bool, DlError> {
        let lit = self.resolve(atom)?;
        Ok(self
            .lit_cells(lit)
            .iter()
            .all(|&(u, v)| self.edge(u, v, lit).is_active()))
    }

    /// Asserts a literal of the construction-time atom set. Returns whether
    /// the conjunction asserted so far remains satisfiable; a `false` answer
    /// moves the engine to the unsatisfiable state, undone by `pop`.
    pub fn push(&mut self, atom: &Atom) -> Result<bool, DlError> {
        if !self.is_sat() {
            return Err(DlError::StateMisuse {
                operation: "push",
                reason: "the engine is unsatisfiable, pop first",
            });
        }
        let c = normalize(atom, self.domain, &self.vars)?;
        let lit = *self.canon.get(&c.key()).ok_or_else(|| DlError::UnknownLiteral {
            atom: atom.to_string(),
        })?;
        self.stats.num_pushes += 1;

        // an equality asserts its two halves within a single frame; on its
        // single self-loop edge a degenerate `0 = c` collapses to the bound
        // `-|c|`, false exactly when `c` is not zero
        let halves: SmallVec<[(Vertex, Vertex, Weight); 2]> = match c.rel {
            Rel::Eq if c.src == c.tgt => {
                smallvec![(c.src, c.tgt, Weight::of(-c.bound.abs(), Strictness::NonStrict))]
            }
            Rel::Eq => smallvec![
                (c.src, c.tgt, Weight::of(c.bound, Strictness::NonStrict)),
                (c.tgt, c.src, Weight::of(-c.bound, Strictness::NonStrict)),
            ],
            Rel::Leq => smallvec![(c.src, c.tgt, Weight::of(c.bound, Strictness::NonStrict))],
            Rel::Lt => smallvec![(c.src, c.tgt, Weight::of(c.bound, Strictness::Strict))],
        };

        // re-asserting an active literal records nothing
        if halves.iter().all(|&(u, v, _)| self.edge(u, v, lit).is_active()) {
            return Ok(true);
        }

        trace!("push: {}", atom);
        self.trail.save_state();
        self.frames.push(Frame {
            lit,
            saved_potential: self.potential.clone(),
        });
        for &(u, v, w) in &halves {
            if !self.assert_edge(lit, u, v, w) {
                debug_assert!(!self.is_sat());
                return Ok(false);
            }
        }
        if cfg!(debug_assertions) && self.config.extensive_tests {
            debug_assert!(self.potential_is_valid());
            debug_assert!(self.consequences_acyclic());
        }
        Ok(true)
    }

    /// Undoes the latest `push`: restores the potential from the frame
    /// snapshot and reverses the recorded status flips.
    pub fn pop(&mut self) -> Result<(), DlError> {
        let frame = self.frames.pop().ok_or(DlError::StateMisuse {
            operation: "pop",
            reason: "no assertion to undo",
        })?;
        trace!("pop: {}", self.external_form(frame.lit));
        let graph = &mut self.graph;
        self.trail.restore_last_with(|ev| {
            graph.set_status(ev.src, ev.tgt, ev.lit, ev.previous);
        });
        self.potential = frame.saved_potential;
        self.status = SolverStatus::Sat;
        Ok(())
    }

    pub fn print_stats(&self) {
        println!("# variables            : {}", self.vars.len() - 1);
        println!("# literals             : {}", self.atoms.len());
        println!("# pushes               : {}", self.stats.num_pushes);
        println!("# potential updates    : {}", self.stats.num_potential_updates);
        println!("# theory propagations  : {}", self.stats.num_theory_propagations);
        println!("# consequences         : {}", self.stats.num_consequences);
        println!("# conflicts            : {}", self.stats.num_conflicts);
    }

    // ------------------- resolution helpers -------------------

    fn resolve(&self, atom: &Atom) -> Result<Lit, DlError> {
        let c = normalize(atom, self.domain, &self.vars)?;
        self.canon
            .get(&c.key())
            .copied()
            .ok_or_else(|| DlError::UnknownLiteral {
                atom: atom.to_string(),
            })
    }

    fn lit_cells(&self, lit: Lit) -> &[(Vertex, Vertex)] {
        self.cells.get(&lit).expect("unindexed literal")
    }

    fn edge(&self, u: Vertex, v: Vertex, lit: Lit) -> &DiffEdge {
        self.graph.find(u, v, lit).expect("missing edge for literal")
    }

    /// User-facing atom of a literal, reconstructing the negated spelling when
    /// needed.
    fn external_form(&self, lit: Lit) -> Atom {
        let atom = &self.atoms[lit.atom()];
        if lit.is_negated() {
            atom.negated().expect("negation literal of an equality")
        } else {
            atom.clone()
        }
    }

    // ------------------- assertion -------------------

    /// Activates the edge of `lit` in cell `(u, v)` and restores the validity
    /// of the potential, or detects a negative cycle. Returns false on a
    /// cycle, after recording the conflict witness.
    fn assert_edge(&mut self, lit: Lit, u: Vertex, v: Vertex, w: Weight) -> bool {
        if self.edge(u, v, lit).is_active() {
            return true;
        }

        // status flips over the parallel edges: the literal's own edge is now
        // asserted, and any dormant weaker constraint becomes its consequence
        let mut flips: SmallVec<[(Lit, Status); 4]> = smallvec![];
        for e in self.graph.cell(u, v) {
            if e.lit == lit {
                flips.push((e.lit, Status::Assigned));
            } else if !e.is_active() && w <= e.bound() {
                flips.push((e.lit, Status::Consequence(smallvec![lit])));
            }
        }
        for (elit, status) in flips {
            if matches!(status, Status::Consequence(_)) {
                self.stats.num_consequences += 1;
            }
            let previous = self.graph.set_status(u, v, elit, status);
            self.trail.push(StatusChange {
                src: u,
                tgt: v,
                lit: elit,
                previous,
            });
        }

        // self loops carry no propagation: they are trivially true or a
        // one-literal conflict
        if u == v {
            if w < Weight::ZERO {
                self.conflict(lit, u, v);
                return false;
            }
            return true;
        }

        let gamma_v = self.potential[u] + w - self.potential[v];
        if gamma_v < Weight::ZERO && !self.update_potential(u, v, gamma_v) {
            self.conflict(lit, u, v);
            return false;
        }

        if self.config.theory_propagation {
            self.theory_propagate(lit, u, v, w);
        }
        true
    }

    /// The @Cotton06 potential repair for a newly activated edge `u -> v`
    /// whose target violates the potential by `gamma_v < 0`. Vertices are
    /// lowered in order of violation; reaching `u` itself means the new edge
    /// closes a negative cycle, in which case the partial update is rolled
    /// back and false is returned.
    fn update_potential(&mut self, u: Vertex, v: Vertex, gamma_v: Weight) -> bool {
        self.stats.num_potential_updates += 1;
        let n = self.graph.num_vertices();
        // queue keyed by the pending change of each vertex; the resting
        // priority zero stands for "no pending change"
        let mut queue: IdxHeap<Vertex, Weight> = IdxHeap::new();
        for k in 0..n {
            queue.declare_element(Vertex::from(k), Weight::ZERO);
        }
        let mut settled: RefVec<Vertex, bool> = RefVec::with_values(n, false);
        let mut touched: SmallVec<[(Vertex, Weight); 16]> = smallvec![];

        queue.set_priority(v, gamma_v);
        queue.enqueue(v);
        while let Some((s, gamma)) = queue.pop() {
            debug_assert!(gamma < Weight::ZERO);
            if s == u {
                // lowering the source would only happen on a negative cycle
                // through the new edge; undo and report
                for &(x, prev) in touched.iter().rev() {
                    self.potential[x] = prev;
                }
                return false;
            }
            touched.push((s, self.potential[s]));
            self.potential[s] = self.potential[s] + gamma;
            settled[s] = true;
            for k in 0..n {
                let t = Vertex::from(k);
                if settled[t] {
                    continue;
                }
                let Some(w_st) = self.graph.strongest(s, t) else { continue };
                let gamma_t = self.potential[s] + w_st - self.potential[t];
                if gamma_t < Weight::ZERO && gamma_t < queue.priority(t) {
                    queue.set_priority(t, gamma_t);
                    queue.enqueue(t);
                }
            }
        }
        true
    }

    /// Records the unsatisfiable state: the triggering literal plus the
    /// literals of the strongest `v ~> u` path on the pre-assertion graph,
    /// which together close the negative cycle. The freshly flipped parallel
    /// edges of `(u, v)` are excluded so the path reflects the graph as it was
    /// before the assertion.
    fn conflict(&mut self, lit: Lit, u: Vertex, v: Vertex) {
        self.stats.num_conflicts += 1;
        let sp = shortest_paths(&self.graph, &self.potential, v, Direction::Forward, Some((u, v)));
        let path = sp.vertex_path(u);
        let mut cycle = Vec::with_capacity(path.len());
        for pair in path.windows(2) {
            let l = self
                .graph
                .strongest_lit(pair[0], pair[1])
                .expect("no active edge on the witness path");
            cycle.push(l);
        }
        trace!("negative cycle of {} literals", cycle.len() + 1);
        self.status = SolverStatus::UnSat { trigger: lit, cycle };
    }

    /// After a successful assertion of `u -> v` with length `w`, flips every
    /// dormant edge `i -> j` entailed by the shortest `i ~> u ~> v ~> j` path
    /// to a consequence of the asserted literal and the path literals. The
    /// flips are committed to the rows so later justification queries see
    /// them, and recorded on the trail.
    fn theory_propagate(&mut self, lit: Lit, u: Vertex, v: Vertex, w: Weight) {
        self.stats.num_theory_propagations += 1;
        let fwd = shortest_paths(&self.graph, &self.potential, v, Direction::Forward, None);
        let bwd = shortest_paths(&self.graph, &self.potential, u, Direction::Backward, None);
        let rc_new = self.potential[u] + w - self.potential[v];

        let mut flips: Vec<(Vertex, Vertex, Lit, SmallVec<[Lit; 4]>)> = Vec::new();
        for (i, j, edge) in self.graph.edges() {
            if edge.is_active() || edge.lit == lit {
                continue;
            }
            let (Some(di), Some(dj)) = (bwd.reduced_dist(i), fwd.reduced_dist(j)) else {
                continue;
            };
            // both sides compared in the reduced space
            let through_new = di + rc_new + dj;
            let own = self.potential[i] + edge.bound() - self.potential[j];
            if through_new <= own {
                let mut witness: SmallVec<[Lit; 4]> = smallvec![lit];
                // the backward path lists `u ... i`; hops are reversed edges
                let to_u = bwd.vertex_path(i);
                for pair in to_u.windows(2) {
                    witness.push(
                        self.graph
                            .strongest_lit(pair[1], pair[0])
                            .expect("no active edge on the witness path"),
                    );
                }
                let from_v = fwd.vertex_path(j);
                for pair in from_v.windows(2) {
                    witness.push(
                        self.graph
                            .strongest_lit(pair[0], pair[1])
                            .expect("no active edge on the witness path"),
                    );
                }
                flips.push((i, j, edge.lit, witness));
            }
        }
        for (i, j, elit, witness) in flips {
            self.stats.num_consequences += 1;
            let previous = self.graph.set_status(i, j, elit, Status::Consequence(witness));
            self.trail.push(StatusChange {
                src: i,
                tgt: j,
                lit: elit,
                previous,
            });
        }
    }

    // ------------------- invariant checks -------------------

    /// Every active edge is respected by the potential.
    pub(crate) fn potential_is_valid(&self) -> bool {
        self.graph
            .edges()
            .filter(|(_, _, e)| e.is_active())
            .all(|(a, b, e)| self.potential[a] + e.bound() - self.potential[b] >= Weight::ZERO)
    }

    /// The witness relation over consequence edges has no cycles.
    pub(crate) fn consequences_acyclic(&self) -> bool {
        #[derive(PartialEq)]
        enum Mark {
            Open,
            Done,
        }
        fn visit(theory: &DlTheory, lit: Lit, marks: &mut HashMap<Lit, Mark>) -> bool {
            match marks.get(&lit) {
                Some(Mark::Open) => return false,
                Some(Mark::Done) => return true,
                None => {}
            }
            marks.insert(lit, Mark::Open);
            for &(a, b) in theory.lit_cells(lit) {
                if let Status::Consequence(witness) = &theory.edge(a, b, lit).status {
                    for &l in witness {
                        if !visit(theory, l, marks) {
                            return false;
                        }
                    }
                }
            }
            marks.insert(lit, Mark::Done);
            true
        }

        let mut marks: HashMap<Lit, Mark> = Default::default();
        self.graph
            .edges()
            .filter(|(_, _, e)| matches!(e.status, Status::Consequence(_)))
            .all(|(_, _, e)| visit(self, e.lit, &mut marks))
    }
}
