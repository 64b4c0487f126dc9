use crate::theory::edges::{DiffEdge, Lit, Status, Vertex, Weight};

/// Dense vertex-indexed adjacency: for every ordered pair `(u, v)` the list of
/// parallel edges between them. Parallel edges are kept as a list so that each
/// literal retains its own edge for justification purposes.
#[derive(Clone)]
pub struct EdgeMatrix {
    n: usize,
    cells: Vec<Vec<DiffEdge>>,
}

impl EdgeMatrix {
    pub fn new(n: usize) -> EdgeMatrix {
        EdgeMatrix {
            n,
            cells: vec![Vec::new(); n * n],
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.n
    }

    fn idx(&self, u: Vertex, v: Vertex) -> usize {
        usize::from(u) * self.n + usize::from(v)
    }

    pub fn cell(&self, u: Vertex, v: Vertex) -> &[DiffEdge] {
        let i = self.idx(u, v);
        &self.cells[i]
    }

    pub fn cell_mut(&mut self, u: Vertex, v: Vertex) -> &mut Vec<DiffEdge> {
        let i = self.idx(u, v);
        &mut self.cells[i]
    }

    pub fn add_edge(&mut self, u: Vertex, v: Vertex, e: DiffEdge) {
        debug_assert!(
            !self.cell(u, v).iter().any(|other| other.lit == e.lit),
            "A literal may source at most one edge per direction"
        );
        self.cell_mut(u, v).push(e);
    }

    /// The edge of cell `(u, v)` originating from `lit`.
    pub fn find(&self, u: Vertex, v: Vertex, lit: Lit) -> Option<&DiffEdge> {
        self.cell(u, v).iter().find(|e| e.lit == lit)
    }

    /// Replaces the status of the edge of `(u, v)` originating from `lit` and
    /// returns the previous one. Panics if there is no such edge.
    pub fn set_status(&mut self, u: Vertex, v: Vertex, lit: Lit, status: Status) -> Status {
        let edge = self
            .cell_mut(u, v)
            .iter_mut()
            .find(|e| e.lit == lit)
            .expect("no edge for this literal");
        std::mem::replace(&mut edge.status, status)
    }

    /// The strongest active edge of `(u, v)`: minimal bound, a strict bound
    /// beating the non-strict one at equal weight.
    pub fn strongest(&self, u: Vertex, v: Vertex) -> Option<Weight> {
        self.cell(u, v)
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.bound())
            .fold(None, |acc, b| match acc {
                Some(best) if best < b => Some(best),
                _ => Some(b),
            })
    }

    /// The literal of the strongest active edge of `(u, v)`.
    pub fn strongest_lit(&self, u: Vertex, v: Vertex) -> Option<Lit> {
        self.cell(u, v)
            .iter()
            .filter(|e| e.is_active())
            .fold(None, |acc: Option<&DiffEdge>, e| match acc {
                Some(best) if best.bound() < e.bound() => Some(best),
                _ => Some(e),
            })
            .map(|e| e.lit)
    }

    /// All edges of the matrix together with their cell coordinates.
    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex, &DiffEdge)> {
        let n = self.n;
        self.cells.iter().enumerate().flat_map(move |(i, cell)| {
            let u = Vertex::from(i / n);
            let v = Vertex::from(i % n);
            cell.iter().map(move |e| (u, v, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::edges::{AtomId, Strictness};

    fn lit(i: u32) -> Lit {
        Lit::new(AtomId::from_u32(i), false)
    }

    #[test]
    fn test_strongest_ignores_dormant_edges() {
        let mut g = EdgeMatrix::new(3);
        let (u, v) = (Vertex::from_u32(1), Vertex::from_u32(2));
        g.add_edge(u, v, DiffEdge::dormant(1.0, Strictness::NonStrict, lit(0)));
        g.add_edge(u, v, DiffEdge::dormant(5.0, Strictness::NonStrict, lit(1)));
        assert_eq!(g.strongest(u, v), None);

        g.set_status(u, v, lit(1), Status::Assigned);
        assert_eq!(g.strongest(u, v), Some(Weight::of(5.0, Strictness::NonStrict)));
        assert_eq!(g.strongest_lit(u, v), Some(lit(1)));

        g.set_status(u, v, lit(0), Status::Assigned);
        assert_eq!(g.strongest(u, v), Some(Weight::of(1.0, Strictness::NonStrict)));
        assert_eq!(g.strongest_lit(u, v), Some(lit(0)));
    }

    #[test]
    fn test_strongest_breaks_ties_by_strictness() {
        let mut g = EdgeMatrix::new(2);
        let (u, v) = (Vertex::from_u32(0), Vertex::from_u32(1));
        g.add_edge(u, v, DiffEdge::dormant(2.0, Strictness::NonStrict, lit(0)));
        g.add_edge(u, v, DiffEdge::dormant(2.0, Strictness::Strict, lit(1)));
        g.set_status(u, v, lit(0), Status::Assigned);
        g.set_status(u, v, lit(1), Status::Assigned);
        assert_eq!(g.strongest(u, v), Some(Weight::of(2.0, Strictness::Strict)));
        assert_eq!(g.strongest_lit(u, v), Some(lit(1)));
    }

    #[test]
    fn test_status_round_trip() {
        let mut g = EdgeMatrix::new(2);
        let (u, v) = (Vertex::from_u32(0), Vertex::from_u32(1));
        g.add_edge(u, v, DiffEdge::dormant(0.0, Strictness::NonStrict, lit(0)));
        let prev = g.set_status(u, v, lit(0), Status::Assigned);
        assert_eq!(prev, Status::Unassigned);
        let prev = g.set_status(u, v, lit(0), prev);
        assert_eq!(prev, Status::Assigned);
        assert!(g.find(u, v, lit(0)).is_some());
        assert!(g.find(v, u, lit(0)).is_none());
    }
}
