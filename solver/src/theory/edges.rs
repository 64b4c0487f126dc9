use crate::lang::Rel;
use diffsat_collections::create_ref_type;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::ops::{Add, Not, Sub};

create_ref_type!(Vertex);
create_ref_type!(AtomId);

/// Vertex standing for the constant 0. It lets a unary bound `x <= c` be
/// represented as the difference `x - zero <= c`.
pub const ZERO_VERTEX: Vertex = Vertex::from_u32(0);

/// Domain over which the variables range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Domain {
    Integer,
    Real,
}

/// Whether a bound is strict (`<`) or non-strict (`<=`). Strict bounds are
/// never created on the integer domain, where `< c` is `<= c - 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strictness {
    Strict,
    NonStrict,
}

/// A literal: an atom of the construction-time set or its negation. An atom
/// and its negation share the same base id and differ by the lowest bit.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Lit(u32);

impl Lit {
    #[inline]
    pub fn new(atom: AtomId, negated: bool) -> Lit {
        if negated {
            Lit((atom.to_u32() << 1) + 1)
        } else {
            Lit(atom.to_u32() << 1)
        }
    }

    #[inline]
    pub fn atom(self) -> AtomId {
        AtomId::from_u32(self.0 >> 1)
    }

    #[inline]
    pub fn is_negated(self) -> bool {
        self.0 & 0x1 == 1
    }
}

impl Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit(self.0 ^ 0x1)
    }
}

/// Length of an edge or of a path: the number `value - eps * ε` for a symbolic
/// infinitesimal `ε > 0` accounting for strict bounds on the real domain.
/// Lengths are ordered lexicographically: by `value`, and at equal `value` the
/// length carrying more infinitesimals is the smaller (stronger) one.
#[derive(Copy, Clone, Debug)]
pub struct Weight {
    pub value: f64,
    pub eps: i64,
}

impl Weight {
    pub const ZERO: Weight = Weight { value: 0.0, eps: 0 };
    pub const MAX: Weight = Weight {
        value: f64::INFINITY,
        eps: 0,
    };

    pub fn of(value: f64, strictness: Strictness) -> Weight {
        Weight {
            value,
            eps: match strictness {
                Strictness::Strict => 1,
                Strictness::NonStrict => 0,
            },
        }
    }
}

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.eps == other.eps
    }
}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.value.partial_cmp(&other.value) {
            Some(Ordering::Equal) => Some(other.eps.cmp(&self.eps)),
            ord => ord,
        }
    }
}

impl Add for Weight {
    type Output = Weight;

    fn add(self, rhs: Weight) -> Weight {
        Weight {
            value: self.value + rhs.value,
            eps: self.eps + rhs.eps,
        }
    }
}

impl Sub for Weight {
    type Output = Weight;

    fn sub(self, rhs: Weight) -> Weight {
        Weight {
            value: self.value - rhs.value,
            eps: self.eps - rhs.eps,
        }
    }
}

/// Status of an edge.
///
/// An `Unassigned` edge lies dormant and does not constrain the potential.
/// An `Assigned` edge enforces a literal the engine was explicitly told to
/// hold. A `Consequence` edge is entailed by the recorded witness literals.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Unassigned,
    Assigned,
    Consequence(SmallVec<[Lit; 4]>),
}

impl Status {
    pub fn is_active(&self) -> bool {
        !matches!(self, Status::Unassigned)
    }
}

/// A directed edge `u -> v` of the constraint graph, standing for the bound
/// `x_u - x_v <= weight` (or `<` when strict). Parallel edges between the same
/// pair carry distinct originating literals.
#[derive(Clone, Debug)]
pub struct DiffEdge {
    pub weight: f64,
    pub strictness: Strictness,
    pub status: Status,
    pub lit: Lit,
}

impl DiffEdge {
    pub fn dormant(weight: f64, strictness: Strictness, lit: Lit) -> DiffEdge {
        DiffEdge {
            weight,
            strictness,
            status: Status::Unassigned,
            lit,
        }
    }

    pub fn bound(&self) -> Weight {
        Weight::of(self.weight, self.strictness)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Canonical form of an atom: `x_src - x_tgt <rel> bound`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Canonical {
    pub rel: Rel,
    pub src: Vertex,
    pub tgt: Vertex,
    pub bound: f64,
}

impl Canonical {
    /// Lookup key using exact double equality on the bound. The two IEEE
    /// zeros collapse to a single key.
    pub fn key(&self) -> (u8, u32, u32, u64) {
        let rel = match self.rel {
            Rel::Leq => 0u8,
            Rel::Lt => 1,
            Rel::Eq => 2,
        };
        let bound = if self.bound == 0.0 { 0.0 } else { self.bound };
        (rel, self.src.to_u32(), self.tgt.to_u32(), bound.to_bits())
    }
}

/// One edge-status mutation, recorded on the trail and reversed on
/// backtracking. The edge is identified by its cell and originating literal.
#[derive(Clone, Debug)]
pub struct StatusChange {
    pub src: Vertex,
    pub tgt: Vertex,
    pub lit: Lit,
    pub previous: Status,
}
