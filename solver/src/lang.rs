//! The input language: linear terms over named variables and the three
//! difference-logic relations. Hosts build atoms here and hand them to the
//! engine, which rewrites them into canonical form.

use std::fmt::{Display, Formatter};
use std::ops::{Add, Neg, Sub};

/// A numeric term. Only terms that rearrange to `x - y`, a single variable or
/// a constant are accepted by the engine; everything else is rejected when the
/// enclosing atom is normalized.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Var(String),
    Cst(f64),
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Neg(Box<Term>),
    Scale(f64, Box<Term>),
}

pub fn var(name: impl Into<String>) -> Term {
    Term::Var(name.into())
}

pub fn cst(value: f64) -> Term {
    Term::Cst(value)
}

impl Term {
    pub fn leq(self, bound: f64) -> Atom {
        Atom::new(self, Rel::Leq, bound)
    }

    pub fn lt(self, bound: f64) -> Atom {
        Atom::new(self, Rel::Lt, bound)
    }

    pub fn equals(self, bound: f64) -> Atom {
        Atom::new(self, Rel::Eq, bound)
    }
}

impl Add for Term {
    type Output = Term;

    fn add(self, rhs: Term) -> Term {
        Term::Add(Box::new(self), Box::new(rhs))
    }
}

impl Sub for Term {
    type Output = Term;

    fn sub(self, rhs: Term) -> Term {
        Term::Sub(Box::new(self), Box::new(rhs))
    }
}

impl Neg for Term {
    type Output = Term;

    fn neg(self) -> Term {
        Term::Neg(Box::new(self))
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Var(name) => write!(f, "{name}"),
            Term::Cst(value) => write!(f, "{value}"),
            Term::Add(a, b) => write!(f, "{a} + {b}"),
            Term::Sub(a, b) => write!(f, "{a} - {b}"),
            Term::Neg(a) => write!(f, "-({a})"),
            Term::Scale(factor, a) => write!(f, "{factor}*({a})"),
        }
    }
}

/// Relation of an atom: `<=`, `<` or `=`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rel {
    Leq,
    Lt,
    Eq,
}

impl Display for Rel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Rel::Leq => "<=",
                Rel::Lt => "<",
                Rel::Eq => "=",
            }
        )
    }
}

/// A difference-logic atom `term <rel> constant`.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub lhs: Term,
    pub rel: Rel,
    pub rhs: f64,
}

impl Atom {
    pub fn new(lhs: Term, rel: Rel, rhs: f64) -> Atom {
        Atom { lhs, rel, rhs }
    }

    /// The negation of this atom, rearranged back into a supported relation:
    /// `!(t <= c)` is `-t < -c` and `!(t < c)` is `-t <= -c`. An equality has
    /// no representable negation.
    pub fn negated(&self) -> Option<Atom> {
        let flipped = Term::Neg(Box::new(self.lhs.clone()));
        match self.rel {
            Rel::Leq => Some(Atom::new(flipped, Rel::Lt, -self.rhs)),
            Rel::Lt => Some(Atom::new(flipped, Rel::Leq, -self.rhs)),
            Rel::Eq => None,
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.rel, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let a = (var("x") - var("y")).leq(3.0);
        assert_eq!(a.to_string(), "x - y <= 3");
        let b = (var("x") + cst(1.0)).lt(0.5);
        assert_eq!(b.to_string(), "x + 1 < 0.5");
        let c = (var("x") - var("y")).equals(0.0);
        assert_eq!(c.to_string(), "x - y = 0");
    }

    #[test]
    fn test_negation() {
        let a = (var("x") - var("y")).leq(3.0);
        let na = a.negated().unwrap();
        assert_eq!(na.rel, Rel::Lt);
        assert_eq!(na.rhs, -3.0);
        assert_eq!(na.to_string(), "-(x - y) < -3");

        let b = (var("x") - var("y")).lt(3.0);
        assert_eq!(b.negated().unwrap().rel, Rel::Leq);

        assert!((var("x") - var("y")).equals(0.0).negated().is_none());
    }
}
