use crate::errors::DlError;
use crate::lang::{Atom, Rel, Term};
use crate::theory::edges::{Canonical, Domain, Vertex, ZERO_VERTEX};
use diffsat_collections::ref_store::RefPool;

/// Rewrites an atom into canonical form `x_src - x_tgt <rel> bound`, interning
/// variables met for the first time. Used at construction.
pub fn normalize_new(atom: &Atom, domain: Domain, vars: &mut RefPool<Vertex, String>) -> Result<Canonical, DlError> {
    normalize_impl(atom, domain, &mut |name| match vars.get_ref(name) {
        Some(v) => Ok(v),
        None => Ok(vars.push(name.to_string())),
    })
}

/// Rewrites an atom into canonical form against the fixed variable set. A name
/// never seen at construction is an error.
pub fn normalize(atom: &Atom, domain: Domain, vars: &RefPool<Vertex, String>) -> Result<Canonical, DlError> {
    normalize_impl(atom, domain, &mut |name| {
        vars.get_ref(name).ok_or_else(|| DlError::UnknownVariable {
            name: name.to_string(),
        })
    })
}

fn normalize_impl(
    atom: &Atom,
    domain: Domain,
    resolve: &mut dyn FnMut(&str) -> Result<Vertex, DlError>,
) -> Result<Canonical, DlError> {
    let mut coeffs: Vec<(&str, f64)> = Vec::new();
    let mut constant = 0.0;
    linearize(&atom.lhs, 1.0, &mut coeffs, &mut constant);
    coeffs.retain(|&(_, c)| c != 0.0);

    let (pos, neg) = match coeffs.as_slice() {
        [] => (None, None),
        [(x, c)] if *c == 1.0 => (Some(*x), None),
        [(x, c)] if *c == -1.0 => (None, Some(*x)),
        [(x, cx), (y, cy)] if *cx == 1.0 && *cy == -1.0 => (Some(*x), Some(*y)),
        [(x, cx), (y, cy)] if *cx == -1.0 && *cy == 1.0 => (Some(*y), Some(*x)),
        _ => {
            return Err(DlError::Malformed {
                reason: format!("not a difference of two variables: {atom}"),
            })
        }
    };
    let src = match pos {
        Some(name) => resolve(name)?,
        None => ZERO_VERTEX,
    };
    let tgt = match neg {
        Some(name) => resolve(name)?,
        None => ZERO_VERTEX,
    };

    let mut rel = atom.rel;
    let mut bound = atom.rhs - constant;
    if domain == Domain::Integer && rel == Rel::Lt {
        // on integers a strict bound is one less than the non-strict one
        rel = Rel::Leq;
        bound -= 1.0;
    }
    Ok(Canonical { rel, src, tgt, bound })
}

/// Flattens a term into variable coefficients plus a constant offset,
/// preserving the first-seen order of the variables.
fn linearize<'a>(term: &'a Term, factor: f64, coeffs: &mut Vec<(&'a str, f64)>, constant: &mut f64) {
    match term {
        Term::Var(name) => match coeffs.iter_mut().find(|(n, _)| *n == name.as_str()) {
            Some((_, c)) => *c += factor,
            None => coeffs.push((name, factor)),
        },
        Term::Cst(k) => *constant += factor * k,
        Term::Add(a, b) => {
            linearize(a, factor, coeffs, constant);
            linearize(b, factor, coeffs, constant);
        }
        Term::Sub(a, b) => {
            linearize(a, factor, coeffs, constant);
            linearize(b, -factor, coeffs, constant);
        }
        Term::Neg(a) => linearize(a, -factor, coeffs, constant),
        Term::Scale(f, a) => linearize(a, factor * f, coeffs, constant),
    }
}
