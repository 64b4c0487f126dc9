use thiserror::Error;

/// Fatal errors of the difference-logic engine. All of them abort the current
/// call; the engine never attempts local recovery and a caller is expected to
/// treat every variant as a usage or programming error.
#[derive(Debug, Error)]
pub enum DlError {
    /// The atom cannot be rewritten into the form `x - y <rel> c`.
    #[error("malformed atom: {reason}")]
    Malformed { reason: String },

    /// A literal references a variable that was absent from the atom set given
    /// at construction.
    #[error("unknown variable: {name}")]
    UnknownVariable { name: String },

    /// A well-formed atom that does not correspond to any literal of the
    /// construction-time atom set.
    #[error("literal was not declared at construction: {atom}")]
    UnknownLiteral { atom: String },

    /// An operation invoked in a state that does not permit it.
    #[error("invalid call to {operation}: {reason}")]
    StateMisuse {
        operation: &'static str,
        reason: &'static str,
    },

    /// The engine reached a state that its invariants rule out.
    #[error("internal inconsistency: {reason}")]
    Inconsistent { reason: String },
}
