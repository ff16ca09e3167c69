//! Error kinds shared by every stage of the RDLT -> Petri Net pipeline.

use thiserror::Error;

/// Failures that can be returned across the preprocessor, mapper and facade.
///
/// The behavioural analyser never returns an `Error`: a deadlocked or
/// non-terminating firing sequence is a valid observation, not a failure,
/// and is reported through [`crate::behavior::TerminationType`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("vertex `{0}` is not defined")]
    UnknownVertex(String),

    #[error("vertex `{0}` already exists")]
    DuplicateVertex(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid constraint on edge {from} -> {to}: {reason}")]
    InvalidConstraint {
        from: String,
        to: String,
        reason: String,
    },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Non-fatal conditions surfaced alongside a successful result.
///
/// `UnboundedReuse` is the only warning-class error kind named in the
/// specification: the preprocessor can still produce a (subsequently
/// unsound) Petri Net when it fires.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Warning {
    UnboundedReuse { rbs_center: String, path_from: String, path_to: String },
    Message(String),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnboundedReuse { rbs_center, path_from, path_to } => write!(
                f,
                "unbounded reuse computing eRU for abstract path {path_from} -> {path_to} in RBS `{rbs_center}`"
            ),
            Warning::Message(msg) => write!(f, "{msg}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
