use thiserror::Error;

/// Errors surfaced by the loaders and the solver's fallible surface.
///
/// Invariant violations inside the iteration protocol (dimension mismatch,
/// out-of-range labels, a worker skipping a collective) are programmer
/// errors and panic instead of showing up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is missing its leading dimension header")]
    MissingDimension,

    #[error("dataset declares dimension {dim}, which is not usable")]
    InvalidDimension { dim: i64 },

    #[error("unparsable value {token:?} in input stream")]
    BadToken { token: String },

    #[error("ragged dataset: trailing point has {got} of {dim} coordinates")]
    RaggedPoint { dim: usize, got: usize },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("requested {k} clusters for a dataset of {len} points")]
    KOutOfRange { k: usize, len: usize },

    #[error("{got} true labels for a dataset of {expected} points")]
    TrueLabelCount { got: usize, expected: usize },

    #[error("purity requires ground-truth labels, which were never set")]
    TrueLabelsNotSet,
}

pub type Result<T> = std::result::Result<T, Error>;
