use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("invalid pairing: neither paired nor unpaired alignments were provided")]
    InvalidPairing,

    #[error("alignment line {line} holds sequence data before any header")]
    MissingHeader { line: usize },

    #[error("MSA {0} must contain at least one sequence")]
    EmptyMsa(usize),

    #[error("expected {expected} alignment blocks, got {found}")]
    BlockCount { expected: usize, found: usize },

    #[error("no query record found")]
    NoQuery,

    #[error("no chains to merge")]
    NoChains,

    #[error("{0} chains exceed the available chain identifiers")]
    TooManyChains(usize),

    #[error("feature `{0}` is missing")]
    MissingFeature(String),

    #[error("feature `{name}` has the wrong type: expected {expected}")]
    FeatureType { name: String, expected: &'static str },

    #[error("feature `{name}`: cannot pad axis {axis} of size {size} down to {target}")]
    PadTooSmall {
        name: String,
        axis: usize,
        size: usize,
        target: usize,
    },

    #[error("feature `{name}` has rank {rank}, the shape schema expects {expected}")]
    SchemaRank {
        name: String,
        rank: usize,
        expected: usize,
    },

    #[error("feature `{0}` has no entry in the shape schema")]
    NotInSchema(String),

    #[error("could not read template structure {path}: {reason}")]
    TemplateStructure { path: String, reason: String },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}
