//! ferritin-featurizers
//!
//! - parse A3M alignments and pair them across the chains of a complex
//! - build sequence, MSA and template features for AlphaFold-style networks
//! - merge per-chain features into a multimer bundle and pad to fixed shapes
//! - CLI to featurize a FASTA query and plot MSA coverage
//!
pub mod a3m;
mod error;
pub mod features;
pub mod fixed_size;
pub mod multimer;
pub mod pairing;
pub mod pipeline;
pub mod templates;

pub use error::{FeatureError, Result};
pub use features::{FeatureDict, FeatureValue};
pub use multimer::{CropConfig, DroppedFeature};
pub use pipeline::{
    featurize, gather_inputs, generate_input_feature, AlignmentSearch, InputFeatures, ModelType,
    MsaMode, PairMode, PipelineConfig, PrecomputedAlignments,
};
pub use templates::{PrecomputedHits, TemplateFeatures, TemplateHit, TemplateSearch};
