//! # ferritin-core
//!
//! Shared building blocks for turning protein sequences into model inputs.
//!
//! __ferritin-core__ provides:
//! * residue and atom tables in the layouts AlphaFold-style networks expect
//! * one-hot encoding of sequences
//! * deduplication of query sets into unique sequences and copy counts
//!
//! The main entry point is [`UniqueQueries`], which every featurization
//! request starts from.
//!
mod info;
mod query;

pub use self::info::constants::{
    hhblits_aa_to_id, restype_order_with_x, sequence_to_onehot, standard_atom_mask, AAAtom,
    Residue, ATOM_TYPE_NUM, HHBLITS_CLASSES, MAP_HHBLITS_AATYPE_TO_OUR_AATYPE, MSA_GAP_IDX,
    PDB_CHAIN_IDS, RESTYPE_NUM, UNKNOWN_RESTYPE,
};
pub use self::query::UniqueQueries;
