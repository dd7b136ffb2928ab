use super::{FeatureDict, FeatureValue};
use crate::a3m::Msa;
use crate::error::{FeatureError, Result};
use crate::templates::TemplateFeatures;
use ferritin_core::{hhblits_aa_to_id, restype_order_with_x, sequence_to_onehot, RESTYPE_NUM, UNKNOWN_RESTYPE};
use ndarray::{Array1, Array2};
use std::collections::HashSet;

/// Per-residue features of a single chain.
pub fn make_sequence_features(sequence: &str, description: &str, num_res: usize) -> FeatureDict {
    let aatype = sequence_to_onehot(
        sequence,
        |aa| Some(restype_order_with_x(aa)),
        RESTYPE_NUM + 1,
        Some(UNKNOWN_RESTYPE),
    );
    let mut features = FeatureDict::new();
    features.insert("aatype", FeatureValue::I64(aatype.into_dyn()));
    features.insert(
        "between_segment_residues",
        FeatureValue::I64(Array1::<i64>::zeros(num_res).into_dyn()),
    );
    features.insert("domain_name", FeatureValue::text(description));
    features.insert(
        "residue_index",
        FeatureValue::I64(Array1::from_iter(0..num_res as i64).into_dyn()),
    );
    features.insert(
        "seq_length",
        FeatureValue::I64(Array1::from_elem(num_res, num_res as i64).into_dyn()),
    );
    features.insert("sequence", FeatureValue::text(sequence));
    features
}

/// MSA features from one or more alignments of the same query.
///
/// With `dedup`, a row identical to an earlier one (in any of the alignments)
/// is dropped. Paired alignments keep every row so that row `i` of each chain
/// still refers to the same organism.
pub fn make_msa_features(msas: &[Msa], dedup: bool) -> Result<FeatureDict> {
    if let Some(idx) = msas.iter().position(Msa::is_empty) {
        return Err(FeatureError::EmptyMsa(idx));
    }
    let num_res = msas.first().map_or(0, Msa::width);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows: Vec<i64> = Vec::new();
    let mut deletions: Vec<i64> = Vec::new();
    let mut species: Vec<Option<String>> = Vec::new();
    for msa in msas {
        let identifiers = msa.species_identifiers();
        for (idx, sequence) in msa.sequences.iter().enumerate() {
            if dedup && !seen.insert(sequence.as_str()) {
                continue;
            }
            rows.extend(
                sequence
                    .chars()
                    .map(|aa| hhblits_aa_to_id(aa).unwrap_or(UNKNOWN_RESTYPE) as i64),
            );
            deletions.extend_from_slice(&msa.deletion_matrix[idx]);
            species.push(identifiers[idx].clone());
        }
    }

    let num_alignments = species.len();
    log::debug!("MSA features: {num_alignments} rows x {num_res} columns");
    let msa = Array2::from_shape_vec((num_alignments, num_res), rows)?;
    let deletion_matrix = Array2::from_shape_vec((num_alignments, num_res), deletions)?;

    let mut features = FeatureDict::new();
    features.insert("msa", FeatureValue::I64(msa.into_dyn()));
    features.insert(
        "deletion_matrix_int",
        FeatureValue::I64(deletion_matrix.into_dyn()),
    );
    features.insert(
        "num_alignments",
        FeatureValue::I64(Array1::from_elem(num_res, num_alignments as i64).into_dyn()),
    );
    features.insert("msa_species_identifiers", FeatureValue::Text(species));
    Ok(features)
}

/// Sequence, unpaired MSA and template features of one chain.
pub fn build_monomer_feature(
    sequence: &str,
    unpaired_a3m: &str,
    templates: TemplateFeatures,
) -> Result<FeatureDict> {
    let msa = Msa::parse(unpaired_a3m)?;
    let mut features = make_sequence_features(sequence, "none", sequence.chars().count());
    features.extend(make_msa_features(&[msa], true)?);
    features.extend(templates.into_feature_dict());
    Ok(features)
}

/// Paired MSA features of one chain, every key suffixed with `_all_seq`.
pub fn build_multimer_feature(paired_a3m: &str) -> Result<FeatureDict> {
    let msa = Msa::parse(paired_a3m)?;
    Ok(make_msa_features(&[msa], false)?
        .into_iter()
        .map(|(name, value)| (format!("{name}_all_seq"), value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sequence_features() {
        let features = make_sequence_features("MKX", "none", 3);
        let aatype = features.require_i64("aatype").unwrap();
        assert_eq!(aatype.shape(), &[3, 21]);
        assert_eq!(aatype[[0, 12]], 1); // M
        assert_eq!(aatype[[1, 11]], 1); // K
        assert_eq!(aatype[[2, 20]], 1); // X
        assert_eq!(
            features.require_i64("residue_index").unwrap(),
            &array![0i64, 1, 2].into_dyn()
        );
        assert_eq!(
            features.require_i64("seq_length").unwrap(),
            &array![3i64, 3, 3].into_dyn()
        );
        assert_eq!(
            features.require_text("sequence").unwrap(),
            &[Some("MKX".to_string())]
        );
    }

    #[test]
    fn test_msa_features_dedup() {
        let msa = Msa::parse(">q\nAC-\n>a\nAC-\n>tr|A0A146SKV9|A0A146SKV9_FUNHE\nAcD-").unwrap();
        let features = make_msa_features(&[msa.clone()], true).unwrap();
        let rows = features.require_i64("msa").unwrap();
        assert_eq!(rows, &array![[0i64, 1, 21], [0, 2, 21]].into_dyn());
        assert_eq!(
            features.require_i64("deletion_matrix_int").unwrap(),
            &array![[0i64, 0, 0], [0, 1, 0]].into_dyn()
        );
        assert_eq!(
            features.require_i64("num_alignments").unwrap(),
            &array![2i64, 2, 2].into_dyn()
        );
        assert_eq!(
            features.require_text("msa_species_identifiers").unwrap(),
            &[None, Some("FUNHE".to_string())]
        );

        let paired = make_msa_features(&[msa], false).unwrap();
        assert_eq!(paired.require("msa").unwrap().len(), 3);

        // insertions alone do not make a row distinct
        let insertions_only = Msa::parse(">q\nAC-\n>a\nAcC-").unwrap();
        let features = make_msa_features(&[insertions_only], true).unwrap();
        assert_eq!(features.require("msa").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_msa() {
        let empty = Msa::parse("").unwrap();
        assert!(matches!(
            make_msa_features(&[empty], true),
            Err(FeatureError::EmptyMsa(0))
        ));
    }

    #[test]
    fn test_multimer_feature_suffix() {
        let features = build_multimer_feature(">101\nMKT\n>101\nMKT").unwrap();
        assert!(features.contains_key("msa_all_seq"));
        assert!(features.contains_key("num_alignments_all_seq"));
        assert!(!features.contains_key("msa"));
        assert_eq!(features.require("msa_all_seq").unwrap().len(), 2);
    }

    #[test]
    fn test_monomer_feature_keys() {
        let templates = TemplateFeatures::mock(3, 1);
        let features = build_monomer_feature("MKT", ">101\nMKT", templates).unwrap();
        for key in [
            "aatype",
            "msa",
            "deletion_matrix_int",
            "template_aatype",
            "template_all_atom_masks",
            "template_domain_names",
        ] {
            assert!(features.contains_key(key), "{key}");
        }
    }
}
