//! Fixed-size padding
//!
//! The network is compiled for static shapes. A shape schema names, per
//! feature, which placeholder each axis stands for; [`make_fixed_size`] grows
//! every placeholder axis to its configured size.
use crate::error::{FeatureError, Result};
use crate::features::FeatureDict;
use std::collections::HashMap;

/// What an axis of a feature stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    NumRes,
    MsaSeq,
    ExtraSeq,
    Templates,
    /// Left at its current size.
    Fixed,
}

pub type ShapeSchema = HashMap<&'static str, Vec<Dim>>;

/// Target sizes for each placeholder. `None` leaves that axis alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedSizes {
    pub num_res: Option<usize>,
    pub msa_seq: Option<usize>,
    pub extra_seq: Option<usize>,
    pub num_templates: Option<usize>,
}

impl FixedSizes {
    fn target(&self, dim: Dim) -> Option<usize> {
        match dim {
            Dim::NumRes => self.num_res,
            Dim::MsaSeq => self.msa_seq,
            Dim::ExtraSeq => self.extra_seq,
            Dim::Templates => self.num_templates,
            Dim::Fixed => None,
        }
    }
}

/// Schema of the merged multimer bundle.
pub fn multimer_shape_schema() -> ShapeSchema {
    use Dim::*;
    HashMap::from([
        ("aatype", vec![NumRes]),
        ("residue_index", vec![NumRes]),
        ("msa", vec![MsaSeq, NumRes]),
        ("template_all_atom_positions", vec![Templates, NumRes, Fixed, Fixed]),
        ("template_all_atom_mask", vec![Templates, NumRes, Fixed]),
        ("template_aatype", vec![Templates, NumRes]),
        ("asym_id", vec![NumRes]),
        ("sym_id", vec![NumRes]),
        ("entity_id", vec![NumRes]),
        ("deletion_matrix", vec![MsaSeq, NumRes]),
        ("deletion_mean", vec![NumRes]),
        ("all_atom_mask", vec![NumRes, Fixed]),
        ("all_atom_positions", vec![NumRes, Fixed, Fixed]),
        ("entity_mask", vec![NumRes]),
        ("cluster_bias_mask", vec![MsaSeq]),
        ("bert_mask", vec![MsaSeq, NumRes]),
        ("seq_mask", vec![NumRes]),
        ("msa_mask", vec![MsaSeq, NumRes]),
        ("seq_length", vec![]),
        ("num_alignments", vec![]),
        ("assembly_num_chains", vec![]),
        ("num_templates", vec![]),
    ])
}

/// Schema of a monomer (or single pseudo-chain complex) bundle.
pub fn monomer_shape_schema() -> ShapeSchema {
    use Dim::*;
    HashMap::from([
        ("aatype", vec![NumRes, Fixed]),
        ("between_segment_residues", vec![NumRes]),
        ("residue_index", vec![NumRes]),
        ("seq_length", vec![NumRes]),
        ("asym_id", vec![NumRes]),
        ("msa", vec![MsaSeq, NumRes]),
        ("deletion_matrix_int", vec![MsaSeq, NumRes]),
        ("num_alignments", vec![NumRes]),
        ("template_all_atom_positions", vec![Templates, NumRes, Fixed, Fixed]),
        ("template_all_atom_masks", vec![Templates, NumRes, Fixed]),
        ("template_aatype", vec![Templates, NumRes, Fixed]),
        ("template_confidence_scores", vec![Templates, NumRes]),
        ("template_sum_probs", vec![Templates]),
    ])
}

/// Pad every numeric feature to the sizes its schema entry asks for.
///
/// Text features are left untouched. A numeric feature missing from the
/// schema, a rank mismatch, or an axis already longer than its target is an
/// error.
pub fn make_fixed_size(
    features: FeatureDict,
    schema: &ShapeSchema,
    sizes: &FixedSizes,
) -> Result<FeatureDict> {
    let mut out = FeatureDict::new();
    for (name, value) in features {
        if value.as_text().is_some() {
            out.insert(name, value);
            continue;
        }
        let dims = schema
            .get(name.as_str())
            .ok_or_else(|| FeatureError::NotInSchema(name.clone()))?;
        if dims.len() != value.ndim() {
            return Err(FeatureError::SchemaRank {
                name,
                rank: value.ndim(),
                expected: dims.len(),
            });
        }
        let mut value = value;
        for (axis, dim) in dims.iter().enumerate() {
            if let Some(target) = sizes.target(*dim) {
                value = value.pad_axis(&name, axis, target, 0.0)?;
            }
        }
        out.insert(name, value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use crate::templates::TemplateFeatures;
    use crate::features::build_monomer_feature;
    use ndarray::array;

    #[test]
    fn test_pad_monomer() {
        let features =
            build_monomer_feature("MKT", ">101\nMKT\n>a\nMRT", TemplateFeatures::mock(3, 1)).unwrap();
        let sizes = FixedSizes {
            num_res: Some(5),
            msa_seq: Some(4),
            num_templates: Some(4),
            ..Default::default()
        };
        let padded = make_fixed_size(features, &monomer_shape_schema(), &sizes).unwrap();
        assert_eq!(padded.require("aatype").unwrap().shape(), vec![5, 21]);
        assert_eq!(padded.require("msa").unwrap().shape(), vec![4, 5]);
        assert_eq!(
            padded.require("template_all_atom_positions").unwrap().shape(),
            vec![4, 5, 37, 3]
        );
        assert_eq!(
            padded.require_i64("residue_index").unwrap(),
            &array![0i64, 1, 2, 0, 0].into_dyn()
        );
        assert_eq!(padded.require("sequence").unwrap().len(), 1);
    }

    #[test]
    fn test_schema_errors() {
        let mut features = FeatureDict::new();
        features.insert("aatype", FeatureValue::I64(array![0i64, 1, 2].into_dyn()));
        let sizes = FixedSizes {
            num_res: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            make_fixed_size(features.clone(), &multimer_shape_schema(), &sizes),
            Err(FeatureError::PadTooSmall { .. })
        ));
        assert!(matches!(
            make_fixed_size(features.clone(), &monomer_shape_schema(), &sizes),
            Err(FeatureError::SchemaRank { .. })
        ));
        features.insert("unknown", FeatureValue::scalar_i64(1));
        assert!(matches!(
            make_fixed_size(features, &HashMap::new(), &FixedSizes::default()),
            Err(FeatureError::NotInSchema(_))
        ));
    }
}
