//! Multimer feature processing
//!
//! Per-chain monomer bundles go through the following stages:
//!
//! 1. [`convert_monomer_features`]: multimer schema
//! 2. [`add_assembly_features`]: asym / sym / entity ids
//! 3. [`process_unmerged_features`]: per-chain derived features
//! 4. [`pad_paired_features`] and [`crop_chains`]: bound MSA and template sizes
//! 5. [`reconcile_feature_keys`]: drop keys not shared by every chain
//! 6. [`merge_chain_features`] and [`process_final`]: one assembly bundle
//! 7. [`pad_msa`]: minimum MSA depth
//!
//! [`process_multimer_features`] runs all of them.
use crate::error::{FeatureError, Result};
use crate::features::{FeatureDict, FeatureValue};
use crate::features::ops::argmax_last_axis;
use bon::Builder;
use ferritin_core::{standard_atom_mask, ATOM_TYPE_NUM, MAP_HHBLITS_AATYPE_TO_OUR_AATYPE, MSA_GAP_IDX};
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const MSA_FEATURES: [&str; 4] = ["msa", "msa_mask", "deletion_matrix", "deletion_matrix_int"];

pub const TEMPLATE_FEATURES: [&str; 3] = [
    "template_aatype",
    "template_all_atom_positions",
    "template_all_atom_mask",
];

pub const SEQ_FEATURES: [&str; 17] = [
    "residue_index",
    "aatype",
    "all_atom_positions",
    "all_atom_mask",
    "seq_mask",
    "between_segment_residues",
    "has_alt_locations",
    "has_hetatoms",
    "asym_id",
    "entity_id",
    "sym_id",
    "entity_mask",
    "deletion_mean",
    "prediction_atom_mask",
    "literature_positions",
    "atom_indices_to_group_indices",
    "rigid_group_default_frame",
];

pub const CHAIN_FEATURES: [&str; 2] = ["num_alignments", "seq_length"];

/// Features the multimer network consumes; everything else is filtered out.
pub const REQUIRED_FEATURES: [&str; 29] = [
    "aatype",
    "all_atom_mask",
    "all_atom_positions",
    "all_chains_entity_ids",
    "all_crops_all_chains_mask",
    "all_crops_all_chains_positions",
    "all_crops_all_chains_residue_ids",
    "assembly_num_chains",
    "asym_id",
    "bert_mask",
    "cluster_bias_mask",
    "deletion_matrix",
    "deletion_mean",
    "entity_id",
    "entity_mask",
    "mem_peak",
    "msa",
    "msa_mask",
    "num_alignments",
    "num_templates",
    "queue_size",
    "residue_index",
    "resolution",
    "seq_length",
    "seq_mask",
    "sym_id",
    "template_aatype",
    "template_all_atom_mask",
    "template_all_atom_positions",
];

const UNNECESSARY_LEADING_DIM_FEATS: [&str; 4] =
    ["sequence", "domain_name", "num_alignments", "seq_length"];

/// Filler used when growing or block-diagonalising an MSA feature.
fn msa_pad_value(name: &str) -> f64 {
    match base_name(name) {
        "msa" => MSA_GAP_IDX as f64,
        "msa_mask" => 1.0,
        _ => 0.0,
    }
}

/// Feature name without the `_all_seq` suffix.
fn base_name(name: &str) -> &str {
    name.split("_all_seq").next().unwrap_or(name)
}

fn is_paired(name: &str) -> bool {
    name.contains("_all_seq")
}

/// MSA and template size limits applied to every chain before merging.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct CropConfig {
    #[builder(default = 2048)]
    pub msa_crop_size: usize,
    /// Paired rows kept per chain; half of `msa_crop_size` when unset.
    pub paired_crop_size: Option<usize>,
    #[builder(default = 4)]
    pub max_templates: usize,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CropConfig {
    pub fn paired_crop_size(&self) -> usize {
        self.paired_crop_size.unwrap_or(self.msa_crop_size / 2)
    }
}

/// A feature removed during merging because some chains lack it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedFeature {
    pub name: String,
    /// Chains that did not carry the feature.
    pub missing_from: Vec<String>,
}

/// Chain label for a 1-based entity id: `1 -> A`, `26 -> Z`, `27 -> AA`.
pub fn int_id_to_str_id(num: usize) -> Option<String> {
    if num == 0 {
        return None;
    }
    let mut num = num as i64 - 1;
    let mut out = String::new();
    while num >= 0 {
        out.push((b'A' + (num % 26) as u8) as char);
        num = num / 26 - 1;
    }
    Some(out)
}

/// Reshape a monomer bundle into the multimer schema.
pub fn convert_monomer_features(features: FeatureDict, chain_id: &str) -> Result<FeatureDict> {
    let mut converted = FeatureDict::new();
    converted.insert("auth_chain_id", FeatureValue::text(chain_id));
    for (name, value) in features {
        let value = if UNNECESSARY_LEADING_DIM_FEATS.contains(&name.as_str()) {
            match value {
                FeatureValue::Text(t) => FeatureValue::Text(t.into_iter().take(1).collect()),
                numeric => FeatureValue::scalar_i64(numeric.first_i64().unwrap_or(0)),
            }
        } else if name == "aatype" || name == "template_aatype" {
            let onehot = value.as_i64().ok_or_else(|| FeatureError::FeatureType {
                name: name.clone(),
                expected: "i64",
            })?;
            let aatype = argmax_last_axis(onehot);
            if name == "template_aatype" {
                FeatureValue::I64(aatype.mapv(remap_hhblits))
            } else {
                FeatureValue::I64(aatype)
            }
        } else {
            value
        };
        let name = if name == "template_all_atom_masks" {
            "template_all_atom_mask".to_string()
        } else {
            name
        };
        converted.insert(name, value);
    }
    Ok(converted)
}

fn remap_hhblits(aa: i64) -> i64 {
    usize::try_from(aa)
        .ok()
        .and_then(|idx| MAP_HHBLITS_AATYPE_TO_OUR_AATYPE.get(idx).copied())
        .unwrap_or(aa)
}

/// Label chains by entity and copy and add `asym_id`, `sym_id` and `entity_id`.
///
/// Chains with the same sequence share an entity. Ids are 1-based; the
/// returned chains are grouped by entity and keyed `A_1`, `A_2`, `B_1`, ...
pub fn add_assembly_features(chains: Vec<(String, FeatureDict)>) -> Result<Vec<(String, FeatureDict)>> {
    let mut seq_to_entity: HashMap<String, usize> = HashMap::new();
    let mut grouped: BTreeMap<usize, Vec<FeatureDict>> = BTreeMap::new();
    for (_, features) in chains {
        let sequence = features
            .require_text("sequence")?
            .first()
            .cloned()
            .flatten()
            .unwrap_or_default();
        let next = seq_to_entity.len() + 1;
        let entity_id = *seq_to_entity.entry(sequence).or_insert(next);
        grouped.entry(entity_id).or_default().push(features);
    }

    let mut out = Vec::new();
    let mut asym_id = 1;
    for (entity_id, group) in grouped {
        let label = int_id_to_str_id(entity_id).ok_or(FeatureError::NoChains)?;
        for (sym_id, mut features) in (1..).zip(group) {
            let seq_length = features
                .require("seq_length")?
                .first_i64()
                .unwrap_or(0)
                .max(0) as usize;
            let filled = |v: i64| FeatureValue::I64(Array1::from_elem(seq_length, v).into_dyn());
            features.insert("asym_id", filled(asym_id));
            features.insert("sym_id", filled(sym_id));
            features.insert("entity_id", filled(entity_id as i64));
            out.push((format!("{label}_{sym_id}"), features));
            asym_id += 1;
        }
    }
    Ok(out)
}

/// Derived per-chain features: float deletion matrices, deletion mean,
/// residue atom masks and the entity mask.
pub fn process_unmerged_features(chains: &mut [(String, FeatureDict)]) -> Result<()> {
    let num_chains = chains.len() as i64;
    for (_, features) in chains.iter_mut() {
        for (from, to) in [
            ("deletion_matrix_int", "deletion_matrix"),
            ("deletion_matrix_int_all_seq", "deletion_matrix_all_seq"),
        ] {
            if let Some(value) = features.remove(from) {
                let as_float = value.to_f32().ok_or_else(|| FeatureError::FeatureType {
                    name: from.to_string(),
                    expected: "numeric",
                })?;
                features.insert(to, FeatureValue::F32(as_float));
            }
        }

        let deletion_matrix = features.require_f32("deletion_matrix")?;
        let num_res = deletion_matrix.shape().get(1).copied().unwrap_or(0);
        let deletion_mean = deletion_matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| ArrayD::zeros(IxDyn(&[num_res])));
        features.insert("deletion_mean", FeatureValue::F32(deletion_mean));

        let aatype = features.require_i64("aatype")?;
        let mut all_atom_mask = Array2::<f32>::zeros((aatype.len(), ATOM_TYPE_NUM));
        for (mut row, &restype) in all_atom_mask.rows_mut().into_iter().zip(aatype.iter()) {
            row.assign(&Array1::from(standard_atom_mask(restype.max(0) as usize).to_vec()));
        }
        let num_res = aatype.len();
        features.insert("all_atom_mask", FeatureValue::F32(all_atom_mask.into_dyn()));
        features.insert(
            "all_atom_positions",
            FeatureValue::F32(ArrayD::zeros(IxDyn(&[num_res, ATOM_TYPE_NUM, 3]))),
        );
        features.insert("assembly_num_chains", FeatureValue::scalar_i64(num_chains));
    }
    for (_, features) in chains.iter_mut() {
        let entity_mask = features.require_i64("entity_id")?.mapv(|e| i64::from(e != 0));
        features.insert("entity_mask", FeatureValue::I64(entity_mask));
    }
    Ok(())
}

/// Append one padding row to the paired MSA features and record how many
/// paired rows the chain had before padding.
pub fn pad_paired_features(features: &mut FeatureDict) -> Result<()> {
    let num_paired = features.require("msa_all_seq")?.len();
    let names: Vec<String> = features
        .keys()
        .filter(|k| k.ends_with("_all_seq"))
        .cloned()
        .collect();
    for name in names {
        let value = features.require(&name)?;
        let padded = match name.as_str() {
            "msa_all_seq"
            | "msa_mask_all_seq"
            | "deletion_matrix_all_seq"
            | "deletion_matrix_int_all_seq" => {
                value.pad_axis(&name, 0, value.len() + 1, msa_pad_value(&name))?
            }
            "msa_species_identifiers_all_seq" => {
                let mut species = features.require_text(&name)?.to_vec();
                species.push(Some(String::new()));
                FeatureValue::Text(species)
            }
            _ => continue,
        };
        features.insert(name, padded);
    }
    features.insert("num_alignments_all_seq", FeatureValue::scalar_i64(num_paired as i64));
    Ok(())
}

fn scalar(features: &FeatureDict, name: &str) -> Result<usize> {
    let value = features.require(name)?;
    value
        .first_i64()
        .map(|v| v.max(0) as usize)
        .ok_or_else(|| FeatureError::FeatureType {
            name: name.to_string(),
            expected: "numeric",
        })
}

/// Crop one chain's MSA and template stacks, keeping the first rows.
pub fn crop_single_chain(
    features: &mut FeatureDict,
    crop: &CropConfig,
    pair_msa_sequences: bool,
) -> Result<()> {
    let msa_size = scalar(features, "num_alignments")?;
    let mut paired_crop = None;
    let msa_crop = if pair_msa_sequences {
        let paired_size = scalar(features, "num_alignments_all_seq")?;
        let crop_all_seq = paired_size.min(crop.paired_crop_size());
        let msa_all_seq = features.require_i64("msa_all_seq")?;
        let non_gapped_pairs = msa_all_seq
            .outer_iter()
            .take(crop_all_seq)
            .filter(|row| row.iter().any(|&aa| aa != MSA_GAP_IDX))
            .count()
            .min(crop_all_seq);
        paired_crop = Some(crop_all_seq);
        msa_size.min(crop.msa_crop_size.saturating_sub(non_gapped_pairs))
    } else {
        msa_size.min(crop.msa_crop_size)
    };

    let template_crop = match features.get("template_aatype") {
        Some(aatype) if crop.max_templates > 0 => Some(aatype.len().min(crop.max_templates)),
        _ => None,
    };

    let names: Vec<String> = features.keys().cloned().collect();
    for name in names {
        let base = base_name(&name);
        let keep = if TEMPLATE_FEATURES.contains(&base) {
            template_crop
        } else if MSA_FEATURES.contains(&base) {
            match paired_crop {
                Some(paired) if is_paired(&name) => Some(paired),
                _ => Some(msa_crop),
            }
        } else {
            None
        };
        if let (Some(n), Some(value)) = (keep, features.get(&name)) {
            let cropped = value.crop_leading(n);
            features.insert(name, cropped);
        }
    }

    features.insert("num_alignments", FeatureValue::scalar_i64(msa_crop as i64));
    if let Some(n) = template_crop {
        features.insert("num_templates", FeatureValue::scalar_i64(n as i64));
    }
    if let Some(n) = paired_crop {
        features.insert("num_alignments_all_seq", FeatureValue::scalar_i64(n as i64));
    }
    Ok(())
}

pub fn crop_chains(
    chains: &mut [(String, FeatureDict)],
    crop: &CropConfig,
    pair_msa_sequences: bool,
) -> Result<()> {
    for (_, features) in chains.iter_mut() {
        crop_single_chain(features, crop, pair_msa_sequences)?;
    }
    Ok(())
}

/// Keep only the features every chain has; report and log the rest.
pub fn reconcile_feature_keys(chains: &mut [(String, FeatureDict)]) -> Vec<DroppedFeature> {
    let mut all_keys: Vec<String> = chains
        .iter()
        .flat_map(|(_, f)| f.keys().cloned())
        .collect();
    all_keys.sort();
    all_keys.dedup();

    let mut dropped = Vec::new();
    for name in all_keys {
        let missing_from: Vec<String> = chains
            .iter()
            .filter(|(_, f)| !f.contains_key(&name))
            .map(|(chain, _)| chain.clone())
            .collect();
        if missing_from.is_empty() {
            continue;
        }
        log::warn!(
            "Dropping feature `{name}`: missing from chain(s) {}",
            missing_from.join(", ")
        );
        for (_, features) in chains.iter_mut() {
            features.remove(&name);
        }
        dropped.push(DroppedFeature { name, missing_from });
    }
    dropped
}

fn pad_templates(chains: &mut [FeatureDict], max_templates: usize) -> Result<()> {
    for features in chains.iter_mut() {
        for name in TEMPLATE_FEATURES {
            if let Some(value) = features.get(name) {
                let padded = value.pad_axis(name, 0, max_templates, 0.0)?;
                features.insert(name, padded);
            }
        }
    }
    Ok(())
}

fn merge_features_from_multiple_chains(
    chains: &[FeatureDict],
    pair_msa_sequences: bool,
) -> Result<FeatureDict> {
    let first = chains.first().ok_or(FeatureError::NoChains)?;
    let mut merged = FeatureDict::new();
    for name in first.keys() {
        let feats = chains
            .iter()
            .map(|c| c.require(name))
            .collect::<Result<Vec<_>>>()?;
        let base = base_name(name);
        let value = if MSA_FEATURES.contains(&base) {
            if pair_msa_sequences || is_paired(name) {
                FeatureValue::concatenate(name, &feats, 1)?
            } else {
                FeatureValue::block_diag(name, &feats, msa_pad_value(name))?
            }
        } else if SEQ_FEATURES.contains(&base) {
            FeatureValue::concatenate(name, &feats, 0)?
        } else if TEMPLATE_FEATURES.contains(&base) {
            FeatureValue::concatenate(name, &feats, 1)?
        } else if CHAIN_FEATURES.contains(&base) {
            FeatureValue::sum_scalars(name, &feats)?
        } else {
            feats[0].clone()
        };
        merged.insert(name.clone(), value);
    }
    Ok(merged)
}

/// Merge copies of the same entity column-wise, one bundle per entity in id order.
fn merge_homomers_dense_msa(chains: Vec<FeatureDict>) -> Result<Vec<FeatureDict>> {
    let mut entities: BTreeMap<i64, Vec<FeatureDict>> = BTreeMap::new();
    for features in chains {
        let entity_id = features
            .require("entity_id")?
            .first_i64()
            .unwrap_or(0);
        entities.entry(entity_id).or_default().push(features);
    }
    entities
        .values()
        .map(|group| merge_features_from_multiple_chains(group, true))
        .collect()
}

fn concatenate_paired_and_unpaired(example: &mut FeatureDict) -> Result<()> {
    for name in MSA_FEATURES {
        let paired_name = format!("{name}_all_seq");
        if let (Some(unpaired), Some(paired)) = (example.get(name), example.get(&paired_name)) {
            let merged = FeatureValue::concatenate(name, &[paired, unpaired], 0)?;
            example.insert(name, merged);
        }
    }
    Ok(())
}

fn ones_block(value: &FeatureValue) -> FeatureValue {
    FeatureValue::F32(ArrayD::ones(IxDyn(&value.shape())))
}

fn correct_post_merged_feats(
    example: &mut FeatureDict,
    chains: &[FeatureDict],
    pair_msa_sequences: bool,
) -> Result<()> {
    let num_res = example.require("aatype")?.len();
    let num_rows = example.require("msa")?.len();
    example.insert("seq_length", FeatureValue::scalar_i64(num_res as i64));
    example.insert("num_alignments", FeatureValue::scalar_i64(num_rows as i64));

    let msa_masks = chains
        .iter()
        .map(|c| c.require("msa").map(ones_block))
        .collect::<Result<Vec<_>>>()?;
    let msa_mask_refs: Vec<&FeatureValue> = msa_masks.iter().collect();
    let block_mask = FeatureValue::block_diag("bert_mask", &msa_mask_refs, 0.0)?;

    if pair_msa_sequences {
        let mut cluster_bias_mask = Array1::<f32>::zeros(num_rows);
        if let Some(first) = cluster_bias_mask.first_mut() {
            *first = 1.0;
        }
        example.insert("cluster_bias_mask", FeatureValue::F32(cluster_bias_mask.into_dyn()));

        let paired_masks = chains
            .iter()
            .map(|c| c.require("msa_all_seq").map(ones_block))
            .collect::<Result<Vec<_>>>()?;
        let paired_refs: Vec<&FeatureValue> = paired_masks.iter().collect();
        let paired_mask = FeatureValue::concatenate("bert_mask", &paired_refs, 1)?;
        example.insert(
            "bert_mask",
            FeatureValue::concatenate("bert_mask", &[&paired_mask, &block_mask], 0)?,
        );
    } else {
        let mut cluster_bias_mask = Vec::with_capacity(num_rows);
        for chain in chains {
            let rows = chain.require("msa")?.len();
            cluster_bias_mask.extend((0..rows).map(|i| if i == 0 { 1.0f32 } else { 0.0 }));
        }
        example.insert(
            "cluster_bias_mask",
            FeatureValue::F32(Array1::from(cluster_bias_mask).into_dyn()),
        );
        example.insert("bert_mask", block_mask);
    }
    Ok(())
}

/// Merge per-chain bundles into one assembly bundle.
///
/// Unpaired MSAs of different entities are stacked block-diagonally; with
/// pairing, the paired rows are placed on top.
pub fn merge_chain_features(
    chains: Vec<FeatureDict>,
    pair_msa_sequences: bool,
    max_templates: usize,
) -> Result<FeatureDict> {
    let mut chains = chains;
    pad_templates(&mut chains, max_templates)?;
    let entities = merge_homomers_dense_msa(chains)?;
    let mut example = merge_features_from_multiple_chains(&entities, false)?;
    if pair_msa_sequences {
        concatenate_paired_and_unpaired(&mut example)?;
    }
    correct_post_merged_feats(&mut example, &entities, pair_msa_sequences)?;
    Ok(example)
}

/// Remap the MSA to the network residue order, add sequence and MSA masks,
/// and keep only the features the network consumes.
pub fn process_final(mut example: FeatureDict) -> Result<FeatureDict> {
    let msa = example.require_i64("msa")?.mapv(remap_hhblits);
    example.insert("msa", FeatureValue::I64(msa));

    let seq_mask = example
        .require_i64("entity_id")?
        .mapv(|e| if e > 0 { 1.0f32 } else { 0.0 });
    let msa_shape = example.require("msa")?.shape();
    let msa_mask = ArrayD::<f32>::ones(IxDyn(&msa_shape)) * &seq_mask.view().insert_axis(Axis(0));
    example.insert("seq_mask", FeatureValue::F32(seq_mask));
    example.insert("msa_mask", FeatureValue::F32(msa_mask));

    example.retain(|name, _| REQUIRED_FEATURES.contains(&name));
    Ok(example)
}

/// Grow the MSA row features with zeros to at least `min_num_seq` rows.
pub fn pad_msa(mut example: FeatureDict, min_num_seq: usize) -> Result<FeatureDict> {
    let num_seq = example.require("msa")?.len();
    if num_seq >= min_num_seq {
        return Ok(example);
    }
    for name in ["msa", "deletion_matrix", "bert_mask", "msa_mask", "cluster_bias_mask"] {
        if let Some(value) = example.get(name) {
            let padded = value.pad_axis(name, 0, min_num_seq, 0.0)?;
            example.insert(name, padded);
        }
    }
    Ok(example)
}

/// More than one distinct entity means there is something to pair.
pub fn pair_msa_sequences(chains: &[(String, FeatureDict)]) -> Result<bool> {
    let mut entities = Vec::new();
    for (_, features) in chains {
        entities.extend(features.require_i64("entity_id")?.iter().copied());
    }
    entities.sort_unstable();
    entities.dedup();
    Ok(entities.len() > 1)
}

/// Run the full multimer pipeline over per-chain bundles keyed by chain id.
pub fn process_multimer_features(
    features_for_chain: Vec<(String, FeatureDict)>,
    crop: &CropConfig,
    min_msa_rows: usize,
) -> Result<(FeatureDict, Vec<DroppedFeature>)> {
    if features_for_chain.is_empty() {
        return Err(FeatureError::NoChains);
    }
    let converted = features_for_chain
        .into_iter()
        .map(|(chain_id, features)| {
            convert_monomer_features(features, &chain_id).map(|f| (chain_id, f))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut chains = add_assembly_features(converted)?;
    process_unmerged_features(&mut chains)?;

    let pair = pair_msa_sequences(&chains)?;
    log::debug!(
        "Merging {} chains, pairing {}",
        chains.len(),
        if pair { "enabled" } else { "skipped" }
    );
    for (_, features) in chains.iter_mut() {
        pad_paired_features(features)?;
    }
    crop_chains(&mut chains, crop, pair)?;
    let dropped = reconcile_feature_keys(&mut chains);

    let merged = merge_chain_features(
        chains.into_iter().map(|(_, f)| f).collect(),
        pair,
        crop.max_templates,
    )?;
    let example = pad_msa(process_final(merged)?, min_msa_rows)?;
    Ok((example, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_monomer_feature, build_multimer_feature};
    use crate::templates::TemplateFeatures;

    fn chain(sequence: &str, unpaired: &str, paired: &str) -> FeatureDict {
        let len = sequence.len();
        let mut features =
            build_monomer_feature(sequence, unpaired, TemplateFeatures::mock(len, 1)).unwrap();
        features.extend(build_multimer_feature(paired).unwrap());
        features
    }

    #[test]
    fn test_int_id_to_str_id() {
        assert_eq!(int_id_to_str_id(0), None);
        assert_eq!(int_id_to_str_id(1).as_deref(), Some("A"));
        assert_eq!(int_id_to_str_id(26).as_deref(), Some("Z"));
        assert_eq!(int_id_to_str_id(27).as_deref(), Some("AA"));
    }

    #[test]
    fn test_convert_monomer_features() {
        let features = chain("MKT", ">101\nMKT", ">101\nMKT");
        let converted = convert_monomer_features(features, "A").unwrap();
        assert_eq!(
            converted.require_i64("aatype").unwrap(),
            &ndarray::array![12i64, 11, 16].into_dyn()
        );
        assert_eq!(converted.require("seq_length").unwrap().shape(), Vec::<usize>::new());
        assert_eq!(converted.require("template_aatype").unwrap().shape(), vec![1, 3]);
        // mock templates are all alanine
        assert!(converted
            .require_i64("template_aatype")
            .unwrap()
            .iter()
            .all(|&aa| aa == 0));
        assert!(converted.contains_key("template_all_atom_mask"));
        assert!(!converted.contains_key("template_all_atom_masks"));
    }

    #[test]
    fn test_assembly_ids() {
        let chains = vec![
            ("A".to_string(), chain("MK", ">101\nMK", ">101\nMK")),
            ("B".to_string(), chain("GSS", ">102\nGSS", ">102\nGSS")),
            ("C".to_string(), chain("MK", ">101\nMK", ">101\nMK")),
        ];
        let converted = chains
            .into_iter()
            .map(|(id, f)| (id.clone(), convert_monomer_features(f, &id).unwrap()))
            .collect();
        let assembled = add_assembly_features(converted).unwrap();
        let labels: Vec<&str> = assembled.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["A_1", "A_2", "B_1"]);
        let ids = |i: usize, name: &str| assembled[i].1.require_i64(name).unwrap().clone();
        assert_eq!(ids(1, "asym_id"), ndarray::array![2i64, 2].into_dyn());
        assert_eq!(ids(1, "sym_id"), ndarray::array![2i64, 2].into_dyn());
        assert_eq!(ids(2, "entity_id"), ndarray::array![2i64, 2, 2].into_dyn());
        assert_eq!(ids(2, "asym_id"), ndarray::array![3i64, 3, 3].into_dyn());
    }

    #[test]
    fn test_crop_keeps_first_rows() {
        let rows: String = (0..1000).map(|i| format!(">{i}\nMKT\n")).collect();
        let mut features = convert_monomer_features(chain("MKT", &rows, ">101\nMKT"), "A").unwrap();
        // unpaired rows are deduplicated; rebuild the stack with distinct rows
        let msa = ndarray::Array2::from_shape_fn((1000, 3), |(i, j)| ((i + j) % 20) as i64);
        features.insert("msa", FeatureValue::I64(msa.clone().into_dyn()));
        features.insert("num_alignments", FeatureValue::scalar_i64(1000));
        let crop = CropConfig::builder().msa_crop_size(512).build();
        crop_single_chain(&mut features, &crop, false).unwrap();
        let cropped = features.require_i64("msa").unwrap();
        assert_eq!(cropped.shape(), &[512, 3]);
        assert_eq!(cropped, &msa.slice(ndarray::s![..512, ..]).to_owned().into_dyn());
        assert_eq!(features.require("num_alignments").unwrap().first_i64(), Some(512));
    }

    #[test]
    fn test_paired_crop_budget() {
        let mut features = convert_monomer_features(
            chain("MK", ">101\nMK\n>a\nMR\n>b\nLK", ">101\nMK\n>x\n--\n>y\nMR"),
            "A",
        )
        .unwrap();
        pad_paired_features(&mut features).unwrap();
        assert_eq!(features.require("msa_all_seq").unwrap().len(), 4);
        assert_eq!(features.require("num_alignments_all_seq").unwrap().first_i64(), Some(3));

        let crop = CropConfig::builder().msa_crop_size(4).build();
        crop_single_chain(&mut features, &crop, true).unwrap();
        // two paired rows are kept, one of which is all gaps
        assert_eq!(features.require("msa_all_seq").unwrap().len(), 2);
        assert_eq!(features.require("msa").unwrap().len(), 3);
        assert_eq!(features.require("num_alignments").unwrap().first_i64(), Some(3));
    }

    #[test]
    fn test_reconcile_reports_dropped_keys() {
        let mut a = FeatureDict::new();
        a.insert("msa", FeatureValue::scalar_i64(0));
        a.insert("extra", FeatureValue::scalar_i64(0));
        let mut b = FeatureDict::new();
        b.insert("msa", FeatureValue::scalar_i64(0));
        let mut chains = vec![("A_1".to_string(), a), ("B_1".to_string(), b)];
        let dropped = reconcile_feature_keys(&mut chains);
        assert_eq!(
            dropped,
            vec![DroppedFeature {
                name: "extra".into(),
                missing_from: vec!["B_1".into()]
            }]
        );
        assert!(!chains[0].1.contains_key("extra"));
    }

    #[test]
    fn test_homomer_merge() {
        let unpaired = ">101\nMKT\n>a\nMRT\n>b\nLKT";
        let chains = vec![
            ("A".to_string(), chain("MKT", unpaired, ">101\nMKT")),
            ("B".to_string(), chain("MKT", unpaired, ">102\nMKT")),
        ];
        let (features, dropped) =
            process_multimer_features(chains, &CropConfig::default(), 512).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(features.require("num_alignments").unwrap().first_i64(), Some(3));
        assert_eq!(features.require("seq_length").unwrap().first_i64(), Some(6));
        assert_eq!(features.require("msa").unwrap().shape(), vec![512, 6]);
        assert_eq!(features.require("bert_mask").unwrap().shape(), vec![512, 6]);
        assert_eq!(features.require("cluster_bias_mask").unwrap().len(), 512);
        assert_eq!(
            features.require_i64("asym_id").unwrap(),
            &ndarray::array![1i64, 1, 1, 2, 2, 2].into_dyn()
        );
        assert_eq!(
            features.require("template_aatype").unwrap().shape(),
            vec![4, 6]
        );
        assert_eq!(features.require("num_templates").unwrap().first_i64(), Some(1));
        assert!(!features.contains_key("msa_all_seq"));
        // first row is the query, remapped to the network order
        let msa = features.require_i64("msa").unwrap();
        assert_eq!(msa[[0, 0]], 12);
        assert_eq!(msa[[0, 3]], 12);
    }

    #[test]
    fn test_heteromer_merge_puts_paired_rows_first() {
        let chains = vec![
            ("A".to_string(), chain("MK", ">101\nMK\n>a\nMR", ">101\nMK\n>p\nMR")),
            ("B".to_string(), chain("GSS", ">102\nGSS", ">102\nGSS\n>q\nGAS")),
        ];
        let (features, _) =
            process_multimer_features(chains, &CropConfig::default(), 0).unwrap();
        // the padding row falls outside the paired crop; 2 paired rows, then
        // the block-diagonal unpaired rows of both chains
        assert_eq!(features.require("msa").unwrap().shape(), vec![2 + 3, 5]);
        assert_eq!(features.require("num_alignments").unwrap().first_i64(), Some(5));
        let bias = features.require_f32("cluster_bias_mask").unwrap();
        assert_eq!(bias[[0]], 1.0);
        assert_eq!(bias.sum(), 1.0);
        let msa = features.require_i64("msa").unwrap();
        // unpaired row of chain B has gaps over chain A's columns
        assert_eq!(msa[[4, 0]], MSA_GAP_IDX);
        assert_eq!(msa[[4, 2]], 7);
        assert_eq!(
            features.require_i64("entity_id").unwrap(),
            &ndarray::array![1i64, 1, 2, 2, 2].into_dyn()
        );
    }

    #[test]
    fn test_heteromer_deletions_stay_on_their_chain() {
        let chains = vec![
            (
                "A".to_string(),
                chain("MK", ">101\nMK\n>a\nMkR", ">101\nMK\n>p\nMR"),
            ),
            (
                "B".to_string(),
                chain("GSS", ">102\nGSS\n>b\nGAS", ">102\nGSS\n>q\nGAS"),
            ),
        ];
        let (features, _) =
            process_multimer_features(chains, &CropConfig::default(), 0).unwrap();
        // 2 paired rows, then chain A rows 2..4 and chain B rows 4..6
        let deletions = features.require_f32("deletion_matrix").unwrap();
        assert_eq!(deletions.shape(), &[6, 5]);
        assert_eq!(deletions[[3, 1]], 1.0);
        assert_eq!(deletions.sum(), 1.0);
        let deletions = deletions.view().into_dimensionality::<ndarray::Ix2>().unwrap();
        assert!(deletions.slice(ndarray::s![2..4, 2..5]).iter().all(|v| *v == 0.0));
        assert!(deletions.slice(ndarray::s![4..6, 0..2]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_msa_pad_values() {
        assert_eq!(msa_pad_value("msa"), 21.0);
        assert_eq!(msa_pad_value("msa_all_seq"), 21.0);
        assert_eq!(msa_pad_value("msa_mask"), 1.0);
        assert_eq!(msa_pad_value("deletion_matrix"), 0.0);
        assert_eq!(msa_pad_value("deletion_matrix_int_all_seq"), 0.0);
    }
}
