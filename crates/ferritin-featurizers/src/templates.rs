//! Template features
//!
//! Template hits are stacked into a `(T, L, ...)` bundle aligned to the query.
//! When there is nothing to stack, a mock template stands in: it carries no
//! atoms, so the network ignores it, but keeps every template key present.
use crate::error::{FeatureError, Result};
use crate::features::{FeatureDict, FeatureValue};
use bon::Builder;
use chrono::NaiveDate;
use ferritin_core::{hhblits_aa_to_id, sequence_to_onehot, AAAtom, Residue, ATOM_TYPE_NUM, HHBLITS_CLASSES};
use ndarray::{Array1, Array2, Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stacked features of `T` templates over a query of length `L`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFeatures {
    /// `(T, L, 37, 3)`
    pub all_atom_positions: Array4<f32>,
    /// `(T, L, 37)`
    pub all_atom_masks: Array3<f32>,
    /// HHblits one-hot, `(T, L, 22)`
    pub aatype: Array3<i64>,
    /// `(T, L)`
    pub confidence_scores: Array2<f32>,
    pub sequence: Vec<Option<String>>,
    pub domain_names: Vec<Option<String>>,
    pub release_date: Vec<Option<String>>,
    /// `(T,)`
    pub sum_probs: Array1<f32>,
}

impl TemplateFeatures {
    /// `num_temp` empty templates for a query of length `len`.
    pub fn mock(len: usize, num_temp: usize) -> Self {
        let onehot = sequence_to_onehot(&"A".repeat(len), hhblits_aa_to_id, HHBLITS_CLASSES, None);
        let aatype = onehot
            .broadcast((num_temp, len, HHBLITS_CLASSES))
            .map(|v| v.to_owned())
            .unwrap_or_else(|| Array3::zeros((num_temp, len, HHBLITS_CLASSES)));
        Self {
            all_atom_positions: Array4::zeros((num_temp, len, ATOM_TYPE_NUM, 3)),
            all_atom_masks: Array3::zeros((num_temp, len, ATOM_TYPE_NUM)),
            aatype,
            confidence_scores: Array2::ones((num_temp, len)),
            sequence: vec![None; num_temp],
            domain_names: vec![None; num_temp],
            release_date: vec![None; num_temp],
            sum_probs: Array1::zeros(num_temp),
        }
    }

    pub fn num_templates(&self) -> usize {
        self.all_atom_positions.len_of(Axis(0))
    }

    pub fn num_res(&self) -> usize {
        self.all_atom_positions.len_of(Axis(1))
    }

    /// Names of the real templates; mock entries have none.
    pub fn found_domain_names(&self) -> Vec<String> {
        self.domain_names.iter().flatten().cloned().collect()
    }

    pub fn into_feature_dict(self) -> FeatureDict {
        let mut features = FeatureDict::new();
        features.insert(
            "template_all_atom_positions",
            FeatureValue::F32(self.all_atom_positions.into_dyn()),
        );
        features.insert(
            "template_all_atom_masks",
            FeatureValue::F32(self.all_atom_masks.into_dyn()),
        );
        features.insert("template_aatype", FeatureValue::I64(self.aatype.into_dyn()));
        features.insert(
            "template_confidence_scores",
            FeatureValue::F32(self.confidence_scores.into_dyn()),
        );
        features.insert("template_sequence", FeatureValue::Text(self.sequence));
        features.insert("template_domain_names", FeatureValue::Text(self.domain_names));
        features.insert("template_release_date", FeatureValue::Text(self.release_date));
        features.insert(
            "template_sum_probs",
            FeatureValue::F32(self.sum_probs.into_dyn()),
        );
        features
    }
}

/// Mock template covering all `chains` end to end.
pub fn mk_mock_template<S: AsRef<str>>(chains: &[S], num_temp: usize) -> TemplateFeatures {
    let len = chains.iter().map(|c| c.as_ref().chars().count()).sum();
    TemplateFeatures::mock(len, num_temp)
}

/// A template search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateHit {
    /// `pdbid_chain`, e.g. `1abc_A`.
    pub name: String,
    pub sum_probs: f32,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Aligned `(query index, hit residue index)` pairs, both 0-based.
    pub aligned_cols: Vec<(usize, usize)>,
}

impl TemplateHit {
    pub fn pdb_id(&self) -> &str {
        self.name.split('_').next().unwrap_or(&self.name)
    }

    pub fn chain_id(&self) -> &str {
        self.name.split_once('_').map_or("A", |(_, chain)| chain)
    }
}

/// Template database search.
pub trait TemplateSearch {
    /// Hits for the query alignment `a3m` in the database under `template_path`.
    fn search(&self, a3m: &str, template_path: &Path) -> anyhow::Result<Vec<TemplateHit>>;
}

/// Hits computed ahead of time and stored as `hits.json` next to the structures.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedHits;

impl TemplateSearch for PrecomputedHits {
    fn search(&self, _a3m: &str, template_path: &Path) -> anyhow::Result<Vec<TemplateHit>> {
        let path = template_path.join("hits.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Turns search hits into template features using the structures in `mmcif_dir`.
#[derive(Debug, Clone, Builder)]
pub struct TemplateHitFeaturizer {
    #[builder(into)]
    mmcif_dir: PathBuf,
    #[builder(default = NaiveDate::from_ymd_opt(2100, 1, 1).unwrap_or(NaiveDate::MAX))]
    max_template_date: NaiveDate,
    #[builder(default = 20)]
    max_hits: usize,
}

struct FeaturizedHit {
    positions: Array3<f32>,
    masks: Array2<f32>,
    sequence: String,
    confidence: Array1<f32>,
}

impl TemplateHitFeaturizer {
    /// Best hits first, at most `max_hits`. The result may hold zero templates.
    pub fn get_templates(&self, query: &str, hits: &[TemplateHit]) -> Result<TemplateFeatures> {
        let num_res = query.chars().count();
        let mut sorted: Vec<&TemplateHit> = hits.iter().collect();
        sorted.sort_by(|a, b| b.sum_probs.total_cmp(&a.sum_probs));

        let mut kept: Vec<(&TemplateHit, FeaturizedHit)> = Vec::new();
        for hit in sorted {
            if kept.len() >= self.max_hits {
                break;
            }
            if hit.release_date.is_some_and(|d| d > self.max_template_date) {
                log::debug!("Template {} released after {}", hit.name, self.max_template_date);
                continue;
            }
            match self.featurize_hit(hit, num_res) {
                Ok(featurized) => kept.push((hit, featurized)),
                Err(e) => log::warn!("Skipping template {}: {e}", hit.name),
            }
        }

        let n = kept.len();
        let mut positions = Array4::zeros((n, num_res, ATOM_TYPE_NUM, 3));
        let mut masks = Array3::zeros((n, num_res, ATOM_TYPE_NUM));
        let mut aatype = Array3::zeros((n, num_res, HHBLITS_CLASSES));
        let mut confidence = Array2::zeros((n, num_res));
        let mut sequence = Vec::with_capacity(n);
        let mut domain_names = Vec::with_capacity(n);
        let mut release_date = Vec::with_capacity(n);
        let mut sum_probs = Array1::zeros(n);
        for (t, (hit, featurized)) in kept.into_iter().enumerate() {
            positions.index_axis_mut(Axis(0), t).assign(&featurized.positions);
            masks.index_axis_mut(Axis(0), t).assign(&featurized.masks);
            aatype.index_axis_mut(Axis(0), t).assign(&sequence_to_onehot(
                &featurized.sequence,
                hhblits_aa_to_id,
                HHBLITS_CLASSES,
                None,
            ));
            confidence.index_axis_mut(Axis(0), t).assign(&featurized.confidence);
            sequence.push(Some(featurized.sequence));
            domain_names.push(Some(hit.name.clone()));
            release_date.push(hit.release_date.map(|d| d.format("%Y-%m-%d").to_string()));
            sum_probs[t] = hit.sum_probs;
        }
        Ok(TemplateFeatures {
            all_atom_positions: positions,
            all_atom_masks: masks,
            aatype,
            confidence_scores: confidence,
            sequence,
            domain_names,
            release_date,
            sum_probs,
        })
    }

    fn structure_path(&self, pdb_id: &str) -> Option<PathBuf> {
        let lower = pdb_id.to_lowercase();
        ["cif", "pdb"]
            .iter()
            .flat_map(|ext| [format!("{pdb_id}.{ext}"), format!("{lower}.{ext}")])
            .map(|file| self.mmcif_dir.join(file))
            .find(|path| path.exists())
    }

    fn featurize_hit(&self, hit: &TemplateHit, num_res: usize) -> Result<FeaturizedHit> {
        let path = self
            .structure_path(hit.pdb_id())
            .ok_or_else(|| FeatureError::TemplateStructure {
                path: self.mmcif_dir.join(hit.pdb_id()).display().to_string(),
                reason: "no .cif or .pdb file".to_string(),
            })?;
        let structure_error = |reason: String| FeatureError::TemplateStructure {
            path: path.display().to_string(),
            reason,
        };
        let (pdb, _warnings) = pdbtbx::open(path.to_string_lossy()).map_err(|errors| {
            structure_error(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let chain = pdb
            .chains()
            .find(|c| c.id() == hit.chain_id())
            .ok_or_else(|| structure_error(format!("chain {} not found", hit.chain_id())))?;
        let residues: Vec<_> = chain.residues().collect();

        let mut positions = Array3::zeros((num_res, ATOM_TYPE_NUM, 3));
        let mut masks = Array2::zeros((num_res, ATOM_TYPE_NUM));
        let mut confidence = Array1::zeros(num_res);
        let mut sequence = vec!['-'; num_res];
        for &(query_idx, hit_idx) in &hit.aligned_cols {
            let (Some(residue), true) = (residues.get(hit_idx), query_idx < num_res) else {
                continue;
            };
            sequence[query_idx] = residue
                .name()
                .and_then(Residue::from_code3)
                .map_or('X', |r| r.code1());
            for atom in residue.atoms() {
                if let Some(slot) = AAAtom::from_name(atom.name()).to_index() {
                    let (x, y, z) = atom.pos();
                    positions[[query_idx, slot, 0]] = x as f32;
                    positions[[query_idx, slot, 1]] = y as f32;
                    positions[[query_idx, slot, 2]] = z as f32;
                    masks[[query_idx, slot]] = 1.0;
                }
            }
            confidence[query_idx] = 1.0;
        }

        Ok(FeaturizedHit {
            positions,
            masks,
            sequence: sequence.into_iter().collect(),
            confidence,
        })
    }
}

/// Template features for `query`, falling back to a mock when no hit survives.
pub fn mk_template(
    a3m: &str,
    template_path: &Path,
    query: &str,
    search: &dyn TemplateSearch,
    max_template_date: NaiveDate,
    max_hits: usize,
) -> Result<TemplateFeatures> {
    let hits = search.search(a3m, template_path)?;
    let featurizer = TemplateHitFeaturizer::builder()
        .mmcif_dir(template_path)
        .max_template_date(max_template_date)
        .max_hits(max_hits)
        .build();
    let features = featurizer.get_templates(query, &hits)?;
    if features.num_templates() == 0 {
        log::info!("No usable templates in {}", template_path.display());
        return Ok(TemplateFeatures::mock(query.chars().count(), 1));
    }
    Ok(features)
}
