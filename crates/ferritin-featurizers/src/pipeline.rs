//! Featurization pipeline
//!
//! [`gather_inputs`] deduplicates the query set, fetches alignments and
//! templates through the search collaborators, and [`generate_input_feature`]
//! turns them into the bundle for the chosen model type.
use crate::error::{FeatureError, Result};
use crate::features::{build_monomer_feature, build_multimer_feature, FeatureDict, FeatureValue};
use crate::fixed_size::{make_fixed_size, monomer_shape_schema, multimer_shape_schema, FixedSizes};
use crate::multimer::{process_multimer_features, CropConfig, DroppedFeature};
use crate::pairing::{msa_to_str, pair_msa};
use crate::templates::{mk_mock_template, mk_template, TemplateFeatures, TemplateSearch};
use bon::Builder;
use chrono::NaiveDate;
use ferritin_core::{UniqueQueries, PDB_CHAIN_IDS};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum MsaMode {
    #[default]
    #[strum(serialize = "mmseqs2_uniref_env")]
    #[serde(rename = "mmseqs2_uniref_env")]
    Mmseqs2UnirefEnv,
    #[strum(serialize = "mmseqs2_uniref")]
    #[serde(rename = "mmseqs2_uniref")]
    Mmseqs2Uniref,
    #[strum(serialize = "single_sequence")]
    #[serde(rename = "single_sequence")]
    SingleSequence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PairMode {
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Off,
    Unpaired,
    Paired,
    #[default]
    UnpairedPaired,
}

impl PairMode {
    fn wants_unpaired(self) -> bool {
        matches!(self, PairMode::Off | PairMode::Unpaired | PairMode::UnpairedPaired)
    }

    fn wants_paired(self) -> bool {
        matches!(self, PairMode::Paired | PairMode::UnpairedPaired)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum ModelType {
    #[strum(serialize = "alphafold2")]
    #[serde(rename = "alphafold2")]
    AlphaFold2,
    #[default]
    #[strum(serialize = "alphafold2_ptm")]
    #[serde(rename = "alphafold2_ptm")]
    AlphaFold2Ptm,
    #[strum(serialize = "alphafold2_multimer_v1")]
    #[serde(rename = "alphafold2_multimer_v1")]
    MultimerV1,
    #[strum(serialize = "alphafold2_multimer_v2")]
    #[serde(rename = "alphafold2_multimer_v2")]
    MultimerV2,
    #[strum(serialize = "alphafold2_multimer_v3")]
    #[serde(rename = "alphafold2_multimer_v3")]
    MultimerV3,
}

impl ModelType {
    pub fn is_multimer(self) -> bool {
        matches!(
            self,
            ModelType::MultimerV1 | ModelType::MultimerV2 | ModelType::MultimerV3
        )
    }
}

fn default_max_template_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2100, 1, 1).unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[builder(default)]
    pub msa_mode: MsaMode,
    #[builder(default)]
    pub pair_mode: PairMode,
    #[builder(default)]
    pub model_type: ModelType,
    #[builder(default)]
    pub use_templates: bool,
    /// Template directory used for every sequence instead of the search results.
    pub custom_template_path: Option<PathBuf>,
    #[builder(default)]
    pub use_pairwise: bool,
    #[builder(default)]
    pub crop: CropConfig,
    #[builder(default = 512)]
    pub min_msa_rows: usize,
    #[builder(default = 20)]
    pub max_template_hits: usize,
    #[builder(default = default_max_template_date())]
    pub max_template_date: NaiveDate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What to ask the alignment search for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub use_env: bool,
    pub use_pairing: bool,
    pub use_pairwise: bool,
    pub use_templates: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// One A3M block per requested sequence.
    pub a3m: Vec<String>,
    /// Per-sequence template directories, when templates were requested.
    pub template_paths: Option<Vec<Option<PathBuf>>>,
}

/// Remote MSA search.
pub trait AlignmentSearch {
    fn search(&self, sequences: &[String], request: &SearchRequest) -> anyhow::Result<SearchResponse>;
}

/// Alignments stored on disk, one file per unique sequence.
///
/// `msa_{i}.a3m` holds the unpaired block of sequence `i`, `pair_{i}.a3m`
/// the paired one and `templates_{i}/` its template database. A missing
/// alignment degrades to the query sequence alone.
#[derive(Debug, Clone)]
pub struct PrecomputedAlignments {
    dir: PathBuf,
}

impl PrecomputedAlignments {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl AlignmentSearch for PrecomputedAlignments {
    fn search(&self, sequences: &[String], request: &SearchRequest) -> anyhow::Result<SearchResponse> {
        let prefix = if request.use_pairing { "pair" } else { "msa" };
        let mut a3m = Vec::with_capacity(sequences.len());
        for (i, sequence) in sequences.iter().enumerate() {
            let path = self.dir.join(format!("{prefix}_{i}.a3m"));
            if path.exists() {
                a3m.push(std::fs::read_to_string(&path)?);
            } else {
                log::info!("No alignment at {}, using the query only", path.display());
                a3m.push(format!(">{}\n{sequence}\n", 101 + i));
            }
        }
        let template_paths = request.use_templates.then(|| {
            (0..sequences.len())
                .map(|i| Some(self.dir.join(format!("templates_{i}"))).filter(|p| p.is_dir()))
                .collect()
        });
        Ok(SearchResponse { a3m, template_paths })
    }
}

/// Everything fetched for a request before feature generation.
#[derive(Debug, Clone)]
pub struct GatheredInputs {
    pub queries: UniqueQueries,
    pub unpaired: Option<Vec<String>>,
    pub paired: Option<Vec<String>>,
    pub templates: Vec<TemplateFeatures>,
}

impl GatheredInputs {
    /// The alignments as one A3M, with a `#lengths\tcardinalities` header line.
    pub fn to_a3m(&self) -> Result<String> {
        msa_to_str(
            self.unpaired.as_deref(),
            self.paired.as_deref(),
            self.queries.sequences(),
            self.queries.cardinality(),
        )
    }
}

fn placeholder(index: usize, sequence: &str) -> String {
    format!(">{}\n{sequence}", 101 + index)
}

/// Deduplicate `queries` and fetch their alignments and templates.
pub fn gather_inputs<S: AsRef<str>>(
    queries: &[S],
    config: &PipelineConfig,
    search: &dyn AlignmentSearch,
    template_search: &dyn TemplateSearch,
) -> Result<GatheredInputs> {
    let unique = UniqueQueries::new(queries);
    let sequences = unique.sequences();
    let use_env = config.msa_mode == MsaMode::Mmseqs2UnirefEnv;

    let templates = if config.use_templates {
        let response = search.search(
            sequences,
            &SearchRequest {
                use_env,
                use_templates: true,
                ..Default::default()
            },
        )?;
        let template_paths = match &config.custom_template_path {
            Some(path) => Some(vec![Some(path.clone()); sequences.len()]),
            None => response.template_paths,
        };
        match template_paths {
            None => {
                log::info!("No template detected");
                sequences.iter().map(|s| mk_mock_template(&[s], 1)).collect()
            }
            Some(paths) => {
                let mut templates = Vec::with_capacity(sequences.len());
                for (index, sequence) in sequences.iter().enumerate() {
                    let features = match paths.get(index).cloned().flatten() {
                        Some(path) => {
                            let a3m = response.a3m.get(index).map(String::as_str).unwrap_or("");
                            mk_template(
                                a3m,
                                &path,
                                sequence,
                                template_search,
                                config.max_template_date,
                                config.max_template_hits,
                            )?
                        }
                        None => TemplateFeatures::mock(sequence.chars().count(), 1),
                    };
                    let found = features.found_domain_names();
                    if found.is_empty() {
                        log::info!("Sequence {index} found no templates");
                    } else {
                        log::info!("Sequence {index} found templates: {found:?}");
                    }
                    templates.push(features);
                }
                templates
            }
        }
    } else {
        sequences.iter().map(|s| mk_mock_template(&[s], 1)).collect()
    };

    let pair_mode = if unique.num_chains() == 1 {
        PairMode::Off
    } else {
        config.pair_mode
    };

    let unpaired = if !pair_mode.wants_unpaired() {
        None
    } else if config.msa_mode == MsaMode::SingleSequence {
        Some(
            sequences
                .iter()
                .enumerate()
                .map(|(i, s)| placeholder(i, s))
                .collect(),
        )
    } else {
        let request = SearchRequest {
            use_env,
            use_pairwise: config.use_pairwise,
            ..Default::default()
        };
        Some(search.search(sequences, &request)?.a3m)
    };

    let paired = if config.msa_mode == MsaMode::SingleSequence || !pair_mode.wants_paired() {
        None
    } else if sequences.len() > 1 {
        let request = SearchRequest {
            use_env,
            use_pairing: true,
            ..Default::default()
        };
        Some(search.search(sequences, &request)?.a3m)
    } else {
        // homo-oligomer: nothing to pair against, one query row per copy
        let copies = unique.cardinality().first().copied().unwrap_or(0);
        Some(
            (0..copies)
                .map(|i| format!("{}\n", placeholder(i, &sequences[0])))
                .collect(),
        )
    };

    Ok(GatheredInputs {
        queries: unique,
        unpaired,
        paired,
        templates,
    })
}

/// The assembled bundle plus what was learned on the way.
#[derive(Debug, Clone)]
pub struct InputFeatures {
    pub features: FeatureDict,
    /// Template names found for each chain.
    pub domain_names: BTreeMap<String, Vec<String>>,
    pub dropped_features: Vec<DroppedFeature>,
}

fn block(blocks: &[String], index: usize, expected: usize) -> Result<String> {
    blocks.get(index).cloned().ok_or(FeatureError::BlockCount {
        expected,
        found: blocks.len(),
    })
}

/// Build the feature bundle for `model_type` from gathered inputs.
pub fn generate_input_feature(
    inputs: &GatheredInputs,
    model_type: ModelType,
    crop: &CropConfig,
    min_msa_rows: usize,
) -> Result<InputFeatures> {
    let queries = &inputs.queries;
    let is_complex = queries.num_chains() > 1;

    if is_complex && !model_type.is_multimer() {
        return complex_as_monomer(inputs);
    }

    let chain_ids: Vec<char> = PDB_CHAIN_IDS.chars().collect();
    if queries.num_chains() > chain_ids.len() {
        return Err(FeatureError::TooManyChains(queries.num_chains()));
    }

    let mut features_for_chain: Vec<(String, FeatureDict)> = Vec::new();
    let mut domain_names = BTreeMap::new();
    for (index, sequence) in queries.sequences().iter().enumerate() {
        let unpaired = match &inputs.unpaired {
            Some(blocks) => block(blocks, index, queries.len())?,
            None => placeholder(index, sequence),
        };
        let templates = inputs
            .templates
            .get(index)
            .cloned()
            .unwrap_or_else(|| TemplateFeatures::mock(sequence.chars().count(), 1));
        let found = templates.found_domain_names();
        let mut features = build_monomer_feature(sequence, &unpaired, templates)?;
        if model_type.is_multimer() {
            let paired = match &inputs.paired {
                Some(blocks) => block(blocks, index, queries.len())?,
                None => placeholder(index, sequence),
            };
            features.extend(build_multimer_feature(&paired)?);
        }
        for _ in 0..queries.cardinality()[index] {
            let chain_id = chain_ids[features_for_chain.len()].to_string();
            domain_names.insert(chain_id.clone(), found.clone());
            features_for_chain.push((chain_id, features.clone()));
        }
    }

    if !model_type.is_multimer() {
        let (chain_id, mut features) = features_for_chain
            .into_iter()
            .next()
            .ok_or(FeatureError::NoChains)?;
        let num_res = features.require("aatype")?.len();
        features.insert("asym_id", FeatureValue::I64(Array1::<i64>::zeros(num_res).into_dyn()));
        let domain_names = domain_names
            .remove(&chain_id)
            .map(|names| BTreeMap::from([(chain_id, names)]))
            .unwrap_or_default();
        return Ok(InputFeatures {
            features,
            domain_names,
            dropped_features: Vec::new(),
        });
    }

    let (features, dropped_features) =
        process_multimer_features(features_for_chain, crop, min_msa_rows)?;
    Ok(InputFeatures {
        features,
        domain_names,
        dropped_features,
    })
}

/// All chain copies as one pseudo-chain for a single-chain model.
fn complex_as_monomer(inputs: &GatheredInputs) -> Result<InputFeatures> {
    let queries = &inputs.queries;
    let full_sequence = queries.full_sequence();
    let lengths = queries.chain_lengths();

    let mut a3m = format!(">0\n{full_sequence}\n");
    a3m.push_str(&pair_msa(
        queries.sequences(),
        queries.cardinality(),
        inputs.paired.as_deref(),
        inputs.unpaired.as_deref(),
    )?);

    let mut features = build_monomer_feature(
        &full_sequence,
        &a3m,
        mk_mock_template(&[&full_sequence], 1),
    )?;
    let residue_index: Array1<i64> = lengths.iter().flat_map(|&len| 0..len as i64).collect();
    let asym_id: Array1<i64> = lengths
        .iter()
        .enumerate()
        .flat_map(|(n, &len)| std::iter::repeat(n as i64).take(len))
        .collect();
    features.insert("residue_index", FeatureValue::I64(residue_index.into_dyn()));
    features.insert("asym_id", FeatureValue::I64(asym_id.into_dyn()));

    if inputs
        .templates
        .iter()
        .any(|t| !t.found_domain_names().is_empty())
    {
        log::warn!(
            "Single-chain models ignore templates for complexes; use a multimer model type for template support"
        );
    }
    log::debug!(
        "Complex as one chain: {} residues, {} MSA rows",
        full_sequence.chars().count(),
        a3m.lines().filter(|line| line.starts_with('>')).count()
    );

    Ok(InputFeatures {
        features,
        domain_names: BTreeMap::new(),
        dropped_features: Vec::new(),
    })
}

/// Gather and generate in one go.
pub fn featurize<S: AsRef<str>>(
    queries: &[S],
    config: &PipelineConfig,
    search: &dyn AlignmentSearch,
    template_search: &dyn TemplateSearch,
) -> Result<InputFeatures> {
    let inputs = gather_inputs(queries, config, search, template_search)?;
    generate_input_feature(&inputs, config.model_type, &config.crop, config.min_msa_rows)
}

/// Pad a bundle to `pad_len` residues and four templates for `model_type`.
pub fn pad_input(features: FeatureDict, model_type: ModelType, pad_len: usize) -> Result<FeatureDict> {
    let schema = if model_type.is_multimer() {
        multimer_shape_schema()
    } else {
        monomer_shape_schema()
    };
    let sizes = FixedSizes {
        num_res: Some(pad_len),
        num_templates: Some(4),
        ..Default::default()
    };
    make_fixed_size(features, &schema, &sizes)
}

/// Read the queries of a FASTA file; chains of one record are separated by `:`.
pub fn read_queries(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    crate::a3m::parse_query_sequences(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::PrecomputedHits;
    use std::str::FromStr;

    fn single_sequence() -> PipelineConfig {
        PipelineConfig::builder()
            .msa_mode(MsaMode::SingleSequence)
            .build()
    }

    fn no_search() -> PrecomputedAlignments {
        PrecomputedAlignments::new("/nonexistent")
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!(MsaMode::from_str("single_sequence").unwrap(), MsaMode::SingleSequence);
        assert_eq!(PairMode::from_str("none").unwrap(), PairMode::Off);
        assert_eq!(PairMode::UnpairedPaired.to_string(), "unpaired_paired");
        assert_eq!(
            ModelType::from_str("alphafold2_multimer_v3").unwrap(),
            ModelType::MultimerV3
        );
        assert!(ModelType::from_str("alphafold3").is_err());
        assert!(!ModelType::AlphaFold2Ptm.is_multimer());
    }

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.msa_mode, MsaMode::Mmseqs2UnirefEnv);
        assert_eq!(config.pair_mode, PairMode::UnpairedPaired);
        assert_eq!(config.model_type, ModelType::AlphaFold2Ptm);
        assert_eq!(config.crop.msa_crop_size, 2048);
        assert_eq!(config.min_msa_rows, 512);
        assert_eq!(config.max_template_hits, 20);
    }

    #[test]
    fn test_gather_single_sequence() {
        let inputs =
            gather_inputs(&["MKT", "MKT"], &single_sequence(), &no_search(), &PrecomputedHits).unwrap();
        assert_eq!(inputs.queries.sequences(), &["MKT".to_string()]);
        assert_eq!(inputs.queries.cardinality(), &[2]);
        assert_eq!(inputs.unpaired, Some(vec![">101\nMKT".to_string()]));
        assert_eq!(inputs.paired, None);
        assert_eq!(inputs.templates[0].all_atom_positions.shape(), &[1, 3, 37, 3]);
        assert!(inputs.templates[0].all_atom_positions.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_gather_homooligomer_pairs_placeholders() {
        let inputs = gather_inputs(
            &["MKT", "MKT", "MKT"],
            &PipelineConfig::default(),
            &no_search(),
            &PrecomputedHits,
        )
        .unwrap();
        let paired = inputs.paired.unwrap();
        assert_eq!(paired, vec![">101\nMKT\n", ">102\nMKT\n", ">103\nMKT\n"]);
        assert_eq!(inputs.unpaired.unwrap(), vec![">101\nMKT\n"]);
    }

    #[test]
    fn test_gather_single_query_forces_no_pairing() {
        let config = PipelineConfig::builder().pair_mode(PairMode::Paired).build();
        let inputs = gather_inputs(&["MKT"], &config, &no_search(), &PrecomputedHits).unwrap();
        assert!(inputs.paired.is_none());
        assert!(inputs.unpaired.is_some());
    }

    #[test]
    fn test_homodimer_as_monomer() {
        let inputs =
            gather_inputs(&["MKT", "MKT"], &single_sequence(), &no_search(), &PrecomputedHits).unwrap();
        let out =
            generate_input_feature(&inputs, ModelType::AlphaFold2Ptm, &CropConfig::default(), 512)
                .unwrap();
        let features = &out.features;
        assert_eq!(features.require("aatype").unwrap().shape(), vec![6, 21]);
        assert_eq!(
            features.require_i64("residue_index").unwrap(),
            &ndarray::array![0i64, 1, 2, 0, 1, 2].into_dyn()
        );
        assert_eq!(
            features.require_i64("asym_id").unwrap(),
            &ndarray::array![0i64, 0, 0, 1, 1, 1].into_dyn()
        );
        // `>0` full-length row, then one padded row per copy
        assert_eq!(features.require("msa").unwrap().shape(), vec![3, 6]);
        assert_eq!(
            features.require("template_all_atom_positions").unwrap().shape(),
            vec![1, 6, 37, 3]
        );
        assert!(out.domain_names.is_empty());
    }

    #[test]
    fn test_monomer_asym_id_is_zero() {
        let inputs = gather_inputs(&["MKTAY"], &single_sequence(), &no_search(), &PrecomputedHits).unwrap();
        let out =
            generate_input_feature(&inputs, ModelType::AlphaFold2, &CropConfig::default(), 512).unwrap();
        assert_eq!(
            out.features.require_i64("asym_id").unwrap(),
            &ndarray::Array1::<i64>::zeros(5).into_dyn()
        );
        assert_eq!(out.domain_names.get("A"), Some(&Vec::new()));
    }

    #[test]
    fn test_pairing_without_alignments_is_fatal() {
        let config = PipelineConfig::builder()
            .msa_mode(MsaMode::SingleSequence)
            .pair_mode(PairMode::Paired)
            .build();
        let err = featurize(&["MKT", "GSS"], &config, &no_search(), &PrecomputedHits).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidPairing));
    }

    #[test]
    fn test_multimer_heterodimer() {
        let config = PipelineConfig::builder()
            .model_type(ModelType::MultimerV3)
            .build();
        let out = featurize(&["MKT", "GS"], &config, &no_search(), &PrecomputedHits).unwrap();
        assert_eq!(out.features.require("aatype").unwrap().shape(), vec![5]);
        assert_eq!(out.features.require("msa").unwrap().shape(), vec![512, 5]);
        assert_eq!(out.domain_names.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(out.dropped_features.is_empty());
    }

    #[test]
    fn test_pad_input() {
        let inputs = gather_inputs(&["MKT"], &single_sequence(), &no_search(), &PrecomputedHits).unwrap();
        let out =
            generate_input_feature(&inputs, ModelType::AlphaFold2Ptm, &CropConfig::default(), 512).unwrap();
        let padded = pad_input(out.features, ModelType::AlphaFold2Ptm, 8).unwrap();
        assert_eq!(padded.require("aatype").unwrap().shape(), vec![8, 21]);
        assert_eq!(padded.require("template_aatype").unwrap().shape(), vec![4, 8, 22]);
    }

    #[test]
    fn test_to_a3m() {
        let inputs =
            gather_inputs(&["MK", "GSS", "GSS"], &single_sequence(), &no_search(), &PrecomputedHits).unwrap();
        assert_eq!(inputs.to_a3m().unwrap(), "#2,3\t1,2\n>101\nMK---\n>102\n--GSS");
    }
}
