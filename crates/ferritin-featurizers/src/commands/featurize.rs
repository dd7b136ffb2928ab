use anyhow::Context;
use chrono::NaiveDate;
use ferritin_featurizers::pipeline::{gather_inputs, generate_input_feature, pad_input, read_queries};
use ferritin_featurizers::{ModelType, MsaMode, PairMode, PipelineConfig, PrecomputedAlignments, PrecomputedHits};
use std::path::PathBuf;

pub struct FeaturizeArgs {
    pub input: PathBuf,
    pub msa_dir: Option<PathBuf>,
    pub output: PathBuf,
    pub pair_mode: PairMode,
    pub msa_mode: MsaMode,
    pub model_type: ModelType,
    pub templates: bool,
    pub custom_template_path: Option<PathBuf>,
    pub max_template_date: Option<NaiveDate>,
    pub pad_len: Option<usize>,
    pub domain_names: Option<PathBuf>,
    pub a3m: Option<PathBuf>,
}

pub fn execute(args: FeaturizeArgs) -> anyhow::Result<()> {
    let queries = read_queries(&args.input)
        .with_context(|| format!("Failed to read queries from {}", args.input.display()))?;

    let msa_mode = match (&args.msa_dir, args.msa_mode) {
        (None, mode) if mode != MsaMode::SingleSequence => {
            log::info!("No --msa-dir given, running in single_sequence mode");
            MsaMode::SingleSequence
        }
        (_, mode) => mode,
    };
    let search = PrecomputedAlignments::new(args.msa_dir.clone().unwrap_or_default());

    let config = PipelineConfig::builder()
        .msa_mode(msa_mode)
        .pair_mode(args.pair_mode)
        .model_type(args.model_type)
        .use_templates(args.templates)
        .maybe_custom_template_path(args.custom_template_path)
        .maybe_max_template_date(args.max_template_date)
        .build();

    let inputs = gather_inputs(&queries, &config, &search, &PrecomputedHits)
        .context("Failed to gather alignments and templates")?;
    if let Some(path) = &args.a3m {
        std::fs::write(path, inputs.to_a3m()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let result = generate_input_feature(&inputs, config.model_type, &config.crop, config.min_msa_rows)
        .context("Failed to generate input features")?;
    for dropped in &result.dropped_features {
        log::warn!("Dropped {} (missing from {:?})", dropped.name, dropped.missing_from);
    }

    let features = match args.pad_len {
        Some(pad_len) => pad_input(result.features, config.model_type, pad_len)?,
        None => result.features,
    };
    features
        .save_to_safetensor(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    log::info!("Wrote {} features to {}", features.len(), args.output.display());

    if let Some(path) = &args.domain_names {
        let json = serde_json::to_string_pretty(&result.domain_names)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
