use anyhow::Context;
use ferritin_featurizers::a3m::Msa;
use ferritin_featurizers::features::make_msa_features;
use ndarray::Ix2;
use std::path::PathBuf;

pub fn execute(a3m: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&a3m)
        .with_context(|| format!("Failed to read {}", a3m.display()))?;
    let msa = Msa::parse(&text)?;
    let features = make_msa_features(&[msa], false)?;
    let ids = features.require_i64("msa")?.clone().into_dimensionality::<Ix2>()?;
    log::info!("Plotting coverage of {} sequences x {} positions", ids.nrows(), ids.ncols());

    let document = ferritin_plots::plot_msa_coverage(ids.view())?;
    ferritin_plots::save(&output, &document)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}
