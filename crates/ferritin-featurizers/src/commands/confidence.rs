use anyhow::Context;
use candle_core::{safetensors, DType, Device, Tensor};
use ferritin_plots::{plot_plddt, plot_predicted_alignment_error, save};
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};

fn load_tensor(path: &Path, key: &str) -> anyhow::Result<Tensor> {
    let mut tensors = safetensors::load(path, &Device::Cpu)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let tensor = tensors
        .remove(key)
        .with_context(|| format!("{} has no tensor `{key}`", path.display()))?;
    Ok(tensor.to_dtype(DType::F32)?)
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn pae(inputs: &[PathBuf], key: &str, output: PathBuf) -> anyhow::Result<()> {
    let mut models = Vec::with_capacity(inputs.len());
    for path in inputs {
        let tensor = load_tensor(path, key)?;
        let values = tensor.flatten_all()?.to_vec1::<f32>()?;
        models.push((model_name(path), Array2::from_shape_vec(tensor.dims2()?, values)?));
    }
    let views: Vec<_> = models
        .iter()
        .map(|(name, pae)| (name.as_str(), pae.view()))
        .collect();
    let document = plot_predicted_alignment_error(&views)?;
    save(&output, &document).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote PAE plot of {} models to {}", models.len(), output.display());
    Ok(())
}

pub fn plddt(
    inputs: &[PathBuf],
    key: &str,
    chain_lengths: &[usize],
    output: PathBuf,
) -> anyhow::Result<()> {
    let mut models = Vec::with_capacity(inputs.len());
    for path in inputs {
        let values = load_tensor(path, key)?.flatten_all()?.to_vec1::<f32>()?;
        models.push((model_name(path), Array1::from(values)));
    }
    let views: Vec<_> = models
        .iter()
        .map(|(name, plddt)| (name.as_str(), plddt.view()))
        .collect();
    let document = plot_plddt(&views, chain_lengths)?;
    save(&output, &document).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote pLDDT plot of {} models to {}", models.len(), output.display());
    Ok(())
}
